//! Conversation transcript and `/analyze` dispatch bookkeeping.

use std::collections::BTreeSet;

use chrono::{DateTime, Local};
use tracing::{debug, warn};

use crate::client::BackendResult;
use crate::protocol::{AnalyzeRequest, AnalyzeResponse, SegmentId, DEFAULT_SEGMENT};

pub const GREETING: &str = "Hey, I am here to help you with the video. Ask me anything related to the strategies used in the game above.";
pub const UNPROCESSED_REPLY: &str = "Sorry, I couldn't process your query. Please try again.";
pub const FAILED_REPLY: &str = "An error occurred. Please try again later.";

/// Seconds assumed per segment when converting an index to session time.
const SEGMENT_SECS: u64 = 30;
/// The archive starts this many segments into the game.
const SEGMENT_OFFSET: u64 = 3;

/// Session time sent to the backend for the segment at `index`.
pub fn elapsed_time(index: usize) -> u64 {
    (index as u64 + SEGMENT_OFFSET) * SEGMENT_SECS
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    User,
    Agent,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub sender: Sender,
    pub text: String,
    /// URL of a saved clip.
    pub media: Option<String>,
    pub at: DateTime<Local>,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            text: text.into(),
            media: None,
            at: Local::now(),
        }
    }

    pub fn agent(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::Agent,
            text: text.into(),
            media: None,
            at: Local::now(),
        }
    }

    pub fn clip(url: impl Into<String>) -> Self {
        Self {
            sender: Sender::Agent,
            text: String::new(),
            media: Some(url.into()),
            at: Local::now(),
        }
    }
}

/// Identifies one in-flight `/analyze` call.
pub type Ticket = u64;

#[derive(Debug, Clone)]
pub struct Dispatch {
    pub ticket: Ticket,
    pub request: AnalyzeRequest,
}

/// Append-only transcript plus the set of outstanding dispatches.
///
/// Overlapping dispatches are allowed.  Each completion appends exactly one
/// agent message, and the typing indicator stays on until none are left.
#[derive(Debug, Clone)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
    outstanding: BTreeSet<Ticket>,
    next_ticket: Ticket,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    pub fn new() -> Self {
        Self {
            messages: vec![ChatMessage::agent(GREETING)],
            outstanding: BTreeSet::new(),
            next_ticket: 1,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn is_typing(&self) -> bool {
        !self.outstanding.is_empty()
    }

    /// Most recent agent reply with text, for copying.
    pub fn last_answer(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.sender == Sender::Agent && !m.text.is_empty())
            .map(|m| m.text.as_str())
    }

    /// Record the user's message and build the `/analyze` request.
    /// Returns `None` for blank input, leaving the transcript untouched.
    pub fn begin_dispatch(
        &mut self,
        text: &str,
        index: usize,
        segment: Option<&str>,
    ) -> Option<Dispatch> {
        if text.trim().is_empty() {
            return None;
        }
        self.messages.push(ChatMessage::user(text));

        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.outstanding.insert(ticket);

        let request = AnalyzeRequest {
            query: text.to_string(),
            video: segment.unwrap_or(DEFAULT_SEGMENT).to_string(),
            current_time: elapsed_time(index),
        };
        debug!(
            "conversation: dispatch #{} video={} t={}",
            ticket, request.video, request.current_time
        );
        Some(Dispatch { ticket, request })
    }

    /// Apply the outcome of a dispatch.  Returns the segments the player should
    /// play, in order.  Unknown tickets are ignored.
    pub fn complete(
        &mut self,
        ticket: Ticket,
        outcome: BackendResult<AnalyzeResponse>,
    ) -> Vec<SegmentId> {
        if !self.outstanding.remove(&ticket) {
            debug!("conversation: ignoring completion for unknown #{}", ticket);
            return Vec::new();
        }

        let response = match outcome {
            Ok(response) => response,
            Err(e) => {
                warn!("conversation: analyze #{} failed: {}", ticket, e);
                self.messages.push(ChatMessage::agent(FAILED_REPLY));
                return Vec::new();
            }
        };

        match response.envelope() {
            Some(envelope) => {
                self.messages
                    .push(ChatMessage::agent(envelope.reply_text().to_string()));
                envelope.playback_targets()
            }
            None => {
                if let Some(err) = &response.error {
                    warn!("conversation: backend error for #{}: {}", ticket, err);
                }
                self.messages.push(ChatMessage::agent(UNPROCESSED_REPLY));
                Vec::new()
            }
        }
    }

    /// Surface a saved clip.
    pub fn attach_clip(&mut self, url: impl Into<String>) {
        self.messages.push(ChatMessage::clip(url));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::BackendError;
    use reqwest::StatusCode;
    use serde_json::json;

    fn reply(envelope: serde_json::Value) -> BackendResult<AnalyzeResponse> {
        Ok(AnalyzeResponse {
            result: Some(serde_json::Value::String(envelope.to_string())),
            error: None,
        })
    }

    #[test]
    fn test_elapsed_time() {
        assert_eq!(elapsed_time(0), 90);
        assert_eq!(elapsed_time(1), 120);
        assert_eq!(elapsed_time(7), 300);
    }

    #[test]
    fn test_starts_with_greeting() {
        let conv = Conversation::new();
        assert_eq!(conv.len(), 1);
        assert_eq!(conv.messages()[0].text, GREETING);
        assert!(!conv.is_typing());
    }

    #[test]
    fn test_blank_input_is_ignored() {
        let mut conv = Conversation::new();
        assert!(conv.begin_dispatch("   \n", 0, None).is_none());
        assert_eq!(conv.len(), 1);
        assert!(!conv.is_typing());
    }

    #[test]
    fn test_search_answer() {
        let mut conv = Conversation::new();
        let dispatch = conv
            .begin_dispatch("What pitch was that?", 2, Some("s2.mp4"))
            .unwrap();
        assert_eq!(
            dispatch.request,
            AnalyzeRequest {
                query: "What pitch was that?".into(),
                video: "s2.mp4".into(),
                current_time: 150,
            }
        );
        assert!(conv.is_typing());

        let targets = conv.complete(
            dispatch.ticket,
            reply(json!({"type": "search", "result": {"answer": "A slider."}})),
        );
        assert!(targets.is_empty());
        assert!(!conv.is_typing());
        assert_eq!(conv.len(), 3);
        let last = conv.messages().last().unwrap();
        assert_eq!(last.sender, Sender::Agent);
        assert_eq!(last.text, "A slider.");
    }

    #[test]
    fn test_default_segment_when_nothing_buffered() {
        let mut conv = Conversation::new();
        let dispatch = conv.begin_dispatch("hi", 0, None).unwrap();
        assert_eq!(dispatch.request.video, DEFAULT_SEGMENT);
        assert_eq!(dispatch.request.current_time, 90);
    }

    #[test]
    fn test_historical_schedules_first_two() {
        let mut conv = Conversation::new();
        let dispatch = conv.begin_dispatch("Show the last two homers", 0, None).unwrap();
        let targets = conv.complete(
            dispatch.ticket,
            reply(json!({
                "type": "historical",
                "result": {
                    "answer": "Here they are.",
                    "citations": ["a/c1.txt", "a/c2.txt", "a/c3.txt"]
                }
            })),
        );
        assert_eq!(targets, vec!["c1.mp4", "c2.mp4"]);
        assert_eq!(conv.messages().last().unwrap().text, "Here they are.");
    }

    #[test]
    fn test_realtime_schedules_clip() {
        let mut conv = Conversation::new();
        let dispatch = conv.begin_dispatch("Replay that", 0, None).unwrap();
        let targets = conv.complete(
            dispatch.ticket,
            reply(json!({
                "type": "realtime",
                "result": {"video": "/srv/clips/segment_009.mp4", "response": "Replaying."}
            })),
        );
        assert_eq!(targets, vec!["segment_009.mp4"]);
        assert_eq!(conv.messages().last().unwrap().text, "Replaying.");
    }

    #[test]
    fn test_unprocessable_and_failed_replies() {
        let mut conv = Conversation::new();

        let d = conv.begin_dispatch("one", 0, None).unwrap();
        conv.complete(d.ticket, Ok(AnalyzeResponse::default()));
        assert_eq!(conv.messages().last().unwrap().text, UNPROCESSED_REPLY);

        let d = conv.begin_dispatch("two", 0, None).unwrap();
        conv.complete(d.ticket, reply(json!({"type": "weather", "result": {}})));
        assert_eq!(conv.messages().last().unwrap().text, UNPROCESSED_REPLY);

        let d = conv.begin_dispatch("three", 0, None).unwrap();
        conv.complete(
            d.ticket,
            Err(BackendError::Status {
                endpoint: "/analyze",
                status: StatusCode::INTERNAL_SERVER_ERROR,
            }),
        );
        assert_eq!(conv.messages().last().unwrap().text, FAILED_REPLY);
        assert_eq!(conv.len(), 7);
        assert!(!conv.is_typing());
    }

    #[test]
    fn test_overlapping_dispatches() {
        let mut conv = Conversation::new();
        let first = conv.begin_dispatch("first", 0, None).unwrap();
        let second = conv.begin_dispatch("second", 0, None).unwrap();
        assert_ne!(first.ticket, second.ticket);

        conv.complete(
            second.ticket,
            reply(json!({"type": "search", "result": {"answer": "2"}})),
        );
        assert!(conv.is_typing());
        conv.complete(
            first.ticket,
            reply(json!({"type": "search", "result": {"answer": "1"}})),
        );
        assert!(!conv.is_typing());
        assert_eq!(conv.len(), 5);

        // Replayed completion changes nothing.
        conv.complete(first.ticket, Ok(AnalyzeResponse::default()));
        assert_eq!(conv.len(), 5);
    }

    #[test]
    fn test_clip_and_last_answer() {
        let mut conv = Conversation::new();
        let d = conv.begin_dispatch("q", 0, None).unwrap();
        conv.complete(d.ticket, reply(json!({"type": "search", "result": {"answer": "A"}})));
        conv.attach_clip("http://b/saved_segments/v.mp4");
        let last = conv.messages().last().unwrap();
        assert_eq!(last.text, "");
        assert_eq!(last.media.as_deref(), Some("http://b/saved_segments/v.mp4"));
        assert_eq!(conv.last_answer(), Some("A"));
    }
}
