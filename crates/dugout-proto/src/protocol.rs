//! Wire types for the analysis backend.
//!
//! Every endpoint speaks JSON.  `/analyze` wraps its payload twice: the HTTP
//! body is `{"result": "<string>"}` and that string is itself a JSON envelope
//! tagged by `type`.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Opaque name of a video resource on the backend, e.g. `segment_003.mp4`.
pub type SegmentId = String;

/// Segment sent to the backend when nothing is buffered yet.
pub const DEFAULT_SEGMENT: &str = "segment_003.mp4";

/// At most this many historical citations are turned into playback requests.
pub const MAX_HISTORICAL_CLIPS: usize = 2;

// ── requests ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    pub query: String,
    pub video: SegmentId,
    pub current_time: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveSegmentRequest {
    #[serde(rename = "videoData")]
    pub video_data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchOverviewRequest {
    pub chunk_number: SegmentId,
}

// ── responses ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentList {
    #[serde(default)]
    pub segments: Vec<SegmentId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    /// Usually a JSON string holding an [`Envelope`]; tolerated as an inline object.
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SaveSegmentResponse {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestVideoResponse {
    #[serde(rename = "latestVideoFile")]
    pub latest_video_file: String,
}

// ── envelope ──────────────────────────────────────────────────────────────────

/// The typed answer inside an `/analyze` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "result", rename_all = "lowercase")]
pub enum Envelope {
    /// Answer about the live footage; `video` is a backend path to the clip.
    Realtime(RealtimeResult),
    /// Answer assembled from archived chunks, citing transcript files.
    Historical(HistoricalResult),
    /// General knowledge answer, nothing to play.
    Search(SearchResult),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RealtimeResult {
    #[serde(default)]
    pub video: Option<String>,
    #[serde(default)]
    pub response: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoricalResult {
    #[serde(default)]
    pub answer: String,
    #[serde(default, deserialize_with = "string_or_list")]
    pub citations: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub answer: String,
}

/// Some answer generators emit a single citation string instead of a list.
fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
        Null(()),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) if s.trim().is_empty() => Vec::new(),
        OneOrMany::One(s) => vec![s],
        OneOrMany::Many(v) => v,
        OneOrMany::Null(()) => Vec::new(),
    })
}

impl Envelope {
    /// Text to append to the transcript as the agent's reply.
    pub fn reply_text(&self) -> &str {
        match self {
            Envelope::Realtime(r) => &r.response,
            Envelope::Historical(h) => &h.answer,
            Envelope::Search(s) => &s.answer,
        }
    }

    /// Segments the player should play, in order.
    pub fn playback_targets(&self) -> Vec<SegmentId> {
        match self {
            Envelope::Realtime(r) => r
                .video
                .as_deref()
                .and_then(segment_name_from_path)
                .into_iter()
                .collect(),
            Envelope::Historical(h) => h
                .citations
                .iter()
                .filter_map(|c| citation_to_segment(c))
                .take(MAX_HISTORICAL_CLIPS)
                .collect(),
            Envelope::Search(_) => Vec::new(),
        }
    }
}

impl AnalyzeResponse {
    /// Decode the nested envelope.  `None` covers a missing or empty result,
    /// an error payload, and any unknown `type`.
    pub fn envelope(&self) -> Option<Envelope> {
        match self.result.as_ref()? {
            Value::String(raw) if raw.trim().is_empty() => None,
            Value::String(raw) => serde_json::from_str(raw).ok(),
            obj @ Value::Object(_) => serde_json::from_value(obj.clone()).ok(),
            _ => None,
        }
    }
}

/// Last path component of a backend path, e.g. `/data/clips/seg_7.mp4` → `seg_7.mp4`.
pub fn segment_name_from_path(path: &str) -> Option<SegmentId> {
    let name = path.trim().rsplit('/').next()?.trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Citations name transcript files; the matching clip shares the stem with a
/// video extension.
pub fn citation_to_segment(citation: &str) -> Option<SegmentId> {
    segment_name_from_path(citation).map(|name| name.replacen(".txt", ".mp4", 1))
}

// ── match overview ────────────────────────────────────────────────────────────

/// Context summary for the current segment.  The backend shape is loose, so
/// the raw object is kept and read through accessors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchOverview(pub Value);

/// A titled block of analysis paragraphs for display.
#[derive(Debug, Clone, PartialEq)]
pub struct OverviewSection {
    pub title: &'static str,
    pub paragraphs: Vec<String>,
}

const OVERVIEW_LAYOUT: &[(&str, &str, &[&str])] = &[
    (
        "Pattern Analysis",
        "pattern_analysis",
        &["engagement_analysis", "pattern_analysis"],
    ),
    (
        "Play Analysis",
        "play_analysis",
        &["pitch_analysis", "play_analysis", "strategic_analysis"],
    ),
    (
        "Strategic Prediction",
        "strategic_prediction",
        &["strategic_prediction"],
    ),
];

impl MatchOverview {
    /// "Previously on live stream" text.
    pub fn current_context(&self) -> Option<&str> {
        self.0
            .get("current_game_context")?
            .get("current_context")?
            .as_str()
            .filter(|s| !s.trim().is_empty())
    }

    pub fn sections(&self) -> Vec<OverviewSection> {
        OVERVIEW_LAYOUT
            .iter()
            .filter_map(|(title, key, fields)| {
                let obj = self.0.get(*key)?;
                let paragraphs: Vec<String> = fields
                    .iter()
                    .filter_map(|f| obj.get(*f)?.as_str())
                    .filter(|s| !s.trim().is_empty())
                    .map(str::to_string)
                    .collect();
                if paragraphs.is_empty() {
                    None
                } else {
                    Some(OverviewSection {
                        title: *title,
                        paragraphs,
                    })
                }
            })
            .collect()
    }

    pub fn error(&self) -> Option<&str> {
        self.0.get("error")?.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn wrap(envelope: Value) -> AnalyzeResponse {
        AnalyzeResponse {
            result: Some(Value::String(envelope.to_string())),
            error: None,
        }
    }

    #[test]
    fn test_search_envelope() {
        let resp = wrap(json!({"type": "search", "result": {"answer": "A slider."}}));
        let env = resp.envelope().unwrap();
        assert_eq!(env.reply_text(), "A slider.");
        assert!(env.playback_targets().is_empty());
    }

    #[test]
    fn test_realtime_envelope_extracts_segment() {
        let resp = wrap(json!({
            "type": "realtime",
            "result": {"video": "/srv/segments/segment_012.mp4", "response": "Fastball, inside."}
        }));
        let env = resp.envelope().unwrap();
        assert_eq!(env.reply_text(), "Fastball, inside.");
        assert_eq!(env.playback_targets(), vec!["segment_012.mp4".to_string()]);
    }

    #[test]
    fn test_realtime_without_video_plays_nothing() {
        let resp = wrap(json!({"type": "realtime", "result": {"response": "No clip."}}));
        assert!(resp.envelope().unwrap().playback_targets().is_empty());
    }

    #[test]
    fn test_historical_takes_first_two_citations() {
        let resp = wrap(json!({
            "type": "historical",
            "result": {
                "answer": "He struck out twice.",
                "citations": ["docs/segment_001.txt", "docs/segment_004.txt", "docs/segment_009.txt"]
            }
        }));
        let env = resp.envelope().unwrap();
        assert_eq!(
            env.playback_targets(),
            vec!["segment_001.mp4".to_string(), "segment_004.mp4".to_string()]
        );
    }

    #[test]
    fn test_historical_single_string_citation() {
        let resp = wrap(json!({
            "type": "historical",
            "result": {"answer": "Once.", "citations": "a/b/segment_002.txt"}
        }));
        assert_eq!(
            resp.envelope().unwrap().playback_targets(),
            vec!["segment_002.mp4".to_string()]
        );
    }

    #[test]
    fn test_historical_without_citations() {
        let resp = wrap(json!({"type": "historical", "result": {"answer": "Nothing cited."}}));
        assert!(resp.envelope().unwrap().playback_targets().is_empty());
    }

    #[test]
    fn test_unrecognised_results() {
        assert!(AnalyzeResponse::default().envelope().is_none());
        assert!(wrap(json!({"type": "weather", "result": {}})).envelope().is_none());

        // The backend sometimes returns a Python repr instead of JSON.
        let repr = AnalyzeResponse {
            result: Some(Value::String("{'error': 'boom'}".into())),
            error: None,
        };
        assert!(repr.envelope().is_none());

        let empty = AnalyzeResponse {
            result: Some(Value::String("  ".into())),
            error: None,
        };
        assert!(empty.envelope().is_none());
    }

    #[test]
    fn test_inline_object_result() {
        let resp: AnalyzeResponse = serde_json::from_value(json!({
            "result": {"type": "search", "result": {"answer": "Yes."}}
        }))
        .unwrap();
        assert_eq!(resp.envelope().unwrap().reply_text(), "Yes.");
    }

    #[test]
    fn test_path_helpers() {
        assert_eq!(segment_name_from_path("a/b/c.mp4").as_deref(), Some("c.mp4"));
        assert_eq!(segment_name_from_path("c.mp4").as_deref(), Some("c.mp4"));
        assert_eq!(segment_name_from_path("a/b/"), None);
        assert_eq!(citation_to_segment("x/seg.txt").as_deref(), Some("seg.mp4"));
        assert_eq!(citation_to_segment("seg.mp4").as_deref(), Some("seg.mp4"));
    }

    #[test]
    fn test_wire_field_names() {
        let save = serde_json::to_value(SaveSegmentRequest {
            video_data: "data:video/mp4;base64,AAAA".into(),
        })
        .unwrap();
        assert_eq!(save, json!({"videoData": "data:video/mp4;base64,AAAA"}));

        let latest: LatestVideoResponse =
            serde_json::from_value(json!({"latestVideoFile": "video_segment_1.mp4"})).unwrap();
        assert_eq!(latest.latest_video_file, "video_segment_1.mp4");
    }

    #[test]
    fn test_overview_accessors() {
        let overview = MatchOverview(json!({
            "current_game_context": {"current_context": "Bottom of the 7th."},
            "pattern_analysis": {"engagement_analysis": "High.", "pattern_analysis": ""},
            "play_analysis": {"pitch_analysis": "Curveballs away."},
        }));
        assert_eq!(overview.current_context(), Some("Bottom of the 7th."));
        let sections = overview.sections();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].title, "Pattern Analysis");
        assert_eq!(sections[0].paragraphs, vec!["High.".to_string()]);
        assert_eq!(sections[1].title, "Play Analysis");
        assert!(MatchOverview::default().current_context().is_none());
    }
}
