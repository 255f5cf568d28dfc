//! Match overview for the current segment.

use tracing::{debug, warn};

use crate::client::BackendResult;
use crate::protocol::{MatchOverview, SegmentId, DEFAULT_SEGMENT};

pub type Generation = u64;

/// Holds the latest overview.  Every request bumps the generation and only a
/// response for the newest generation is kept, so a slow answer for an older
/// segment can never overwrite a newer one.
#[derive(Debug, Clone, Default)]
pub struct ContextTracker {
    generation: Generation,
    overview: Option<MatchOverview>,
    chunk: Option<SegmentId>,
}

impl ContextTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn overview(&self) -> Option<&MatchOverview> {
        self.overview.as_ref()
    }

    /// Segment the newest request was made for.
    pub fn chunk(&self) -> Option<&str> {
        self.chunk.as_deref()
    }

    /// Start a fetch for `segment`, or the default segment when none is buffered.
    pub fn request(&mut self, segment: Option<&str>) -> (Generation, SegmentId) {
        self.generation += 1;
        let chunk = segment.unwrap_or(DEFAULT_SEGMENT).to_string();
        self.chunk = Some(chunk.clone());
        (self.generation, chunk)
    }

    /// Returns true when the overview was replaced.
    pub fn accept(&mut self, generation: Generation, outcome: BackendResult<MatchOverview>) -> bool {
        if generation != self.generation {
            debug!(
                "context: dropping overview gen={} (latest {})",
                generation, self.generation
            );
            return false;
        }
        match outcome {
            Ok(overview) => {
                if let Some(err) = overview.error() {
                    warn!("context: backend reported error: {}", err);
                }
                self.overview = Some(overview);
                true
            }
            Err(e) => {
                warn!("context: match overview failed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_latest_generation_wins() {
        let mut ctx = ContextTracker::new();
        let (old, chunk) = ctx.request(Some("s0"));
        assert_eq!(chunk, "s0");
        let (new, _) = ctx.request(Some("s1"));

        let newer = MatchOverview(json!({"current_game_context": {"current_context": "s1"}}));
        assert!(ctx.accept(new, Ok(newer)));

        let older = MatchOverview(json!({"current_game_context": {"current_context": "s0"}}));
        assert!(!ctx.accept(old, Ok(older)));
        assert_eq!(ctx.overview().unwrap().current_context(), Some("s1"));
    }

    #[test]
    fn test_default_chunk() {
        let mut ctx = ContextTracker::new();
        let (_, chunk) = ctx.request(None);
        assert_eq!(chunk, DEFAULT_SEGMENT);
        assert_eq!(ctx.chunk(), Some(DEFAULT_SEGMENT));
    }

    #[test]
    fn test_failure_keeps_previous() {
        use crate::client::BackendError;
        let mut ctx = ContextTracker::new();
        let (g, _) = ctx.request(None);
        ctx.accept(g, Ok(MatchOverview(json!({"current_game_context": {"current_context": "x"}}))));
        let (g, _) = ctx.request(None);
        let failed = ctx.accept(
            g,
            Err(BackendError::Status {
                endpoint: "/match-overview",
                status: reqwest::StatusCode::BAD_GATEWAY,
            }),
        );
        assert!(!failed);
        assert_eq!(ctx.overview().unwrap().current_context(), Some("x"));
    }
}
