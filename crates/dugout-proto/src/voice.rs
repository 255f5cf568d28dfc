//! Single-utterance voice input.
//!
//! At most one recognition session is active.  Every session gets a fresh id
//! and outcomes carrying any other id are dropped.

use uuid::Uuid;

pub const RECOGNITION_FAILED: &str = "Speech recognition failed. Please try again.";
pub const RECOGNITION_UNAVAILABLE: &str = "Speech recognition is not configured.";

#[derive(Debug, Clone, PartialEq)]
pub enum VoiceOutcome {
    Result(String),
    Error(String),
    End,
}

#[derive(Debug, Clone, PartialEq)]
pub enum VoiceCommand {
    Start(Uuid),
    Stop(Uuid),
    /// No recognizer; show this notice.
    Unavailable(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub enum VoiceReaction {
    Dispatch(String),
    Notice(&'static str),
    Reset,
}

#[derive(Debug, Clone, Default)]
pub struct VoiceInput {
    available: bool,
    /// Most recent session, whether or not it is still listening.
    current: Option<Uuid>,
    listening: bool,
}

impl VoiceInput {
    pub fn new(available: bool) -> Self {
        Self {
            available,
            current: None,
            listening: false,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.listening
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    pub fn toggle(&mut self) -> VoiceCommand {
        if !self.available {
            return VoiceCommand::Unavailable(RECOGNITION_UNAVAILABLE);
        }
        match self.current {
            Some(id) if self.listening => {
                self.listening = false;
                VoiceCommand::Stop(id)
            }
            _ => {
                let id = Uuid::new_v4();
                self.current = Some(id);
                self.listening = true;
                VoiceCommand::Start(id)
            }
        }
    }

    /// Returns `None` when `id` is not the most recent session.  A stopped
    /// session still delivers its transcript.
    pub fn on_outcome(&mut self, id: Uuid, outcome: VoiceOutcome) -> Option<VoiceReaction> {
        if self.current != Some(id) {
            return None;
        }
        match outcome {
            VoiceOutcome::Result(text) => Some(VoiceReaction::Dispatch(text)),
            VoiceOutcome::Error(_) => {
                self.listening = false;
                Some(VoiceReaction::Notice(RECOGNITION_FAILED))
            }
            VoiceOutcome::End => {
                self.listening = false;
                Some(VoiceReaction::Reset)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_start_stop() {
        let mut voice = VoiceInput::new(true);
        let id = match voice.toggle() {
            VoiceCommand::Start(id) => id,
            other => panic!("expected start, got {:?}", other),
        };
        assert!(voice.is_recording());
        assert_eq!(voice.toggle(), VoiceCommand::Stop(id));
        assert!(!voice.is_recording());
    }

    #[test]
    fn test_unavailable() {
        let mut voice = VoiceInput::new(false);
        assert_eq!(
            voice.toggle(),
            VoiceCommand::Unavailable(RECOGNITION_UNAVAILABLE)
        );
        assert!(!voice.is_recording());
    }

    #[test]
    fn test_outcomes() {
        let mut voice = VoiceInput::new(true);
        let VoiceCommand::Start(id) = voice.toggle() else {
            panic!("expected start");
        };
        assert_eq!(
            voice.on_outcome(id, VoiceOutcome::Result("Who is pitching?".into())),
            Some(VoiceReaction::Dispatch("Who is pitching?".into()))
        );
        assert!(voice.is_recording());
        assert_eq!(voice.on_outcome(id, VoiceOutcome::End), Some(VoiceReaction::Reset));
        assert!(!voice.is_recording());

        let VoiceCommand::Start(id) = voice.toggle() else {
            panic!("expected start");
        };
        assert_eq!(
            voice.on_outcome(id, VoiceOutcome::Error("no-speech".into())),
            Some(VoiceReaction::Notice(RECOGNITION_FAILED))
        );
        assert!(!voice.is_recording());
    }

    #[test]
    fn test_stale_outcome_ignored() {
        let mut voice = VoiceInput::new(true);
        let VoiceCommand::Start(old) = voice.toggle() else {
            panic!("expected start");
        };
        voice.toggle();
        let VoiceCommand::Start(_new) = voice.toggle() else {
            panic!("expected start");
        };
        assert_eq!(voice.on_outcome(old, VoiceOutcome::End), None);
        assert!(voice.is_recording());
    }
}
