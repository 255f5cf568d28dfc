//! Capture bookkeeping for requested clips.
//!
//! mpv does the actual recording (`stream-record`); this module owns the
//! target file, tags each capture with an id so a late timer cannot end the
//! wrong one, and uploads the finished file.

use std::path::{Path, PathBuf};

use dugout_proto::capture::read_capture;
use dugout_proto::client::BackendClient;
use dugout_proto::config::RecorderConfig;
use dugout_proto::protocol::SegmentId;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A capture that has been stopped.  `file` is `None` when no target could
/// be prepared; the clip still ran its window.  The file is removed when this
/// is dropped.
#[derive(Debug)]
pub struct FinishedCapture {
    pub segment: SegmentId,
    file: Option<NamedTempFile>,
}

impl FinishedCapture {
    pub fn path(&self) -> Option<&Path> {
        self.file.as_ref().map(|f| f.path())
    }
}

#[derive(Debug)]
struct ActiveCapture {
    id: Uuid,
    segment: SegmentId,
    file: Option<NamedTempFile>,
}

#[derive(Debug)]
pub struct Recorder {
    enabled: bool,
    dir: PathBuf,
    active: Option<ActiveCapture>,
}

impl Recorder {
    pub fn new(config: &RecorderConfig, dir: PathBuf) -> Self {
        Self {
            enabled: config.enabled,
            dir,
            active: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Whether mpv is writing into a target file right now.
    pub fn is_recording(&self) -> bool {
        self.active.as_ref().is_some_and(|a| a.file.is_some())
    }

    /// Start a capture and reserve its target file.  The capture gets an id
    /// even when the file cannot be created, so its timer is still matched.
    /// Any capture still running is discarded.
    pub fn begin(&mut self, segment: &str) -> (Uuid, Option<PathBuf>) {
        if let Some(prev) = self.active.take() {
            debug!("recorder: discarding unfinished capture of {}", prev.segment);
        }
        let file = match self.create_target() {
            Ok(file) => Some(file),
            Err(e) => {
                warn!("recorder: cannot prepare capture file for {}: {}", segment, e);
                None
            }
        };
        let id = Uuid::new_v4();
        let path = file.as_ref().map(|f| f.path().to_path_buf());
        info!("recorder: capture {} of {} into {:?}", id, segment, path);
        self.active = Some(ActiveCapture {
            id,
            segment: segment.to_string(),
            file,
        });
        (id, path)
    }

    fn create_target(&self) -> anyhow::Result<NamedTempFile> {
        std::fs::create_dir_all(&self.dir)?;
        let file = tempfile::Builder::new()
            .prefix("dugout-capture-")
            .suffix(".mp4")
            .tempfile_in(&self.dir)?;
        Ok(file)
    }

    /// Stop the running capture.  With `Some(id)` only that capture is
    /// stopped; a mismatch means the timer outlived its capture.
    pub fn finish(&mut self, id: Option<Uuid>) -> Option<FinishedCapture> {
        match (&self.active, id) {
            (Some(active), Some(id)) if active.id != id => {
                debug!("recorder: ignoring stale capture timer {}", id);
                None
            }
            (None, _) => None,
            _ => self.active.take().map(|active| FinishedCapture {
                segment: active.segment,
                file: active.file,
            }),
        }
    }
}

/// Read, encode and store a finished capture, then resolve where the backend
/// published it.  Returns the media URL for the transcript.
pub async fn upload(client: &BackendClient, capture: FinishedCapture) -> anyhow::Result<String> {
    let path = capture
        .path()
        .ok_or_else(|| anyhow::anyhow!("capture of {} has no file", capture.segment))?;
    let data_url = read_capture(path).await?;
    info!(
        "recorder: uploading capture of {} ({} bytes encoded)",
        capture.segment,
        data_url.len()
    );
    client.save_segment(data_url).await?;
    let file = client.latest_video().await?;
    Ok(client.saved_segment_url(&file))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder(dir: &Path) -> Recorder {
        Recorder::new(&RecorderConfig::default(), dir.to_path_buf())
    }

    #[test]
    fn test_begin_creates_target() {
        let dir = tempfile::tempdir().unwrap();
        let mut rec = recorder(dir.path());
        let (_, path) = rec.begin("segment_001.mp4");
        let path = path.unwrap();
        assert!(path.exists());
        assert!(path.starts_with(dir.path()));
        assert!(rec.is_active());
        assert!(rec.is_recording());
    }

    #[test]
    fn test_stale_timer_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let mut rec = recorder(dir.path());
        let (first, _) = rec.begin("segment_001.mp4");
        let (second, _) = rec.begin("segment_002.mp4");

        assert!(rec.finish(Some(first)).is_none());
        let done = rec.finish(Some(second)).unwrap();
        assert_eq!(done.segment, "segment_002.mp4");
        assert!(!rec.is_active());
        assert!(rec.finish(Some(second)).is_none());
    }

    #[test]
    fn test_finish_without_id_and_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let mut rec = recorder(dir.path());
        let (_, path) = rec.begin("segment_004.mp4");
        let path = path.unwrap();
        let done = rec.finish(None).unwrap();
        assert_eq!(done.path(), Some(path.as_path()));
        drop(done);
        assert!(!path.exists());
    }

    #[test]
    fn test_stale_timer_ignored_without_target_file() {
        // A regular file where the capture directory should be.
        let blocker = tempfile::NamedTempFile::new().unwrap();
        let mut rec = recorder(blocker.path());

        let (first, path) = rec.begin("segment_005.mp4");
        assert!(path.is_none());
        assert!(rec.is_active());
        assert!(!rec.is_recording());
        let (second, _) = rec.begin("segment_006.mp4");

        assert!(rec.finish(Some(first)).is_none());
        assert!(rec.is_active());
        let done = rec.finish(Some(second)).unwrap();
        assert_eq!(done.segment, "segment_006.mp4");
        assert!(done.path().is_none());
    }
}
