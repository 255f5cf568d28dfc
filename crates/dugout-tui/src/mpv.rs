//! mpv as the video surface, driven over its JSON IPC.
//!
//! dugout starts its own mpv with a per-process socket and kills it on exit.
//! The connection is split in two tasks:
//!
//! ```text
//!   MpvHandle::send ──► writer ──► socket ──► reader ─┬─► reply (matched by request_id)
//!                                                     └─► MpvEvent (event_tx)
//! ```
//!
//! Unix uses a domain socket, Windows a named pipe `\\.\pipe\<name>`.

use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info, warn};

static NEXT_REQ_ID: AtomicU64 = AtomicU64::new(1);

/// observe_property ids, matched in property-change events.
pub const OBS_PAUSE: u64 = 2;
pub const OBS_TIME_POS: u64 = 4;
pub const OBS_DURATION: u64 = 5;

const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

type Reply = oneshot::Sender<anyhow::Result<Value>>;
type Pending = Arc<Mutex<HashMap<u64, Reply>>>;

struct Request {
    id: u64,
    line: String,
    reply: Reply,
}

/// Something mpv said without being asked.
#[derive(Debug, Clone)]
pub struct MpvEvent {
    pub raw: Value,
}

impl MpvEvent {
    /// `(observe id, data)` of a property-change event.
    pub fn as_property_change(&self) -> Option<(u64, &Value)> {
        if self.event_name()? != "property-change" {
            return None;
        }
        let id = self.raw.get("id")?.as_u64()?;
        Some((id, self.raw.get("data").unwrap_or(&Value::Null)))
    }

    pub fn event_name(&self) -> Option<&str> {
        self.raw.get("event")?.as_str()
    }

    /// `reason` of an end-file event: "eof", "stop", "error", "quit"...
    pub fn end_reason(&self) -> Option<&str> {
        if self.event_name()? != "end-file" {
            return None;
        }
        self.raw.get("reason")?.as_str()
    }
}

// ── handle ────────────────────────────────────────────────────────────────────

/// Cloneable sender side of one mpv connection.
#[derive(Clone)]
pub struct MpvHandle {
    tx: mpsc::Sender<Request>,
}

impl MpvHandle {
    /// Send one IPC command and wait for its reply.
    pub async fn send(&self, command: Value) -> anyhow::Result<Value> {
        let id = NEXT_REQ_ID.fetch_add(1, Ordering::Relaxed);
        let mut line = serde_json::to_string(&json!({ "command": command, "request_id": id }))?;
        line.push('\n');

        let (reply, reply_rx) = oneshot::channel();
        self.tx
            .send(Request { id, line, reply })
            .await
            .map_err(|_| anyhow::anyhow!("mpv connection closed"))?;

        match tokio::time::timeout(REPLY_TIMEOUT, reply_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => anyhow::bail!("mpv dropped request {}", id),
            Err(_) => anyhow::bail!("mpv did not answer request {}", id),
        }
    }

    pub async fn load_stream(&self, url: &str, volume: f32) -> anyhow::Result<()> {
        debug!("mpv: loadfile {}", url);
        self.send(json!(["loadfile", url, "replace"])).await?;
        if let Err(e) = self.set_volume(volume).await {
            debug!("mpv: volume after load failed: {}", e);
        }
        Ok(())
    }

    pub async fn stop(&self) -> anyhow::Result<()> {
        self.send(json!(["stop"])).await.map(drop)
    }

    pub async fn set_volume(&self, vol: f32) -> anyhow::Result<()> {
        self.set_property("volume", json!(volume_percent(vol))).await
    }

    pub async fn set_pause(&self, paused: bool) -> anyhow::Result<()> {
        self.set_property("pause", json!(paused)).await
    }

    pub async fn seek_to(&self, secs: f64) -> anyhow::Result<()> {
        self.set_property("time-pos", json!(secs)).await
    }

    pub async fn seek_relative(&self, secs: f64) -> anyhow::Result<()> {
        self.send(json!(["seek", secs, "relative"])).await.map(drop)
    }

    /// Theater mode is the mpv window going fullscreen.
    pub async fn set_fullscreen(&self, on: bool) -> anyhow::Result<()> {
        self.set_property("fullscreen", json!(on)).await
    }

    /// Copy the playing stream to `path` until cleared or the file ends.
    pub async fn start_recording(&self, path: &Path) -> anyhow::Result<()> {
        self.set_property("stream-record", json!(path.to_string_lossy()))
            .await
    }

    /// Clearing `stream-record` closes the file.
    pub async fn stop_recording(&self) -> anyhow::Result<()> {
        self.set_property("stream-record", json!("")).await
    }

    /// Needed once per fresh connection.
    pub async fn observe_all_properties(&self) {
        for (id, name) in [
            (OBS_PAUSE, "pause"),
            (OBS_TIME_POS, "time-pos"),
            (OBS_DURATION, "duration"),
        ] {
            if let Err(e) = self.send(json!(["observe_property", id, name])).await {
                warn!("mpv: observe_property {} failed: {}", name, e);
            }
        }
    }

    async fn set_property(&self, name: &str, value: Value) -> anyhow::Result<()> {
        self.send(json!(["set_property", name, value])).await.map(drop)
    }
}

fn volume_percent(vol: f32) -> f32 {
    (vol * 100.0).clamp(0.0, 100.0)
}

// ── driver ────────────────────────────────────────────────────────────────────

/// Window stays up between segments; a finished segment reports `eof`
/// instead of being held on its last frame.
const VIDEO_ARGS: &[&str] = &[
    "--idle=yes",
    "--force-window=yes",
    "--keep-open=no",
    "--title=dugout",
    "--quiet",
];

/// Owns the mpv child process.  A dead process is replaced by spawning a
/// new one; the core decides when.
pub struct MpvDriver {
    socket_name: String,
    binary: Option<PathBuf>,
    process: Option<tokio::process::Child>,
    pub last_volume: f32,
}

impl MpvDriver {
    pub fn new() -> Self {
        Self::with_binary(dugout_proto::platform::find_mpv_binary())
    }

    /// `None` means no mpv is available and every spawn fails.
    pub fn with_binary(binary: Option<PathBuf>) -> Self {
        Self {
            socket_name: dugout_proto::platform::mpv_socket_name(),
            binary,
            process: None,
            last_volume: 0.8,
        }
    }

    pub fn process_alive(&mut self) -> bool {
        let Some(child) = self.process.as_mut() else {
            return false;
        };
        match child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                warn!("mpv exited: {}", status);
                false
            }
            Err(e) => {
                warn!("mpv liveness check failed: {}", e);
                false
            }
        }
    }

    pub async fn kill(&mut self) {
        if let Some(mut p) = self.process.take() {
            let _ = p.kill().await;
        }
        #[cfg(unix)]
        {
            let _ = tokio::fs::remove_file(&self.socket_name).await;
        }
    }

    /// Start a fresh mpv (replacing ours if any) and connect to it.
    pub async fn spawn_and_connect(
        &mut self,
        event_tx: mpsc::Sender<MpvEvent>,
    ) -> anyhow::Result<MpvHandle> {
        let binary = self
            .binary
            .clone()
            .ok_or_else(|| anyhow::anyhow!("mpv binary not found"))?;
        self.kill().await;

        let stderr_path = dugout_proto::platform::data_dir().join("mpv-stderr.log");
        let stderr_file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&stderr_path)?;

        let child = tokio::process::Command::new(&binary)
            .args(VIDEO_ARGS)
            .arg(dugout_proto::platform::mpv_socket_arg())
            .arg(format!("--volume={}", volume_percent(self.last_volume).round()))
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(stderr_file)
            .kill_on_drop(true)
            .spawn()?;
        info!(
            "mpv: started pid {:?}, stderr in {:?}",
            child.id(),
            stderr_path
        );
        self.process = Some(child);

        let stream = connect_ipc(&self.socket_name).await?;
        info!("mpv: IPC connected");
        Ok(start_io(stream, event_tx))
    }
}

#[cfg(unix)]
async fn connect_ipc(socket_name: &str) -> anyhow::Result<tokio::net::UnixStream> {
    let path = Path::new(socket_name);
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        if path.exists() {
            if let Ok(stream) = tokio::net::UnixStream::connect(path).await {
                return Ok(stream);
            }
        }
    }
    anyhow::bail!("mpv IPC socket {} did not come up", socket_name)
}

#[cfg(windows)]
async fn connect_ipc(
    socket_name: &str,
) -> anyhow::Result<tokio::net::windows::named_pipe::NamedPipeClient> {
    use tokio::net::windows::named_pipe::ClientOptions;

    let pipe = format!(r"\\.\pipe\{}", socket_name);
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        if let Ok(client) = ClientOptions::new().open(&pipe) {
            return Ok(client);
        }
    }
    anyhow::bail!("mpv named pipe {} did not come up", pipe)
}

/// Split `stream` into the reader and writer tasks.
fn start_io<S>(stream: S, event_tx: mpsc::Sender<MpvEvent>) -> MpvHandle
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (read_half, write_half) = tokio::io::split(stream);
    let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
    let (tx, rx) = mpsc::channel::<Request>(64);

    tokio::spawn(writer_task(write_half, rx, Arc::clone(&pending)));
    tokio::spawn(reader_task(BufReader::new(read_half), pending, event_tx));

    MpvHandle { tx }
}

// ── IO tasks ──────────────────────────────────────────────────────────────────

async fn reader_task<R>(reader: BufReader<R>, pending: Pending, event_tx: mpsc::Sender<MpvEvent>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = reader.lines();
    let reason = loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break "closed".to_string(),
            Err(e) => break e.to_string(),
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let val: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                debug!("mpv reader: skipping bad line {:?}: {}", line, e);
                continue;
            }
        };

        match val.get("request_id").and_then(Value::as_u64) {
            Some(id) => match pending.lock().await.remove(&id) {
                Some(reply) => {
                    let _ = reply.send(reply_result(val));
                }
                None => debug!("mpv reader: reply to unknown request {}", id),
            },
            None => {
                if event_tx.send(MpvEvent { raw: val }).await.is_err() {
                    break "event receiver gone".to_string();
                }
            }
        }
    };
    debug!("mpv reader: stopping ({})", reason);
    for (_, reply) in pending.lock().await.drain() {
        let _ = reply.send(Err(anyhow::anyhow!("mpv connection {}", reason)));
    }
}

async fn writer_task<W>(mut writer: W, mut rx: mpsc::Receiver<Request>, pending: Pending)
where
    W: AsyncWrite + Unpin,
{
    while let Some(req) = rx.recv().await {
        // Registered first so the reader can never see an unknown reply.
        pending.lock().await.insert(req.id, req.reply);
        debug!("mpv writer: {}", req.line.trim_end());
        if let Err(e) = writer.write_all(req.line.as_bytes()).await {
            warn!("mpv writer: {}", e);
            if let Some(reply) = pending.lock().await.remove(&req.id) {
                let _ = reply.send(Err(anyhow::anyhow!("mpv write failed: {}", e)));
            }
            break;
        }
    }
}

/// mpv answers every command with `"error": "success"` or an error name.
fn reply_result(val: Value) -> anyhow::Result<Value> {
    match val.get("error").and_then(Value::as_str) {
        Some("success") => Ok(val),
        Some(err) => Err(anyhow::anyhow!("mpv error: {}", err)),
        None => Err(anyhow::anyhow!("mpv reply without status")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_change() {
        let evt = MpvEvent {
            raw: json!({"event": "property-change", "id": OBS_TIME_POS, "name": "time-pos", "data": 12.5}),
        };
        let (id, data) = evt.as_property_change().unwrap();
        assert_eq!(id, OBS_TIME_POS);
        assert_eq!(data.as_f64(), Some(12.5));
        assert_eq!(evt.end_reason(), None);
    }

    #[test]
    fn test_end_file_reason() {
        let eof = MpvEvent {
            raw: json!({"event": "end-file", "reason": "eof", "playlist_entry_id": 3}),
        };
        assert_eq!(eof.event_name(), Some("end-file"));
        assert_eq!(eof.end_reason(), Some("eof"));
        assert!(eof.as_property_change().is_none());

        let loaded = MpvEvent {
            raw: json!({"event": "file-loaded"}),
        };
        assert_eq!(loaded.end_reason(), None);
    }

    #[test]
    fn test_reply_result() {
        assert!(reply_result(json!({"error": "success", "request_id": 1})).is_ok());
        let err = reply_result(json!({"error": "property unavailable"})).unwrap_err();
        assert!(err.to_string().contains("property unavailable"));
    }

    #[tokio::test]
    async fn test_replies_and_events_over_ipc() {
        let (ours, theirs) = tokio::io::duplex(4096);
        let (event_tx, mut event_rx) = mpsc::channel(8);
        let handle = start_io(ours, event_tx);

        // Plays mpv: answers one command, then emits an event.
        let fake = tokio::spawn(async move {
            let (read_half, mut write_half) = tokio::io::split(theirs);
            let mut lines = BufReader::new(read_half).lines();
            let line = lines.next_line().await.unwrap().unwrap();
            let req: Value = serde_json::from_str(&line).unwrap();
            assert_eq!(req["command"], json!(["set_property", "pause", true]));
            let reply = json!({"error": "success", "request_id": req["request_id"]});
            write_half
                .write_all(format!("{}\n{}\n", reply, json!({"event": "file-loaded"})).as_bytes())
                .await
                .unwrap();
        });

        handle.set_pause(true).await.unwrap();
        let evt = event_rx.recv().await.unwrap();
        assert_eq!(evt.event_name(), Some("file-loaded"));

        fake.await.unwrap();
    }

    #[tokio::test]
    async fn test_spawn_without_binary_fails() {
        let mut driver = MpvDriver::with_binary(None);
        let (event_tx, _event_rx) = mpsc::channel(1);
        assert!(driver.spawn_and_connect(event_tx).await.is_err());
        assert!(!driver.process_alive());
    }
}
