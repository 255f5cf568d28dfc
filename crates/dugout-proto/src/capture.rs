//! Encoding of captured clips for `/save-segment`.

use std::path::Path;

use base64::Engine;

pub const DATA_URL_PREFIX: &str = "data:video/mp4;base64,";

pub fn encode_data_url(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(DATA_URL_PREFIX.len() + bytes.len() * 4 / 3 + 4);
    out.push_str(DATA_URL_PREFIX);
    base64::engine::general_purpose::STANDARD.encode_string(bytes, &mut out);
    out
}

/// Read a finished capture file into a data URL.  An empty file is an error:
/// mpv writes nothing when the stream could not be recorded.
pub async fn read_capture(path: &Path) -> anyhow::Result<String> {
    let bytes = tokio::fs::read(path).await?;
    if bytes.is_empty() {
        anyhow::bail!("capture {} is empty", path.display());
    }
    Ok(encode_data_url(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_data_url() {
        assert_eq!(encode_data_url(b"abc"), "data:video/mp4;base64,YWJj");
        assert_eq!(encode_data_url(b""), DATA_URL_PREFIX);
    }

    #[tokio::test]
    async fn test_read_capture() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        tokio::fs::write(&path, b"\x00\x00\x00\x18ftypmp42").await.unwrap();
        let url = read_capture(&path).await.unwrap();
        assert!(url.starts_with(DATA_URL_PREFIX));

        let empty = dir.path().join("empty.mp4");
        tokio::fs::write(&empty, b"").await.unwrap();
        assert!(read_capture(&empty).await.is_err());
        assert!(read_capture(&dir.path().join("missing.mp4")).await.is_err());
    }
}
