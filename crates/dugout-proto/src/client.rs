//! HTTP client for the analysis backend.

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::config::BackendConfig;
use crate::protocol::{
    AnalyzeRequest, AnalyzeResponse, LatestVideoResponse, MatchOverview, MatchOverviewRequest,
    SaveSegmentRequest, SaveSegmentResponse, SegmentId, SegmentList,
};

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{endpoint} returned HTTP {status}")]
    Status {
        endpoint: &'static str,
        status: StatusCode,
    },
    #[error("{endpoint} returned an unreadable body: {source}")]
    Decode {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Cheaply cloneable; every background task gets its own copy.
#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(config: &BackendConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self::with_client(http, &config.base_url))
    }

    pub fn with_client(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Playback source for a segment; handed straight to the player.
    pub fn stream_url(&self, segment: &str) -> String {
        let base = self.url("/stream-segment");
        match reqwest::Url::parse_with_params(&base, &[("segmentName", segment)]) {
            Ok(url) => url.to_string(),
            Err(_) => format!("{}?segmentName={}", base, segment),
        }
    }

    /// Where a clip persisted by `/save-segment` can be fetched from.
    pub fn saved_segment_url(&self, file_name: &str) -> String {
        format!("{}/saved_segments/{}", self.base_url, file_name)
    }

    pub async fn list_segments(&self) -> BackendResult<Vec<SegmentId>> {
        let list: SegmentList = self.get_json("/list-segments").await?;
        Ok(list.segments)
    }

    pub async fn analyze(&self, request: &AnalyzeRequest) -> BackendResult<AnalyzeResponse> {
        self.post_json("/analyze", request).await
    }

    pub async fn save_segment(&self, data_url: String) -> BackendResult<SaveSegmentResponse> {
        let body = SaveSegmentRequest {
            video_data: data_url,
        };
        self.post_json("/save-segment", &body).await
    }

    pub async fn latest_video(&self) -> BackendResult<String> {
        let latest: LatestVideoResponse = self.get_json("/get-latest-video").await?;
        Ok(latest.latest_video_file)
    }

    pub async fn match_overview(&self, segment: &str) -> BackendResult<MatchOverview> {
        let body = MatchOverviewRequest {
            chunk_number: segment.to_string(),
        };
        self.post_json("/match-overview", &body).await
    }

    async fn get_json<T: DeserializeOwned>(&self, endpoint: &'static str) -> BackendResult<T> {
        debug!("backend: GET {}", endpoint);
        let response = self
            .http
            .get(self.url(endpoint))
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|source| BackendError::Transport { endpoint, source })?;
        Self::decode(endpoint, response).await
    }

    async fn post_json<B, T>(&self, endpoint: &'static str, body: &B) -> BackendResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        debug!("backend: POST {}", endpoint);
        let response = self
            .http
            .post(self.url(endpoint))
            .json(body)
            .send()
            .await
            .map_err(|source| BackendError::Transport { endpoint, source })?;
        Self::decode(endpoint, response).await
    }

    async fn decode<T: DeserializeOwned>(
        endpoint: &'static str,
        response: reqwest::Response,
    ) -> BackendResult<T> {
        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status { endpoint, status });
        }
        response
            .json()
            .await
            .map_err(|source| BackendError::Decode { endpoint, source })
    }
}
