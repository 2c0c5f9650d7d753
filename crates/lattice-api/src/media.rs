use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use thiserror::Error;

/// URL transformation steps understood by the image pipeline, rendered
/// as `tr:` path segments in the served URL.
#[derive(Debug, Clone, Copy)]
pub enum Transform {
    QualityAuto,
    Format(&'static str),
    Width(u32),
}

impl Transform {
    fn render(&self) -> String {
        match self {
            Self::QualityAuto => "q-auto".to_string(),
            Self::Format(f) => format!("f-{}", f),
            Self::Width(w) => format!("w-{}", w),
        }
    }
}

/// Transformations applied to chat images before they are linked.
pub const CHAT_IMAGE_TRANSFORMS: &[Transform] = &[
    Transform::QualityAuto,
    Transform::Format("webp"),
    Transform::Width(1280),
];

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("upload request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("upload rejected: {0}")]
    Rejected(String),
}

/// External image pipeline, treated as a black box that stores a blob
/// and serves it back under a stable URL. A trait so ingest tests can
/// stub success and failure.
#[async_trait]
pub trait MediaPipeline: Send + Sync {
    /// Store `bytes` under `filename`; returns the pipeline-internal
    /// file path.
    async fn upload(&self, bytes: Bytes, filename: &str) -> Result<String, MediaError>;

    /// Public URL for a stored file with the given transformations.
    fn url_for(&self, file_path: &str, transforms: &[Transform]) -> String;
}

/// HTTP adapter for the hosted image pipeline.
pub struct HttpMediaPipeline {
    http: reqwest::Client,
    upload_url: String,
    url_endpoint: String,
}

#[derive(Deserialize)]
struct UploadResult {
    file_path: String,
}

impl HttpMediaPipeline {
    pub fn new(upload_url: String, url_endpoint: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            upload_url,
            url_endpoint,
        }
    }
}

#[async_trait]
impl MediaPipeline for HttpMediaPipeline {
    async fn upload(&self, bytes: Bytes, filename: &str) -> Result<String, MediaError> {
        let part = reqwest::multipart::Part::bytes(bytes.to_vec()).file_name(filename.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);

        let resp = self.http.post(&self.upload_url).multipart(form).send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(MediaError::Rejected(format!("{}: {}", status, body)));
        }

        let result: UploadResult = resp.json().await?;
        Ok(result.file_path)
    }

    fn url_for(&self, file_path: &str, transforms: &[Transform]) -> String {
        let endpoint = self.url_endpoint.trim_end_matches('/');
        let path = file_path.trim_start_matches('/');

        let tr = transforms
            .iter()
            .map(Transform::render)
            .collect::<Vec<_>>()
            .join(",");

        if tr.is_empty() {
            format!("{}/{}", endpoint, path)
        } else {
            format!("{}/tr:{}/{}", endpoint, tr, path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline() -> HttpMediaPipeline {
        HttpMediaPipeline::new(
            "https://upload.media.test/files".to_string(),
            "https://media.test/lattice/".to_string(),
        )
    }

    #[test]
    fn url_for_composes_transform_segment() {
        let url = pipeline().url_for("/chat/pic.png", CHAT_IMAGE_TRANSFORMS);
        assert_eq!(
            url,
            "https://media.test/lattice/tr:q-auto,f-webp,w-1280/chat/pic.png"
        );
    }

    #[test]
    fn url_for_without_transforms_is_plain() {
        let url = pipeline().url_for("chat/pic.png", &[]);
        assert_eq!(url, "https://media.test/lattice/chat/pic.png");
    }
}
