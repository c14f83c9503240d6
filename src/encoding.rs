use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::config::PayloadFormat;
use crate::error::{PipelineError, Result};
use crate::types::{ImageFile, UploadedImage};

/// Image payload ready to be placed in the webhook body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportPayload(pub String);

impl TransportPayload {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Encode `bytes` as `data:<mime>;base64,<payload>`.
pub fn to_data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", BASE64.encode(bytes))
}

/// Drop a leading `data:<mime>;base64,` prefix. Input without one is
/// returned unchanged.
pub fn strip_data_url_prefix(s: &str) -> &str {
    if !s.starts_with("data:") {
        return s;
    }
    match s.find(";base64,") {
        Some(idx) => &s[idx + ";base64,".len()..],
        None => s,
    }
}

/// Read a file to completion and render it as a data URL.
pub async fn read_as_data_url(file: &ImageFile) -> Result<String> {
    let bytes = file
        .read_bytes()
        .await
        .map_err(|e| PipelineError::Encoding(format!("{}: {}", file.name, e)))?;
    Ok(to_data_url(&file.mime_type, &bytes))
}

/// Turn the staged image into the webhook payload for `format`.
///
/// Remote URLs pass through verbatim; local files are read and base64
/// encoded, keeping the data-URL prefix only for [`PayloadFormat::DataUrl`].
pub async fn encode_for_transport(
    image: &UploadedImage,
    format: PayloadFormat,
) -> Result<TransportPayload> {
    match image {
        UploadedImage::RemoteUrl(url) => Ok(TransportPayload(url.clone())),
        UploadedImage::LocalFile(file) => {
            let data_url = read_as_data_url(file).await?;
            let payload = match format {
                PayloadFormat::DataUrl => data_url,
                PayloadFormat::RawBase64 => strip_data_url_prefix(&data_url).to_string(),
            };
            tracing::debug!(
                file = %file.name,
                bytes = payload.len(),
                "Encoded image for transport"
            );
            Ok(TransportPayload(payload))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_data_url() {
        assert_eq!(to_data_url("image/png", b"abc"), "data:image/png;base64,YWJj");
        assert_eq!(to_data_url("image/jpeg", b""), "data:image/jpeg;base64,");
    }

    #[test]
    fn test_strip_prefix() {
        assert_eq!(strip_data_url_prefix("data:image/png;base64,YWJj"), "YWJj");
        assert_eq!(strip_data_url_prefix("data:image/svg+xml;base64,PHN2Zz4="), "PHN2Zz4=");
        assert_eq!(strip_data_url_prefix("YWJj"), "YWJj");
        assert_eq!(
            strip_data_url_prefix("data:text/plain,hello"),
            "data:text/plain,hello"
        );
    }

    #[tokio::test]
    async fn test_remote_url_passes_through() {
        let image = UploadedImage::RemoteUrl("https://cdn.local/in.jpg".into());
        for format in [PayloadFormat::DataUrl, PayloadFormat::RawBase64] {
            let payload = encode_for_transport(&image, format).await.unwrap();
            assert_eq!(payload.as_str(), "https://cdn.local/in.jpg");
        }
    }

    #[tokio::test]
    async fn test_local_file_per_format() {
        let image = UploadedImage::LocalFile(ImageFile::from_bytes("p.png", "image/png", b"abc".to_vec()));

        let data_url = encode_for_transport(&image, PayloadFormat::DataUrl).await.unwrap();
        assert_eq!(data_url.as_str(), "data:image/png;base64,YWJj");

        let raw = encode_for_transport(&image, PayloadFormat::RawBase64).await.unwrap();
        assert_eq!(raw.as_str(), "YWJj");
    }

    #[tokio::test]
    async fn test_read_failure_is_encoding_error() {
        let image = UploadedImage::LocalFile(ImageFile::from_path("/no/such/dir/photo.jpg"));
        let err = encode_for_transport(&image, PayloadFormat::DataUrl)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Encoding(_)));
        assert!(err.to_string().contains("photo.jpg"));
    }
}
