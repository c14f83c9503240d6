use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Where the bytes of an [`ImageFile`] live.
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// Bytes already held in memory.
    Memory(Vec<u8>),
    /// A file on disk, read lazily when the bytes are needed.
    Path(PathBuf),
}

/// A file-like object offered to the upload box.
#[derive(Debug, Clone)]
pub struct ImageFile {
    pub name: String,
    pub mime_type: String,
    pub source: ImageSource,
}

impl ImageFile {
    /// Wrap in-memory bytes with an explicit MIME type.
    pub fn from_bytes(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            source: ImageSource::Memory(bytes.into()),
        }
    }

    /// Reference a file on disk. The MIME type is inferred from the extension;
    /// unknown extensions become `application/octet-stream`.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mime_type = mime_for_path(&path)
            .unwrap_or("application/octet-stream")
            .to_string();
        Self {
            name,
            mime_type,
            source: ImageSource::Path(path),
        }
    }

    /// True when the MIME type is in the `image/` family.
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    /// Read the full content without blocking the runtime.
    pub async fn read_bytes(&self) -> std::io::Result<Vec<u8>> {
        match &self.source {
            ImageSource::Memory(bytes) => Ok(bytes.clone()),
            ImageSource::Path(path) => tokio::fs::read(path).await,
        }
    }
}

/// The image currently staged for generation.
#[derive(Debug, Clone)]
pub enum UploadedImage {
    LocalFile(ImageFile),
    RemoteUrl(String),
}

impl UploadedImage {
    /// File extension used when deriving the outbound input filename.
    pub fn extension(&self) -> &'static str {
        match self {
            UploadedImage::LocalFile(file) => extension_for_mime(&file.mime_type),
            UploadedImage::RemoteUrl(_) => "jpg",
        }
    }
}

/// Identifiers carried by a CRM form submission message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSubmission {
    pub contact_id: String,
    pub file_id: String,
}

/// The parsed response of the generation webhook.
#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub output_image_url: String,
    /// Full response body, for callers that want fields the pipeline ignores.
    pub raw: serde_json::Value,
}

/// Stages of a single Generate invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PipelinePhase {
    Idle,
    Validating,
    Encoding,
    Dispatching,
    ResultHandling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NotificationLevel {
    Success,
    Failure,
}

/// A user-visible message (the widget's alert).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Success,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Failure,
            message: message.into(),
        }
    }
}

/// Snapshot of everything the widget shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetState {
    pub placeholder_visible: bool,
    pub preview_src: Option<String>,
    pub loading: bool,
    pub generate_enabled: bool,
    pub notification: Option<Notification>,
}

impl Default for WidgetState {
    fn default() -> Self {
        Self {
            placeholder_visible: true,
            preview_src: None,
            loading: false,
            generate_enabled: false,
            notification: None,
        }
    }
}

/// Emitted whenever the widget state changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WidgetEvent {
    #[serde(rename_all = "camelCase")]
    PreviewUpdated { src: String },
    #[serde(rename_all = "camelCase")]
    GenerateEnabled { enabled: bool },
    #[serde(rename_all = "camelCase")]
    LoadingChanged { loading: bool },
    #[serde(rename_all = "camelCase")]
    Notified { notification: Notification },
    #[serde(rename_all = "camelCase")]
    Persisted { image_url: String },
}

pub(crate) fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "bmp" => Some("image/bmp"),
        "svg" => Some("image/svg+xml"),
        "avif" => Some("image/avif"),
        "heic" => Some("image/heic"),
        "pdf" => Some("application/pdf"),
        "txt" => Some("text/plain"),
        _ => None,
    }
}

pub(crate) fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "image/bmp" => "bmp",
        "image/svg+xml" => "svg",
        "image/avif" => "avif",
        "image/heic" => "heic",
        _ => "jpg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_path_infers_mime() {
        assert_eq!(ImageFile::from_path("shots/photo.JPG").mime_type, "image/jpeg");
        assert_eq!(ImageFile::from_path("a.webp").mime_type, "image/webp");
        assert_eq!(ImageFile::from_path("document.pdf").mime_type, "application/pdf");
        assert_eq!(
            ImageFile::from_path("archive.tar.zst").mime_type,
            "application/octet-stream"
        );
        assert_eq!(ImageFile::from_path("shots/photo.jpg").name, "photo.jpg");
    }

    #[test]
    fn test_is_image() {
        assert!(ImageFile::from_bytes("x.png", "image/png", vec![1]).is_image());
        assert!(!ImageFile::from_bytes("x.pdf", "application/pdf", vec![1]).is_image());
        assert!(!ImageFile::from_bytes("x", "", vec![1]).is_image());
    }

    #[test]
    fn test_extension_for_staged_image() {
        let png = UploadedImage::LocalFile(ImageFile::from_bytes("a.png", "image/png", vec![]));
        assert_eq!(png.extension(), "png");
        let jpeg = UploadedImage::LocalFile(ImageFile::from_bytes("a.jpg", "image/jpeg", vec![]));
        assert_eq!(jpeg.extension(), "jpg");
        let remote = UploadedImage::RemoteUrl("https://cdn.local/a.png".into());
        assert_eq!(remote.extension(), "jpg");
    }

    #[tokio::test]
    async fn test_read_bytes_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.png");
        std::fs::write(&path, [0x89, b'P', b'N', b'G']).unwrap();

        let file = ImageFile::from_path(&path);
        assert_eq!(file.read_bytes().await.unwrap(), vec![0x89, b'P', b'N', b'G']);

        let missing = ImageFile::from_path(dir.path().join("gone.png"));
        assert!(missing.read_bytes().await.is_err());
    }

    #[test]
    fn test_widget_defaults() {
        let state = WidgetState::default();
        assert!(state.placeholder_visible);
        assert!(state.preview_src.is_none());
        assert!(!state.generate_enabled);
        assert!(!state.loading);
    }

    #[test]
    fn test_event_serialization() {
        let event = WidgetEvent::Persisted {
            image_url: "https://x/out.jpg".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"type":"persisted","imageUrl":"https://x/out.jpg"}"#);

        let event = WidgetEvent::Notified {
            notification: Notification::failure("nope"),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["notification"]["level"], "failure");
    }
}
