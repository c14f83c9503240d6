use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub const ENV_WEBHOOK: &str = "CONCEPT_GEN_WEBHOOK";
pub const ENV_CRM_LOOKUP: &str = "CONCEPT_GEN_CRM_LOOKUP";
pub const ENV_MEDIA_REPO: &str = "CONCEPT_GEN_MEDIA_REPO";
pub const ENV_FORMAT: &str = "CONCEPT_GEN_FORMAT";
pub const ENV_TIMEOUT_SECS: &str = "CONCEPT_GEN_TIMEOUT_SECS";

/// Webhook contract spoken by the generation endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PayloadFormat {
    /// `{image, prompt, timestamp}` with the image as a full data URL,
    /// answered with `generatedImageUrl`. Results are persisted to the
    /// media repository when one is configured.
    #[default]
    DataUrl,
    /// `{imageBase64, prompt, timestamp, inputFilename, outputFilename}` with
    /// the data-URL prefix stripped, answered with `outputImageUrl`.
    RawBase64,
}

impl PayloadFormat {
    /// Response field holding the generated image URL.
    pub fn output_field(self) -> &'static str {
        match self {
            PayloadFormat::DataUrl => "generatedImageUrl",
            PayloadFormat::RawBase64 => "outputImageUrl",
        }
    }
}

impl FromStr for PayloadFormat {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "data-url" | "data_url" | "dataurl" => Ok(PayloadFormat::DataUrl),
            "raw-base64" | "raw_base64" | "base64" => Ok(PayloadFormat::RawBase64),
            other => Err(PipelineError::Config(format!(
                "Unknown payload format '{}' (expected data-url or raw-base64)",
                other
            ))),
        }
    }
}

/// Endpoints and options for a [`ConceptPipeline`](crate::ConceptPipeline).
///
/// Use [`PipelineConfig::builder()`] to construct one; the builder rejects
/// missing or malformed endpoints.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Generation webhook receiving the image and prompt.
    pub generation_webhook: String,
    /// CRM GET endpoint resolving `contactId`/`fileId` to an image URL.
    pub crm_lookup: Option<String>,
    /// CRM media repository receiving generated results.
    pub media_repo: Option<String>,
    /// Payload contract for the generation webhook.
    pub format: PayloadFormat,
    /// Per-request timeout. `None` leaves the transport default in place.
    pub request_timeout: Option<Duration>,
}

impl PipelineConfig {
    /// Start building a config with the builder pattern.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Load a config from a JSON file with camelCase keys.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("Cannot read {}: {}", path.display(), e))
        })?;
        let file: ConfigFile = serde_json::from_str(&content)?;
        file.into_builder().build()
    }

    /// Load a config from `CONCEPT_GEN_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut builder = PipelineConfig::builder();
        if let Some(url) = get(ENV_WEBHOOK) {
            builder = builder.generation_webhook(url);
        }
        if let Some(url) = get(ENV_CRM_LOOKUP) {
            builder = builder.crm_lookup(url);
        }
        if let Some(url) = get(ENV_MEDIA_REPO) {
            builder = builder.media_repo(url);
        }
        if let Some(format) = get(ENV_FORMAT) {
            builder = builder.format(format.parse()?);
        }
        if let Some(secs) = get(ENV_TIMEOUT_SECS) {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                PipelineError::Config(format!("{} must be whole seconds", ENV_TIMEOUT_SECS))
            })?;
            builder = builder.request_timeout(Duration::from_secs(secs));
        }
        builder.build()
    }
}

/// On-disk representation of [`PipelineConfig`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFile {
    pub generation_webhook: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crm_lookup: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_repo: Option<String>,
    #[serde(default)]
    pub format: PayloadFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
}

impl ConfigFile {
    fn into_builder(self) -> PipelineConfigBuilder {
        let mut builder = PipelineConfig::builder()
            .generation_webhook(self.generation_webhook)
            .format(self.format);
        if let Some(url) = self.crm_lookup {
            builder = builder.crm_lookup(url);
        }
        if let Some(url) = self.media_repo {
            builder = builder.media_repo(url);
        }
        if let Some(secs) = self.request_timeout_secs {
            builder = builder.request_timeout(Duration::from_secs(secs));
        }
        builder
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    generation_webhook: Option<String>,
    crm_lookup: Option<String>,
    media_repo: Option<String>,
    format: PayloadFormat,
    request_timeout: Option<Duration>,
}

impl PipelineConfigBuilder {
    /// Set the generation webhook URL (required).
    pub fn generation_webhook(mut self, url: impl Into<String>) -> Self {
        self.generation_webhook = Some(url.into());
        self
    }

    /// Set the CRM lookup endpoint used for form-submitted images.
    pub fn crm_lookup(mut self, url: impl Into<String>) -> Self {
        self.crm_lookup = Some(url.into());
        self
    }

    /// Set the media repository endpoint for persisting results.
    pub fn media_repo(mut self, url: impl Into<String>) -> Self {
        self.media_repo = Some(url.into());
        self
    }

    /// Choose the webhook payload contract.
    pub fn format(mut self, format: PayloadFormat) -> Self {
        self.format = format;
        self
    }

    /// Apply a per-request timeout to every outbound call.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Validate endpoints and build the final [`PipelineConfig`].
    pub fn build(self) -> Result<PipelineConfig> {
        let webhook = self
            .generation_webhook
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| PipelineError::Config("generation webhook URL is required".into()))?;

        Ok(PipelineConfig {
            generation_webhook: validate_endpoint("generation webhook", webhook)?,
            crm_lookup: self
                .crm_lookup
                .map(|u| validate_endpoint("CRM lookup", u))
                .transpose()?,
            media_repo: self
                .media_repo
                .map(|u| validate_endpoint("media repository", u))
                .transpose()?,
            format: self.format,
            request_timeout: self.request_timeout,
        })
    }
}

/// Endpoints are full URLs sent as configured, so only surrounding
/// whitespace is removed.
pub(crate) fn normalize(endpoint: String) -> String {
    endpoint.trim().to_string()
}

fn validate_endpoint(name: &str, url: String) -> Result<String> {
    let url = normalize(url);
    let parsed = reqwest::Url::parse(&url)
        .map_err(|e| PipelineError::Config(format!("{} URL '{}' is invalid: {}", name, url, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(PipelineError::Config(format!(
            "{} URL must be http(s), got '{}'",
            name, scheme
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_normalize_endpoint() {
        assert_eq!(normalize("http://hooks.local/gen/".into()), "http://hooks.local/gen/");
        assert_eq!(normalize(" http://hooks.local/gen ".into()), "http://hooks.local/gen");
        assert_eq!(normalize("\thttp://hooks.local/webhook/abc/\n".into()), "http://hooks.local/webhook/abc/");
    }

    #[test]
    fn test_builder_requires_webhook() {
        let err = PipelineConfig::builder().build().unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));

        let err = PipelineConfig::builder()
            .generation_webhook("   ")
            .build()
            .unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn test_builder_rejects_bad_urls() {
        let err = PipelineConfig::builder()
            .generation_webhook("not a url")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("generation webhook"));

        let err = PipelineConfig::builder()
            .generation_webhook("https://hooks.local/gen")
            .media_repo("ftp://media.local/upload")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("must be http(s)"));
    }

    #[test]
    fn test_builder_defaults() {
        let config = PipelineConfig::builder()
            .generation_webhook("https://hooks.local/gen/")
            .build()
            .unwrap();
        assert_eq!(config.generation_webhook, "https://hooks.local/gen/");
        assert_eq!(config.format, PayloadFormat::DataUrl);
        assert!(config.crm_lookup.is_none());
        assert!(config.media_repo.is_none());
        assert!(config.request_timeout.is_none());
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("data-url".parse::<PayloadFormat>().unwrap(), PayloadFormat::DataUrl);
        assert_eq!(" RAW-BASE64 ".parse::<PayloadFormat>().unwrap(), PayloadFormat::RawBase64);
        assert!("multipart".parse::<PayloadFormat>().is_err());
    }

    #[test]
    fn test_output_field_per_format() {
        assert_eq!(PayloadFormat::DataUrl.output_field(), "generatedImageUrl");
        assert_eq!(PayloadFormat::RawBase64.output_field(), "outputImageUrl");
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = [
            (ENV_WEBHOOK, "https://hooks.local/gen"),
            (ENV_CRM_LOOKUP, "https://crm.local/image"),
            (ENV_MEDIA_REPO, ""),
            (ENV_FORMAT, "raw-base64"),
            (ENV_TIMEOUT_SECS, "45"),
        ]
        .into_iter()
        .collect();

        let config = PipelineConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.crm_lookup.as_deref(), Some("https://crm.local/image"));
        assert!(config.media_repo.is_none());
        assert_eq!(config.format, PayloadFormat::RawBase64);
        assert_eq!(config.request_timeout, Some(Duration::from_secs(45)));
    }

    #[test]
    fn test_from_lookup_bad_timeout() {
        let result = PipelineConfig::from_lookup(|k| match k {
            ENV_WEBHOOK => Some("https://hooks.local/gen".to_string()),
            ENV_TIMEOUT_SECS => Some("soon".to_string()),
            _ => None,
        });
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("concept.json");
        std::fs::write(
            &path,
            r#"{
                "generationWebhook": "https://hooks.local/gen",
                "mediaRepo": "https://crm.local/media",
                "format": "data-url",
                "requestTimeoutSecs": 30
            }"#,
        )
        .unwrap();

        let config = PipelineConfig::from_file(&path).unwrap();
        assert_eq!(config.media_repo.as_deref(), Some("https://crm.local/media"));
        assert_eq!(config.request_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_from_missing_file() {
        let result = PipelineConfig::from_file(Path::new("/definitely/not/here.json"));
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }
}
