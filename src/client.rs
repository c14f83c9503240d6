use reqwest::{Client, RequestBuilder};
use serde_json::{json, Value};

use crate::config::{PayloadFormat, PipelineConfig};
use crate::encoding::TransportPayload;
use crate::error::{PipelineError, Result};
use crate::timestamp::RequestStamp;
use crate::types::{FormSubmission, GenerationResult};

/// Media repository tag for results produced by the generation webhook.
pub const GENERATED_CONCEPT: &str = "generated_concept";

/// Everything sent to the generation webhook for one invocation.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub payload: TransportPayload,
    pub prompt: String,
    pub stamp: RequestStamp,
    /// Extension of the staged image, used for the derived input filename.
    pub input_extension: &'static str,
}

impl GenerationRequest {
    /// Render the JSON body for `format`. All time fields come from the
    /// single [`RequestStamp`].
    pub fn body(&self, format: PayloadFormat) -> Value {
        match format {
            PayloadFormat::DataUrl => json!({
                "image": self.payload.as_str(),
                "prompt": self.prompt,
                "timestamp": self.stamp.iso8601(),
            }),
            PayloadFormat::RawBase64 => json!({
                "imageBase64": self.payload.as_str(),
                "prompt": self.prompt,
                "timestamp": self.stamp.compact(),
                "inputFilename": self.stamp.input_filename(self.input_extension),
                "outputFilename": self.stamp.output_filename(),
            }),
        }
    }
}

/// Async client for the three external HTTP boundaries: CRM lookup,
/// generation webhook and media repository.
///
/// # Example
/// ```no_run
/// use concept_gen::{PipelineConfig, WebhookClient};
///
/// # fn example() -> concept_gen::Result<()> {
/// let config = PipelineConfig::builder()
///     .generation_webhook("https://hooks.example.com/webhook/concept")
///     .build()?;
/// let client = WebhookClient::new(&config);
/// assert_eq!(client.generation_webhook(), "https://hooks.example.com/webhook/concept");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct WebhookClient {
    http: Client,
    config: PipelineConfig,
}

impl WebhookClient {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            http: Client::new(),
            config: config.clone(),
        }
    }

    /// Use a custom `reqwest::Client` (for connection pooling, proxies, TLS).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    pub fn generation_webhook(&self) -> &str {
        &self.config.generation_webhook
    }

    pub fn format(&self) -> PayloadFormat {
        self.config.format
    }

    fn with_timeout(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.config.request_timeout {
            Some(timeout) => builder.timeout(timeout),
            None => builder,
        }
    }

    // ── CRM lookup ──────────────────────────────────────────────────

    /// Resolve a form submission to the uploaded image's URL.
    ///
    /// Reads `imageUrl`, falling back to `url`.
    pub async fn fetch_crm_image(&self, submission: &FormSubmission) -> Result<String> {
        let endpoint = self
            .config
            .crm_lookup
            .as_deref()
            .ok_or_else(|| PipelineError::Config("CRM lookup endpoint is not configured".into()))?;

        let url = reqwest::Url::parse_with_params(
            endpoint,
            &[
                ("contactId", submission.contact_id.as_str()),
                ("fileId", submission.file_id.as_str()),
            ],
        )
        .map_err(|e| PipelineError::Config(format!("Bad CRM lookup URL: {}", e)))?;

        tracing::debug!(contact_id = %submission.contact_id, file_id = %submission.file_id, "Fetching image from CRM");

        let resp = self
            .with_timeout(self.http.get(url).header("Content-Type", "application/json"))
            .send()
            .await
            .map_err(|e| PipelineError::Network {
                context: format!("Cannot reach CRM lookup at {}", endpoint),
                source: e,
            })?;

        let json = read_json(resp, "CRM lookup").await?;

        ["imageUrl", "url"]
            .iter()
            .find_map(|key| non_empty_str(&json, key))
            .ok_or_else(|| PipelineError::InvalidResult("CRM response missing imageUrl".into()))
    }

    // ── Generation ──────────────────────────────────────────────────

    /// POST one request to the generation webhook. No retry.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult> {
        let format = self.config.format;
        let endpoint = &self.config.generation_webhook;
        let body = request.body(format);

        tracing::debug!(
            endpoint = %endpoint,
            payload_bytes = request.payload.as_str().len(),
            ?format,
            "Dispatching generation request"
        );

        let resp = self
            .with_timeout(self.http.post(endpoint).json(&body))
            .send()
            .await
            .map_err(|e| PipelineError::Network {
                context: format!("Cannot reach generation webhook at {}", endpoint),
                source: e,
            })?;

        let json = read_json(resp, "generation webhook").await?;
        let field = format.output_field();

        let output_image_url = non_empty_str(&json, field).ok_or_else(|| {
            PipelineError::InvalidResult(format!("Response missing {}", field))
        })?;

        Ok(GenerationResult {
            output_image_url,
            raw: json,
        })
    }

    // ── Persistence ─────────────────────────────────────────────────

    /// Store a generated image in the media repository.
    ///
    /// Returns `Ok(false)` when no repository is configured. Every failure
    /// maps to [`PipelineError::Persistence`].
    pub async fn persist(&self, image_url: &str, prompt: &str, stamp: &RequestStamp) -> Result<bool> {
        let Some(endpoint) = self.config.media_repo.as_deref() else {
            return Ok(false);
        };

        let body = json!({
            "imageUrl": image_url,
            "prompt": prompt,
            "timestamp": stamp.iso8601(),
            "type": GENERATED_CONCEPT,
        });

        let resp = self
            .with_timeout(self.http.post(endpoint).json(&body))
            .send()
            .await
            .map_err(|e| PipelineError::Persistence(format!("{}: {}", endpoint, e)))?;

        if !resp.status().is_success() {
            return Err(PipelineError::Persistence(format!(
                "media repository returned HTTP {}",
                resp.status().as_u16()
            )));
        }
        Ok(true)
    }
}

async fn read_json(resp: reqwest::Response, what: &str) -> Result<Value> {
    if !resp.status().is_success() {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        return Err(PipelineError::Http { status, body });
    }

    let text = resp.text().await.map_err(|e| PipelineError::Network {
        context: format!("Failed to read {} response", what),
        source: e,
    })?;

    serde_json::from_str(&text)
        .map_err(|e| PipelineError::InvalidResult(format!("{} returned non-JSON body: {}", what, e)))
}

/// The string at `key`, unchanged, unless it is blank.
fn non_empty_str(json: &Value, key: &str) -> Option<String> {
    json.get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .map(String::from)
}
