use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::broadcast;

use crate::client::{GenerationRequest, WebhookClient};
use crate::config::{PayloadFormat, PipelineConfig};
use crate::encoding::{encode_for_transport, read_as_data_url};
use crate::error::{self, PipelineError, Result};
use crate::message::parse_form_submission;
use crate::timestamp::RequestStamp;
use crate::types::*;

const EVENT_CAPACITY: usize = 64;
const SUCCESS_MESSAGE: &str = "Concept generated successfully!";

struct Inner {
    slot: Option<UploadedImage>,
    widget: WidgetState,
    phase: PipelinePhase,
    /// Bumped on every accepted selection so a slow preview read cannot
    /// overwrite a newer pick.
    selection: u64,
}

/// The upload-to-generation pipeline behind one widget instance.
///
/// Holds the single staged-image slot and the widget surface, and runs
/// Generate invocations one at a time. Methods take `&self`, so the
/// pipeline can be shared in an `Arc` between the tasks feeding it UI
/// events.
///
/// # Example
/// ```no_run
/// use concept_gen::{ConceptPipeline, ImageFile, PipelineConfig};
///
/// # async fn example() -> concept_gen::Result<()> {
/// let config = PipelineConfig::builder()
///     .generation_webhook("https://hooks.example.com/webhook/concept")
///     .build()?;
/// let pipeline = ConceptPipeline::new(config);
///
/// pipeline.select_local_file(ImageFile::from_path("photo.jpg")).await?;
/// let result = pipeline.generate("modern kitchen").await?;
/// println!("{}", result.output_image_url);
/// # Ok(())
/// # }
/// ```
pub struct ConceptPipeline {
    client: WebhookClient,
    inner: Mutex<Inner>,
    in_flight: AtomicBool,
    events: broadcast::Sender<WidgetEvent>,
}

/// Holds the single-flight gate for one Generate invocation.
struct FlightGuard<'a> {
    pipeline: &'a ConceptPipeline,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.pipeline.set_phase(PipelinePhase::Idle);
        self.pipeline.in_flight.store(false, Ordering::Release);
    }
}

impl ConceptPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self::with_client(WebhookClient::new(&config))
    }

    /// Build around a preconfigured [`WebhookClient`].
    pub fn with_client(client: WebhookClient) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            client,
            inner: Mutex::new(Inner {
                slot: None,
                widget: WidgetState::default(),
                phase: PipelinePhase::Idle,
                selection: 0,
            }),
            in_flight: AtomicBool::new(false),
            events,
        }
    }

    /// Receive every widget change from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<WidgetEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> WidgetState {
        self.inner().widget.clone()
    }

    pub fn phase(&self) -> PipelinePhase {
        self.inner().phase
    }

    pub fn staged_image(&self) -> Option<UploadedImage> {
        self.inner().slot.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn client(&self) -> &WebhookClient {
        &self.client
    }

    // ── Input acquisition ───────────────────────────────────────────

    /// Stage a local file picked by click or drop.
    ///
    /// Non-image files are ignored and yield `Ok(false)`. Image files replace
    /// the slot immediately; the preview and the Generate control only update
    /// once the data-URL read has completed.
    pub async fn select_local_file(&self, file: ImageFile) -> Result<bool> {
        if !file.is_image() {
            tracing::warn!(file = %file.name, mime = %file.mime_type, "Ignoring non-image file");
            return Ok(false);
        }

        let ticket = {
            let mut inner = self.inner();
            inner.selection += 1;
            inner.slot = Some(UploadedImage::LocalFile(file.clone()));
            inner.selection
        };
        tracing::info!(file = %file.name, mime = %file.mime_type, "Staged local image");

        let data_url = read_as_data_url(&file).await.map_err(|e| {
            tracing::error!(file = %file.name, "Preview read failed: {}", e);
            e
        })?;

        let current = self.inner().selection;
        if current != ticket {
            tracing::debug!(file = %file.name, "Preview superseded by a newer selection");
            return Ok(true);
        }

        self.render_preview(data_url);
        self.enable_after_selection();
        Ok(true)
    }

    /// Stage the image a CRM form submission points at.
    ///
    /// On failure a notification is shown and the previously staged image
    /// and preview are left untouched.
    pub async fn select_remote_image(&self, submission: &FormSubmission) -> Result<()> {
        tracing::info!(
            contact_id = %submission.contact_id,
            file_id = %submission.file_id,
            "Resolving form-submitted image"
        );

        let url = match self.client.fetch_crm_image(submission).await {
            Ok(url) => url,
            Err(e) => {
                tracing::error!("Failed to fetch image from CRM: {}", e);
                self.notify(Notification::failure(error::UPLOAD_FAILED));
                return Err(e);
            }
        };

        {
            let mut inner = self.inner();
            inner.selection += 1;
            inner.slot = Some(UploadedImage::RemoteUrl(url.clone()));
        }
        tracing::info!(url = %url, "Staged remote image");

        self.render_preview(url);
        self.enable_after_selection();
        Ok(())
    }

    /// Route an inbound cross-context message. Returns `Ok(true)` when it
    /// was a form submission and the image was staged.
    pub async fn handle_message(&self, message: &Value) -> Result<bool> {
        match parse_form_submission(message) {
            Some(submission) => {
                self.select_remote_image(&submission).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // ── Generate ────────────────────────────────────────────────────

    /// Run one Generate invocation: validate, encode, dispatch, apply.
    ///
    /// Fails with [`PipelineError::Busy`] while another invocation is in
    /// flight. Validation failures are reported before any network call and
    /// leave the controls alone; later failures hide the loading overlay and
    /// re-enable Generate. The staged image is never cleared.
    ///
    /// Media repository persistence runs in a background task after the
    /// controls are reset, so it never holds the Generate gate.
    pub async fn generate(&self, prompt: &str) -> Result<GenerationResult> {
        let guard = self.acquire_flight()?;

        self.set_phase(PipelinePhase::Validating);
        let (image, prompt) = match self.validate(prompt) {
            Ok(valid) => valid,
            Err(e) => {
                tracing::warn!("Generate rejected: {}", e);
                self.notify(Notification::failure(e.user_message()));
                return Err(e);
            }
        };

        self.set_loading(true);
        self.set_generate_enabled(false);

        let outcome = self.run(&image, prompt).await;

        self.set_loading(false);
        self.set_generate_enabled(true);
        drop(guard);

        match outcome {
            Ok((result, request)) => {
                if self.client.format() == PayloadFormat::DataUrl {
                    self.spawn_persistence(result.output_image_url.clone(), request);
                }
                Ok(result)
            }
            Err(e) => {
                tracing::error!("Error generating concept: {}", e);
                self.notify(Notification::failure(e.user_message()));
                Err(e)
            }
        }
    }

    fn acquire_flight(&self) -> Result<FlightGuard<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| PipelineError::Busy)?;
        Ok(FlightGuard { pipeline: self })
    }

    fn validate(&self, prompt: &str) -> Result<(UploadedImage, String)> {
        let image = self
            .staged_image()
            .ok_or_else(|| PipelineError::Validation(error::MISSING_IMAGE.into()))?;
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(PipelineError::Validation(error::EMPTY_PROMPT.into()));
        }
        Ok((image, prompt.to_string()))
    }

    async fn run(
        &self,
        image: &UploadedImage,
        prompt: String,
    ) -> Result<(GenerationResult, GenerationRequest)> {
        let format = self.client.format();
        let stamp = RequestStamp::now();

        self.set_phase(PipelinePhase::Encoding);
        let payload = encode_for_transport(image, format).await?;

        self.set_phase(PipelinePhase::Dispatching);
        let request = GenerationRequest {
            payload,
            prompt,
            stamp,
            input_extension: image.extension(),
        };
        tracing::info!(endpoint = %self.client.generation_webhook(), "Sending generation request");
        let result = self.client.generate(&request).await?;

        self.set_phase(PipelinePhase::ResultHandling);
        self.apply_result(&result)?;
        Ok((result, request))
    }

    // ── Result handling ─────────────────────────────────────────────

    /// Show a generation result in the preview and report success.
    ///
    /// The preview source is the output URL exactly as received. Fails with
    /// [`PipelineError::InvalidResult`] if the result carries no output URL,
    /// in which case the preview is unchanged.
    pub fn apply_result(&self, result: &GenerationResult) -> Result<()> {
        let url = &result.output_image_url;
        if url.trim().is_empty() {
            return Err(PipelineError::InvalidResult("No generated image received".into()));
        }
        tracing::info!(url = %url, "Generated image received");
        self.render_preview(url.clone());
        self.notify(Notification::success(SUCCESS_MESSAGE));
        Ok(())
    }

    /// Store the result in the media repository without holding up the
    /// widget. Failures are logged and dropped.
    fn spawn_persistence(&self, image_url: String, request: GenerationRequest) {
        let client = self.client.clone();
        let events = self.events.clone();
        let GenerationRequest { prompt, stamp, .. } = request;

        tokio::spawn(async move {
            match client.persist(&image_url, &prompt, &stamp).await {
                Ok(true) => {
                    let _ = events.send(WidgetEvent::Persisted { image_url });
                }
                Ok(false) => {}
                Err(e) => tracing::warn!("Failed to save to media repository: {}", e),
            }
        });
    }

    // ── Widget surface ──────────────────────────────────────────────

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Apply a widget change and emit its event under the same lock, so the
    /// event stream orders exactly like the state changes.
    fn update<F>(&self, change: F)
    where
        F: FnOnce(&mut WidgetState) -> Option<WidgetEvent>,
    {
        let mut inner = self.inner();
        if let Some(event) = change(&mut inner.widget) {
            // No subscribers is fine.
            let _ = self.events.send(event);
        }
    }

    fn set_phase(&self, phase: PipelinePhase) {
        self.inner().phase = phase;
    }

    fn render_preview(&self, src: String) {
        self.update(|widget| {
            widget.placeholder_visible = false;
            widget.preview_src = Some(src.clone());
            Some(WidgetEvent::PreviewUpdated { src })
        });
    }

    /// Enable Generate unless an invocation holds the gate. The busy check
    /// runs under the widget lock, the same lock `generate` takes to disable
    /// the control after acquiring the gate.
    fn enable_after_selection(&self) {
        self.update(|widget| {
            if self.is_busy() || widget.generate_enabled {
                return None;
            }
            widget.generate_enabled = true;
            Some(WidgetEvent::GenerateEnabled { enabled: true })
        });
    }

    fn set_generate_enabled(&self, enabled: bool) {
        self.update(|widget| {
            if widget.generate_enabled == enabled {
                return None;
            }
            widget.generate_enabled = enabled;
            Some(WidgetEvent::GenerateEnabled { enabled })
        });
    }

    fn set_loading(&self, loading: bool) {
        self.update(|widget| {
            if widget.loading == loading {
                return None;
            }
            widget.loading = loading;
            Some(WidgetEvent::LoadingChanged { loading })
        });
    }

    fn notify(&self, notification: Notification) {
        self.update(|widget| {
            widget.notification = Some(notification.clone());
            Some(WidgetEvent::Notified { notification })
        });
    }
}
