//! # concept-gen
//!
//! Async upload-to-generation pipeline for webhook-driven image concept
//! widgets.
//!
//! A user stages an image (a local file, or one resolved from a CRM form
//! submission), types a prompt, and the pipeline forwards both to an
//! automation webhook that answers with a generated image URL. The result
//! replaces the preview and, for the data-URL contract, is stored in a CRM
//! media repository on a best-effort basis.
//!
//! ## Features
//!
//! - **Single staged-image slot** overwritten by every accepted selection
//! - **Two webhook contracts**: data-URL (`generatedImageUrl`) and raw
//!   base64 with derived filenames (`outputImageUrl`)
//! - **Single-flight gate**: one Generate invocation at a time
//! - **Widget surface** snapshot plus a broadcast stream of [`WidgetEvent`]s
//!   for UI adapters
//!
//! ## Quick Start
//!
//! ```no_run
//! use concept_gen::{ConceptPipeline, ImageFile, PipelineConfig, PayloadFormat};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::builder()
//!         .generation_webhook("https://hooks.example.com/webhook/concept")
//!         .media_repo("https://crm.example.com/media")
//!         .format(PayloadFormat::DataUrl)
//!         .build()?;
//!
//!     let pipeline = ConceptPipeline::new(config);
//!     pipeline.select_local_file(ImageFile::from_path("photo.jpg")).await?;
//!
//!     let result = pipeline.generate("modern kitchen").await?;
//!     println!("Generated: {}", result.output_image_url);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod encoding;
pub mod error;
pub mod message;
pub mod pipeline;
pub mod timestamp;
pub mod types;

pub use client::{GenerationRequest, WebhookClient};
pub use config::{PayloadFormat, PipelineConfig, PipelineConfigBuilder};
pub use encoding::{encode_for_transport, strip_data_url_prefix, to_data_url, TransportPayload};
pub use error::{PipelineError, Result};
pub use message::{parse_form_submission, FORM_SUBMITTED};
pub use pipeline::ConceptPipeline;
pub use timestamp::RequestStamp;
pub use types::{
    FormSubmission, GenerationResult, ImageFile, ImageSource, Notification, NotificationLevel,
    PipelinePhase, UploadedImage, WidgetEvent, WidgetState,
};
