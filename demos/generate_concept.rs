//! Stage a local image and generate a concept through a webhook.
//!
//! Reads endpoints from `CONCEPT_GEN_*` environment variables.
//!
//! ```sh
//! CONCEPT_GEN_WEBHOOK=https://hooks.example.com/webhook/concept \
//!     cargo run --example generate_concept -- photo.jpg "modern kitchen"
//! ```

use concept_gen::{ConceptPipeline, ImageFile, PipelineConfig, WidgetEvent};

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let (Some(image), Some(prompt)) = (args.next(), args.next()) else {
        eprintln!("usage: generate_concept <image> <prompt>");
        return Ok(());
    };

    let pipeline = ConceptPipeline::new(PipelineConfig::from_env()?);
    let mut events = pipeline.subscribe();

    if !pipeline.select_local_file(ImageFile::from_path(&image)).await? {
        eprintln!("{} is not an image", image);
        return Ok(());
    }
    println!("Staged {}", image);

    match pipeline.generate(&prompt).await {
        Ok(result) => println!("Generated: {}", result.output_image_url),
        Err(e) => eprintln!("{}", e.user_message()),
    }

    while let Ok(event) = events.try_recv() {
        if let WidgetEvent::Notified { notification } = event {
            println!("[{:?}] {}", notification.level, notification.message);
        }
    }

    Ok(())
}
