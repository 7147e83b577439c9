//! Generate one image and print where it would be displayed.
//!
//! Usage: `cargo run --example generate_image --features http -- <api-key> "<prompt>"`

use std::time::Duration;

use persevere::http::HttpTransport;
use persevere::imagen::{GeneratedImage, ImageGenConfig, ImageGenerator, ImageSlot};

/// Prints what a page element would show.
struct ConsoleSlot;

impl ImageSlot for ConsoleSlot {
    fn show_loading(&mut self) {
        println!("[loading]");
    }

    fn show_image(&mut self, image: &GeneratedImage) {
        println!(
            "[image] alt={:?} {} ({} base64 chars)",
            image.alt(),
            image.mime_type(),
            image.base64().len()
        );
    }

    fn show_error(&mut self, message: &str) {
        println!("[error] {}", message);
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let mut args = std::env::args().skip(1);
    let api_key = args.next().unwrap_or_default();
    let prompt = args
        .next()
        .unwrap_or_else(|| "A quiet harbor at dawn, watercolor".to_string());

    let transport = HttpTransport::new().with_timeout(Duration::from_secs(60));
    let generator = ImageGenerator::new(transport, ImageGenConfig::default().with_api_key(api_key));

    let mut slot = ConsoleSlot;
    generator.render_into(&mut slot, &prompt).await;
}
