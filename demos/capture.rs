//! Captures a page and writes it to disk.
//!
//! ```text
//! PXSHOT_API_KEY=px_... cargo run --example capture -- https://example.com shot.png
//! ```

use anyhow::Context;
use pxshot::{Capture, CaptureRequest, ImageFormat, PxshotClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let target = args.next().unwrap_or_else(|| "https://example.com".to_owned());
    let output = args.next().unwrap_or_else(|| "screenshot.png".to_owned());

    let format = output
        .rsplit_once('.')
        .map(|(_, ext)| ext.parse::<ImageFormat>())
        .transpose()?
        .unwrap_or_default();

    let client = PxshotClient::from_env()?.with_retry_hook(|event| {
        eprintln!(
            "attempt {} failed ({:?}), retrying in {:?}",
            event.attempt, event.kind, event.delay
        );
    });

    let health = client.health().await?;
    eprintln!("service status: {}", health.status);

    let request = CaptureRequest::builder(target)
        .format(format)
        .full_page(true)
        .build()?;

    match client.capture(&request).await? {
        Capture::Image(image) => {
            std::fs::write(&output, &image.bytes)
                .with_context(|| format!("could not write {output}"))?;
            println!("wrote {} bytes ({}) to {output}", image.bytes.len(), image.content_type);
        }
        Capture::Stored(stored) => println!("stored at {}", stored.url),
    }

    if let Some(rate_limit) = client.rate_limit() {
        println!(
            "rate limit: {:?} of {:?} remaining",
            rate_limit.remaining, rate_limit.limit
        );
    }
    Ok(())
}
