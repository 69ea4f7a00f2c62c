use std::collections::HashMap;
use std::path::PathBuf;

use clap::Parser;
use pixgate::{handle, Gateway, GatewayConfig};
use pixgate::storage::HttpObjectStore;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pixgate")]
#[command(about = "On-demand image transcoding gateway")]
#[command(long_about = "\
On-demand image transcoding gateway

Fetches an image from an absolute URL or a key in the configured storage
bucket, detects its real format from content bytes, resizes it within the
requested bound (never upscaling), and re-encodes it at the requested
quality.

Environment:
  S3_BUCKET_NAME       bucket for storage-relative references
  DOWNLOAD_CHUNK_SIZE  copy granularity in bytes (default 1024)
  STORAGE_ENDPOINT     S3-style endpoint base URL
  RUST_LOG             log filter (e.g. pixgate=debug)")]
struct Cli {
    /// Source image: absolute URL or storage-relative key
    url: String,

    /// Target width in pixels (exactly one of width/height)
    #[arg(short, long)]
    width: Option<i64>,

    /// Target height in pixels (exactly one of width/height)
    #[arg(short = 'H', long)]
    height: Option<i64>,

    /// Encode quality
    #[arg(short, long, default_value_t = 70)]
    quality: i64,

    /// Override the configured storage bucket
    #[arg(long)]
    bucket: Option<String>,

    /// Write the transcoded image here instead of printing the response record
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let mut config = GatewayConfig::from_env();
    if cli.bucket.is_some() {
        config.bucket = cli.bucket.clone();
    }
    let store = HttpObjectStore::new(config.storage_endpoint.clone());
    let gateway = Gateway::new(config, Box::new(store));

    let mut params = HashMap::new();
    params.insert("url".to_string(), cli.url);
    params.insert("q".to_string(), cli.quality.to_string());
    if let Some(w) = cli.width {
        params.insert("w".to_string(), w.to_string());
    }
    if let Some(h) = cli.height {
        params.insert("h".to_string(), h.to_string());
    }

    let response = handle(&gateway, &params);

    match cli.output {
        Some(path) if response.is_base64_encoded => {
            use base64::Engine;
            let bytes = base64::engine::general_purpose::STANDARD.decode(&response.body)?;
            std::fs::write(&path, bytes)?;
            println!(
                "{} ({} bytes, ratio {})",
                path.display(),
                std::fs::metadata(&path)?.len(),
                response.headers.get("X-Optimization-Ratio").map_or("-", String::as_str),
            );
        }
        _ => {
            println!("{}", serde_json::to_string_pretty(&response)?);
            if response.status_code != 200 {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
