//! Command-line entry points
//!
//! `run` (default) walks the bundled test images, `test` checks the remote
//! credential, `mock` exercises the synthetic path and `serve` starts the
//! web surface.

use std::path::{Path, PathBuf};

use anyhow::anyhow;
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::AppConfig;
use crate::detector::catalog::DEFAULT_CROP;
use crate::detector::{
    DetectionResult, Details, Dispatcher, ProbeOutcome, RemoteInferenceClient, SyntheticGenerator,
};
use crate::server;

/// Images looked up under the test image directory by `run`
pub const TEST_IMAGES: &[&str] = &["test_rice.jpg", "farm_field.jpg", "wheat_disease.jpg"];

const MOCK_IMAGE: &str = "test_rice.jpg";
const RULE: &str = "==================================================";

#[derive(Parser, Debug)]
#[command(name = "field-patrol")]
#[command(version)]
#[command(about = "Crop disease detection over a vision-language API with a synthetic fallback")]
pub struct Cli {
    /// Debug-level logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Detect every available test image (default)
    Run,
    /// Check connectivity and credential of the remote API
    Test,
    /// Run one synthetic detection
    Mock,
    /// Start the web service
    Serve {
        /// Host to bind to
        #[arg(long, env = "FIELD_PATROL_HOST")]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long, env = "FIELD_PATROL_PORT")]
        port: Option<u16>,
    },
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::from_env()?;
    init_logging(cli.verbose || config.debug)?;
    debug!("Loaded {:?}", config);

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run_batch(&config).await,
        Command::Test => run_probe(&config).await,
        Command::Mock => run_mock(&config).await,
        Command::Serve { host, port } => {
            let mut config = config;
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            let dispatcher = Dispatcher::from_config(&config)?;
            server::serve(config, dispatcher).await
        }
    }
}

/// RUST_LOG wins over the verbose flag
pub fn init_logging(verbose: bool) -> anyhow::Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).compact())
        .with(filter)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))
}

/// Crop guessed from an image file name; rice when nothing matches
pub fn crop_from_filename(path: &Path) -> &'static str {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    if name.contains("rice") {
        "rice"
    } else if name.contains("wheat") {
        "wheat"
    } else if name.contains("corn") || name.contains("maize") {
        "maize"
    } else {
        DEFAULT_CROP
    }
}

async fn run_batch(config: &AppConfig) -> anyhow::Result<()> {
    println!("{}", RULE);
    println!("🌾 Field patrol disease detection");
    println!("{}", RULE);

    config.init_directories()?;
    let dispatcher = Dispatcher::from_config(config)?;

    let candidates: Vec<PathBuf> = TEST_IMAGES
        .iter()
        .map(|name| config.test_images_dir.join(name))
        .collect();
    let available: Vec<&PathBuf> = candidates
        .iter()
        .filter(|path| {
            let exists = path.exists();
            if !exists {
                println!("⚠️  Image not found: {}", path.display());
            }
            exists
        })
        .collect();

    if available.is_empty() {
        println!("❌ No test images found. Create one of:");
        for path in &candidates {
            println!("  - {}", path.display());
        }
        return Ok(());
    }

    println!("📁 Found {} test image(s)", available.len());

    for (i, image) in available.iter().enumerate() {
        println!("\n{}", RULE);
        println!(
            "Test [{}/{}]: {}",
            i + 1,
            available.len(),
            image.file_name().unwrap_or_default().to_string_lossy()
        );

        let crop = crop_from_filename(image);
        let result = dispatcher.detect(image, crop, false).await;
        print_result(crop, &result);

        if result.is_success() {
            let stem = image.file_stem().unwrap_or_default().to_string_lossy();
            let destination = config.results_dir.join(format!("result_{}.json", stem));
            dispatcher.persist(&result, &destination);
        }
    }

    let stats = dispatcher.stats();
    println!("\n{}", RULE);
    println!("📈 Usage:");
    println!("  total_calls: {}", stats.total_calls);
    println!("  success_calls: {}", stats.success_calls);
    println!("  synthetic_calls: {}", stats.synthetic_calls);
    println!("  remote_calls: {}", stats.remote_calls);
    println!("  success_rate: {}", stats.success_rate);
    println!("  avg_response_time: {}", stats.avg_response_time);

    println!("\n{}", RULE);
    println!("🔧 System status:");
    if stats.remote_available {
        println!("✅ Remote API: configured");
        println!(
            "📡 Successful calls: {}/{}",
            stats.success_calls, stats.remote_calls
        );
    } else {
        println!("⚠️  Remote API: not configured (synthetic mode)");
        println!("💡 Set QWEN_API_KEY to use the remote API");
    }

    Ok(())
}

async fn run_probe(config: &AppConfig) -> anyhow::Result<()> {
    println!("🧪 Testing remote API connection...");

    let Some(settings) = config.remote_settings() else {
        println!("⚠️  No API key configured (set QWEN_API_KEY)");
        return Ok(());
    };
    let client = RemoteInferenceClient::new(settings)?;

    println!("Sending test request to {}", client.settings().endpoint());
    match client.probe().await {
        ProbeOutcome::Connected { status, body } => {
            println!("Status: {}", status);
            println!("✅ Connection OK");
            println!("Response: {}", serde_json::to_string_pretty(&body)?);
        }
        ProbeOutcome::Unauthorized => {
            println!("Status: 401");
            println!("❌ API key rejected, check QWEN_API_KEY");
        }
        ProbeOutcome::HttpError { status, body } => {
            println!("Status: {}", status);
            println!("❌ Request failed: {}", body);
        }
        ProbeOutcome::Failed(err) => {
            println!("❌ Connection test failed: {}", err);
            if let Some(hint) = err.suggestion() {
                println!("💡 {}", hint);
            }
        }
    }

    Ok(())
}

async fn run_mock(config: &AppConfig) -> anyhow::Result<()> {
    println!("🧪 Synthetic detection");

    config.init_directories()?;
    let synthetic = match config.synthetic_latency {
        Some((min, max)) => SyntheticGenerator::new().with_latency(min, max),
        None => SyntheticGenerator::new().without_latency(),
    };
    let dispatcher = Dispatcher::synthetic_only(synthetic);

    let image = config.test_images_dir.join(MOCK_IMAGE);
    if !image.exists() {
        println!("❌ Test image not found: {}", image.display());
        return Ok(());
    }

    let result = dispatcher.detect(&image, DEFAULT_CROP, true).await;
    println!("Mode: {}", result.mode);
    println!("{}", result.result.as_deref().unwrap_or_default());

    Ok(())
}

fn print_result(crop: &str, result: &DetectionResult) {
    println!("\n🌱 Crop: {}", crop);
    println!("📊 Mode: {}", result.mode);

    if !result.is_success() {
        println!(
            "❌ Detection failed: {}",
            result.error.as_deref().unwrap_or("unknown error")
        );
        return;
    }

    println!("✅ Detection succeeded");
    println!("{}", "-".repeat(40));
    println!("{}", result.result.as_deref().unwrap_or_default());
    println!("{}", "-".repeat(40));

    if let Some(reason) = &result.remote_error {
        println!("⚠️  Remote API unavailable, synthetic result used: {}", reason);
    }
    if let Some(details) = &result.details {
        print_details(details);
    }
}

fn print_details(details: &Details) {
    println!("\n📋 Details:");
    println!("  disease: {}", details.disease);
    println!("  severity: {}", details.severity);
    println!("  confidence: {}", details.confidence);
    println!("  solution: {}", details.solution);
    println!("  symptoms: {}", details.symptoms);
}
