// Dispatcher with fallback logic
//
// Per call: forced synthetic -> synthetic; remote configured -> remote,
// and any remote failure degrades to a synthetic result annotated with
// the remote error. detect() therefore always answers with success.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{error, info, warn};

use super::errors::DetectError;
use super::models::{DetectionResult, StatsSnapshot};
use super::remote::RemoteInferenceClient;
use super::store;
use super::synthetic::SyntheticGenerator;
use super::traits::DiseaseDetector;
use super::utils::round_to;
use crate::config::AppConfig;

/// Running counters, safe to bump from concurrent requests
#[derive(Debug, Default)]
struct UsageStats {
    total_calls: AtomicU64,
    success_calls: AtomicU64,
    synthetic_calls: AtomicU64,
    remote_calls: AtomicU64,
    /// Successful remote calls only
    remote_millis: AtomicU64,
}

impl UsageStats {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

pub struct Dispatcher {
    remote: Option<Box<dyn DiseaseDetector>>,
    synthetic: SyntheticGenerator,
    stats: UsageStats,
}

impl Dispatcher {
    pub fn new(synthetic: SyntheticGenerator, remote: Option<Box<dyn DiseaseDetector>>) -> Self {
        Self {
            remote,
            synthetic,
            stats: UsageStats::default(),
        }
    }

    /// Synthetic-only dispatcher
    pub fn synthetic_only(synthetic: SyntheticGenerator) -> Self {
        Self::new(synthetic, None)
    }

    /// Build from configuration: the remote path exists iff a credential was supplied
    pub fn from_config(config: &AppConfig) -> Result<Self, DetectError> {
        let mut synthetic = SyntheticGenerator::new();
        synthetic = match config.synthetic_latency {
            Some((min, max)) => synthetic.with_latency(min, max),
            None => synthetic.without_latency(),
        };

        let remote: Option<Box<dyn DiseaseDetector>> = match config.remote_settings() {
            Some(settings) => Some(Box::new(RemoteInferenceClient::new(settings)?)),
            None => {
                info!("No API key configured, running in synthetic-only mode");
                None
            }
        };

        Ok(Self::new(synthetic, remote))
    }

    pub fn remote_available(&self) -> bool {
        self.remote.is_some()
    }

    pub async fn detect(
        &self,
        image_path: &Path,
        crop_type: &str,
        force_synthetic: bool,
    ) -> DetectionResult {
        UsageStats::bump(&self.stats.total_calls);

        if force_synthetic {
            info!("[Dispatcher] Forced synthetic detection");
            UsageStats::bump(&self.stats.synthetic_calls);
            return self.synthetic.generate(crop_type).await;
        }

        let Some(remote) = &self.remote else {
            info!("[Dispatcher] No remote configured, using synthetic detection");
            UsageStats::bump(&self.stats.synthetic_calls);
            return self.synthetic.generate(crop_type).await;
        };

        info!("[Dispatcher] Trying detector: {}", remote.name());
        UsageStats::bump(&self.stats.remote_calls);
        let result = remote.detect(image_path, crop_type).await;

        if result.is_success() {
            info!("[Dispatcher] ✓ Success with {}", remote.name());
            UsageStats::bump(&self.stats.success_calls);
            if let Some(seconds) = result.response_time {
                self.stats
                    .remote_millis
                    .fetch_add((seconds * 1000.0).round() as u64, Ordering::Relaxed);
            }
            return result;
        }

        warn!(
            "[Dispatcher] ✗ {} failed, falling back to synthetic: {}",
            remote.name(),
            result.error.as_deref().unwrap_or("unknown error")
        );
        UsageStats::bump(&self.stats.synthetic_calls);
        self.synthetic
            .generate(crop_type)
            .await
            .with_remote_error(result.error)
    }

    pub fn stats(&self) -> StatsSnapshot {
        let total_calls = self.stats.total_calls.load(Ordering::Relaxed);
        let success_calls = self.stats.success_calls.load(Ordering::Relaxed);
        let remote_millis = self.stats.remote_millis.load(Ordering::Relaxed);

        let success_rate = if total_calls > 0 {
            round_to(success_calls as f64 / total_calls as f64 * 100.0, 2)
        } else {
            0.0
        };
        let avg_response_time = if success_calls > 0 {
            round_to(remote_millis as f64 / 1000.0 / success_calls as f64, 2)
        } else {
            0.0
        };

        StatsSnapshot {
            total_calls,
            success_calls,
            synthetic_calls: self.stats.synthetic_calls.load(Ordering::Relaxed),
            remote_calls: self.stats.remote_calls.load(Ordering::Relaxed),
            success_rate,
            avg_response_time,
            remote_available: self.remote_available(),
        }
    }

    /// Save a result as JSON. Failures are logged, never raised.
    pub fn persist(&self, result: &DetectionResult, destination: &Path) -> bool {
        match store::write_result(result, destination) {
            Ok(()) => {
                info!("Result saved to {}", destination.display());
                true
            }
            Err(e) => {
                error!("Failed to save result to {}: {}", destination.display(), e);
                false
            }
        }
    }
}
