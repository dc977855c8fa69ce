// Synthetic detector - plausible diagnoses without any external service
//
// Used for offline demos, tests, and as the fallback when the remote
// endpoint fails. It cannot fail: every call returns status=success.

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use super::catalog::{DiseaseCatalog, DiseaseEntry, HEALTHY};
use super::models::{DetectionResult, Details, Mode, Severity};
use super::traits::DiseaseDetector;
use super::utils::{round_to, timestamp};

/// Chance of drawing a healthy plant
pub const HEALTHY_PROBABILITY: f64 = 0.30;

const HEALTHY_CONFIDENCE: (f64, f64) = (0.80, 0.95);
const DISEASED_CONFIDENCE: (f64, f64) = (0.60, 0.90);

const DISCLAIMER: &str = "【注意：此为模拟数据，仅供参考】";

static FALLBACK_ENTRY: DiseaseEntry = DiseaseEntry {
    name: HEALTHY,
    symptoms: "叶片绿色健康",
    solution: "保持良好管理",
};

/// One random outcome, before any text is composed
#[derive(Debug, Clone)]
pub struct SyntheticDraw {
    pub crop_label: &'static str,
    pub entry: DiseaseEntry,
    pub severity: Severity,
    pub confidence: f64,
    pub delay: Option<Duration>,
}

pub struct SyntheticGenerator {
    catalog: DiseaseCatalog,
    rng: Mutex<StdRng>,
    /// Simulated call latency, inclusive range
    latency: Option<(Duration, Duration)>,
}

impl SyntheticGenerator {
    /// Entropy-seeded generator with the default 1-2s latency
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Reproducible generator
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            catalog: DiseaseCatalog::builtin(),
            rng: Mutex::new(rng),
            latency: Some((Duration::from_secs(1), Duration::from_secs(2))),
        }
    }

    pub fn with_latency(mut self, min: Duration, max: Duration) -> Self {
        self.latency = Some((min.min(max), max.max(min)));
        self
    }

    pub fn without_latency(mut self) -> Self {
        self.latency = None;
        self
    }

    pub fn catalog(&self) -> &DiseaseCatalog {
        &self.catalog
    }

    /// Draw an outcome for `crop_type` (unknown crops use the default crop)
    pub fn draw(&self, crop_type: &str) -> SyntheticDraw {
        let profile = self.catalog.resolve(crop_type);
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let (entry, severity, confidence) = if rng.gen::<f64>() < HEALTHY_PROBABILITY {
            let entry = profile
                .healthy()
                .or_else(|| profile.entries.first())
                .unwrap_or(&FALLBACK_ENTRY);
            let severity = if entry.is_healthy() {
                Severity::None
            } else {
                Severity::Mild
            };
            let confidence = rng.gen_range(HEALTHY_CONFIDENCE.0..=HEALTHY_CONFIDENCE.1);
            (entry.clone(), severity, confidence)
        } else {
            let mut pool = profile.diseases();
            if pool.is_empty() {
                pool = profile.entries.iter().collect();
            }
            let entry = pool.choose(&mut *rng).copied().unwrap_or(&FALLBACK_ENTRY);
            let severity = *Severity::DISEASED
                .choose(&mut *rng)
                .unwrap_or(&Severity::Mild);
            let confidence = rng.gen_range(DISEASED_CONFIDENCE.0..=DISEASED_CONFIDENCE.1);
            (entry.clone(), severity, confidence)
        };

        let delay = self.latency.map(|(min, max)| rng.gen_range(min..=max));

        SyntheticDraw {
            crop_label: profile.label,
            entry,
            severity,
            confidence,
            delay,
        }
    }

    /// Turn a draw into the uniform result
    pub fn compose(draw: &SyntheticDraw) -> DetectionResult {
        let text = format!(
            "病害识别：{}\n症状描述：{}\n严重程度：{}\n置信度：{:.2}%\n建议措施：{}\n检测时间：{}\n{}",
            draw.entry.name,
            draw.entry.symptoms,
            draw.severity.label_zh(),
            draw.confidence * 100.0,
            draw.entry.solution,
            timestamp(),
            DISCLAIMER,
        );

        let details = Details {
            disease: draw.entry.name.to_string(),
            severity: draw.severity,
            confidence: round_to(draw.confidence, 4),
            solution: draw.entry.solution.to_string(),
            symptoms: draw.entry.symptoms.to_string(),
        };

        DetectionResult::success(Mode::Synthetic, text, details)
    }

    pub async fn generate(&self, crop_type: &str) -> DetectionResult {
        let draw = self.draw(crop_type);
        tracing::debug!(
            crop = draw.crop_label,
            disease = draw.entry.name,
            severity = %draw.severity,
            "synthetic draw"
        );

        if let Some(delay) = draw.delay {
            tokio::time::sleep(delay).await;
        }

        Self::compose(&draw)
    }
}

impl Default for SyntheticGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DiseaseDetector for SyntheticGenerator {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    async fn detect(&self, _image_path: &Path, crop_type: &str) -> DetectionResult {
        self.generate(crop_type).await
    }
}
