// Detector trait definition

use async_trait::async_trait;
use std::path::Path;

use super::models::DetectionResult;

/// A single detection path (remote endpoint, local generator, test stubs)
#[async_trait]
pub trait DiseaseDetector: Send + Sync {
    /// Name of the detector (for logging)
    fn name(&self) -> &'static str;

    /// Run one detection. Failures come back as `status=error`, never as a panic or `Err`.
    async fn detect(&self, image_path: &Path, crop_type: &str) -> DetectionResult;
}
