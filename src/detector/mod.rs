// Detector module - remote inference with a synthetic fallback

pub mod catalog;
pub mod dispatcher;
pub mod errors;
pub mod extraction;
pub mod models;
pub mod remote;
pub mod store;
pub mod synthetic;
pub mod traits;
pub mod utils;

pub use catalog::DiseaseCatalog;
pub use dispatcher::Dispatcher;
pub use errors::DetectError;
pub use models::{DetectionResult, Details, Mode, Severity, StatsSnapshot, Status};
pub use remote::{ProbeOutcome, RemoteInferenceClient, RemoteSettings};
pub use synthetic::SyntheticGenerator;
pub use traits::DiseaseDetector;
