//! Route handlers

pub mod detect;
pub mod files;
pub mod health;
pub mod stats;

use serde::Serialize;

/// Success envelope: `{"status": "success", "data": ...}`
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub status: &'static str,
    pub data: T,
}

impl<T> Envelope<T> {
    pub fn success(data: T) -> Self {
        Self {
            status: "success",
            data,
        }
    }
}
