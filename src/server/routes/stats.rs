//! Usage statistics endpoint

use axum::{extract::State, Json};

use super::Envelope;
use crate::detector::StatsSnapshot;
use crate::server::state::SharedState;

/// GET /api/stats
pub async fn get_stats(State(state): State<SharedState>) -> Json<Envelope<StatsSnapshot>> {
    Json(Envelope::success(state.dispatcher.stats()))
}
