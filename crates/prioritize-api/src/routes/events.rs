//! Route for producers raising property-change events.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use prioritize_core::event::SourceType;
use prioritize_registry::{DeliveryOutcome, DeliveryReport};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for POST /.
#[derive(Debug, Deserialize)]
pub struct RaiseEventRequest {
    /// Category of the changed object.
    pub source_type: SourceType,
    /// Identifier of the changed object.
    pub source_id: i64,
    /// Name of the changed property.
    pub property_name: String,
    /// Value before the change.
    #[serde(default)]
    pub old_value: String,
    /// Value after the change.
    #[serde(default)]
    pub new_value: String,
    /// Event lifetime in milliseconds. The configured default when absent.
    pub lifetime_ms: Option<i64>,
}

/// Response body describing what happened to a raised event.
#[derive(Debug, Serialize)]
pub struct RaiseEventResponse {
    /// `dispatched`, `deferred`, `discarded` or `suppressed`.
    pub delivery: &'static str,
    /// Listeners whose consumer accepted the event.
    pub notified: usize,
    /// Listeners whose category has no consumer.
    pub unroutable: usize,
    /// Listeners whose consumer failed.
    pub failed: usize,
}

/// Splits a delivery outcome into its wire name and per-listener tally.
pub(crate) fn describe(outcome: DeliveryOutcome) -> (&'static str, DeliveryReport) {
    match outcome {
        DeliveryOutcome::Suppressed => ("suppressed", DeliveryReport::default()),
        DeliveryOutcome::Discarded => ("discarded", DeliveryReport::default()),
        DeliveryOutcome::Deferred { .. } => ("deferred", DeliveryReport::default()),
        DeliveryOutcome::Dispatched(report) => ("dispatched", report),
    }
}

impl From<DeliveryOutcome> for RaiseEventResponse {
    fn from(outcome: DeliveryOutcome) -> Self {
        let (delivery, report) = describe(outcome);
        Self {
            delivery,
            notified: report.delivered,
            unroutable: report.unroutable,
            failed: report.failed,
        }
    }
}

/// POST /
#[instrument(skip(state, request), fields(source_type = %request.source_type, source_id = request.source_id))]
async fn raise_event(
    State(state): State<AppState>,
    Json(request): Json<RaiseEventRequest>,
) -> Result<Json<RaiseEventResponse>, ApiError> {
    let registry = &state.registry;
    let outcome = match request.lifetime_ms {
        Some(lifetime_ms) => {
            registry
                .raise_event(
                    request.source_type,
                    request.source_id,
                    &request.property_name,
                    &request.old_value,
                    &request.new_value,
                    lifetime_ms,
                )
                .await?
        }
        None => {
            registry
                .raise_event_with_default_lifetime(
                    request.source_type,
                    request.source_id,
                    &request.property_name,
                    &request.old_value,
                    &request.new_value,
                )
                .await?
        }
    };

    Ok(Json(outcome.into()))
}

/// Returns the router for raising events.
pub fn router() -> Router<AppState> {
    Router::new().route("/", post(raise_event))
}
