use axum::{
    extract::{RawQuery, State},
    http::StatusCode,
    Json,
};
use tracing::{info, warn};

use crate::{error::Error, models::ChallengeResponse, state::AppState};

pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// The provider's verification GET against the callback endpoint. The query
/// string is handed to the manager raw because the `hub.*` parameter names
/// carry dots. Must answer within the provider's 2-second deadline, so the
/// handler does nothing beyond validate-and-echo.
pub async fn verify_callback(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Json<ChallengeResponse>, Error> {
    let query = query.unwrap_or_default();
    match state.manager.handle_challenge(&query).await {
        Ok(response) => Ok(Json(response)),
        Err(err) => {
            // Never echo anything on a failed validation.
            warn!("challenge rejected: {err}");
            Err(err)
        }
    }
}

/// Event deliveries once the subscription is active. Processing the payload
/// is out of scope; the provider only requires a prompt 2xx acknowledgement.
pub async fn receive_event(body: String) -> StatusCode {
    info!(bytes = body.len(), "event received");
    StatusCode::OK
}
