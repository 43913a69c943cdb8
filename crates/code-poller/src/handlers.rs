use axum::{
    extract::{rejection::JsonRejection, Json, State},
    response::{IntoResponse, Response},
};
use shared_types::{HealthView, LastCodeView, MessageResponse, Options, RuntimeMessage};

use crate::error::{ApiError, ApiResult};
use crate::server::AppState;

pub async fn health_check(State(state): State<AppState>) -> Json<HealthView> {
    let scheduler = state.settings.scheduler();
    Json(HealthView {
        status: "ok".to_string(),
        alarm_armed: scheduler.is_armed(),
        poll_period_minutes: scheduler.period().map(|p| p.as_secs() / 60),
    })
}

/// Runtime message endpoint used by the popup and options page
pub async fn handle_message(
    State(state): State<AppState>,
    payload: Result<Json<RuntimeMessage>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(message) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;

    match message {
        RuntimeMessage::CheckNow => {
            let outcome = state.pipeline.run_poll().await;
            let response = if outcome.is_failure() {
                MessageResponse::failed(outcome.to_string())
            } else {
                MessageResponse::ok()
            };
            Ok(Json(response).into_response())
        }
        RuntimeMessage::GetLastCode => {
            let seen = state.pipeline.store().read().await?;
            Ok(Json(seen.view()).into_response())
        }
        RuntimeMessage::ReschedulePoll => {
            state.settings.reschedule();
            Ok(Json(MessageResponse::ok()).into_response())
        }
    }
}

pub async fn get_last_code(State(state): State<AppState>) -> ApiResult<Json<LastCodeView>> {
    let seen = state.pipeline.store().read().await?;
    Ok(Json(seen.view()))
}

pub async fn get_options(State(state): State<AppState>) -> Json<Options> {
    Json(state.settings.current())
}

pub async fn put_options(
    State(state): State<AppState>,
    payload: Result<Json<Options>, JsonRejection>,
) -> ApiResult<Json<Options>> {
    let Json(options) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    Ok(Json(state.settings.replace(options)))
}
