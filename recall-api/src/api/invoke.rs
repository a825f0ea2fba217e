use axum::{Json, extract::State};
use tracing::info;

use crate::{
    core::state::AppState,
    models::{
        dto::{InvokeRequest, InvokeResponse},
        error::ApiResult,
    },
};

pub async fn invoke(
    State(state): State<AppState>,
    Json(request): Json<InvokeRequest>,
) -> ApiResult<Json<InvokeResponse>> {
    info!(
        "Invocation for user '{}' (session: {:?}, hooks: {})",
        request.user_id, request.session_id, request.use_hooks
    );

    let result = state.orchestrator.invoke(request).await?;

    Ok(Json(InvokeResponse::try_from(result)?))
}
