use axum::{Json, extract::State};
use tracing::debug;

use crate::{
    core::state::AppState,
    models::{
        dto::{MemorySearchRequest, MemorySearchResponse},
        error::ApiResult,
    },
};

pub async fn search_memories(
    State(state): State<AppState>,
    Json(request): Json<MemorySearchRequest>,
) -> ApiResult<Json<MemorySearchResponse>> {
    debug!(
        "Memory search for user '{}' in {} scope",
        request.user_id, request.scope
    );

    let outcome = state.search.search(request).await?;

    Ok(Json(MemorySearchResponse::try_from(outcome)?))
}
