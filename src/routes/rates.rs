use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};

use crate::error::{ApiResult, RateError};
use crate::models::{ConvertQuery, ConvertResponse};
use crate::rates::{RateCache, RateTable};
use crate::state::AppState;
use crate::validation::Validator;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/rates/{base}", get(get_rates))
        .route("/api/convert", get(convert))
}

fn cache(state: &AppState) -> Result<&Arc<RateCache>, RateError> {
    state.rates.as_ref().ok_or(RateError::NotConfigured)
}

/// GET /api/rates/{base} - Rate table for a base currency.
async fn get_rates(
    State(state): State<AppState>,
    Path(base): Path<String>,
) -> ApiResult<Json<RateTable>> {
    let base = Validator::normalize_currency(&base)?;
    Ok(Json(cache(&state)?.table(&base).await?))
}

/// GET /api/convert?amount=...&from=...&to=...
async fn convert(
    State(state): State<AppState>,
    Query(query): Query<ConvertQuery>,
) -> ApiResult<Json<ConvertResponse>> {
    let from = Validator::normalize_currency(&query.from)?;
    let to = Validator::normalize_currency(&query.to)?;
    let rate = cache(&state)?.rate(&from, &to).await?;

    Ok(Json(ConvertResponse {
        amount: query.amount,
        converted: query.amount * rate,
        from,
        to,
        rate,
    }))
}
