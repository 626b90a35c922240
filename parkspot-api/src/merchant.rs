use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use parkspot_booking::CreateLotInput;

use crate::{error::AppError, lots::LotResponse, middleware::MerchantContext, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new().route("/merchant/lots", get(list_lots).post(register_lot))
}

async fn register_lot(
    State(state): State<AppState>,
    Extension(merchant): Extension<MerchantContext>,
    payload: Result<Json<CreateLotInput>, JsonRejection>,
) -> Result<(StatusCode, Json<LotResponse>), AppError> {
    let Json(input) = payload?;
    let lot = state.catalog.register_lot(merchant.merchant_id, input).await?;
    Ok((StatusCode::CREATED, Json(lot.into())))
}

async fn list_lots(
    State(state): State<AppState>,
    Extension(merchant): Extension<MerchantContext>,
) -> Result<Json<Vec<LotResponse>>, AppError> {
    let lots = state.catalog.lots_for_merchant(merchant.merchant_id).await?;
    Ok(Json(lots.into_iter().map(LotResponse::from).collect()))
}
