// src/handlers/pricing_handler.rs
use axum::{extract::State, Json};
use chrono::Utc;
use std::sync::Arc;

use crate::{
    errors::DispatchError as AppError,
    models::pricing::{
        EstimateFareRequest, FareEstimate, PromoOffer, RegisterPromoRequest,
        RegisterSurgeAreaRequest, SurgeArea,
    },
    state::AppState,
};

pub async fn estimate_fare(
    State(state): State<Arc<AppState>>,
    Json(request): Json<EstimateFareRequest>,
) -> Result<Json<FareEstimate>, AppError> {
    let estimate = state
        .pricing
        .estimate(
            request.pickup,
            request.dropoff,
            request.vehicle_type,
            Utc::now(),
            request.rider_id.as_deref(),
        )
        .await?;
    Ok(Json(estimate))
}

pub async fn register_surge_area(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterSurgeAreaRequest>,
) -> Result<Json<SurgeArea>, AppError> {
    let area = state.pricing.register_surge_area(request).await?;
    Ok(Json(area))
}

pub async fn list_surge_areas(
    State(state): State<Arc<AppState>>,
) -> Json<Vec<SurgeArea>> {
    Json(state.pricing.list_surge_areas().await)
}

pub async fn register_promotion(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterPromoRequest>,
) -> Result<Json<PromoOffer>, AppError> {
    let offer = state.pricing.register_promotion(request).await?;
    Ok(Json(offer))
}

pub async fn list_promotions(State(state): State<Arc<AppState>>) -> Json<Vec<PromoOffer>> {
    Json(state.pricing.list_promotions().await)
}
