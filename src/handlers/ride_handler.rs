// src/handlers/ride_handler.rs
use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    errors::DispatchError as AppError,
    models::ride::{
        AcceptRideRequest, CancelRideRequest, CompleteRideRequest, RateRideRequest, Ride,
        RideRequest, RideResponse,
    },
    models::rider::{RiderRegistration, RiderResponse},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct DriverAction {
    pub driver_id: String,
}

pub async fn register_rider(
    State(state): State<Arc<AppState>>,
    Json(registration): Json<RiderRegistration>,
) -> Result<Json<RiderResponse>, AppError> {
    let rider = state.rides.register_rider(registration).await?;
    Ok(Json(RiderResponse::from(rider)))
}

pub async fn get_rider(
    State(state): State<Arc<AppState>>,
    Path(rider_id): Path<String>,
) -> Result<Json<RiderResponse>, AppError> {
    let rider = state.rides.get_rider(&rider_id).await?;
    Ok(Json(RiderResponse::from(rider)))
}

pub async fn rider_rides(
    State(state): State<Arc<AppState>>,
    Path(rider_id): Path<String>,
) -> Result<Json<Vec<Ride>>, AppError> {
    state.rides.get_rider(&rider_id).await?;
    Ok(Json(state.rides.rides_for_rider(&rider_id).await))
}

pub async fn request_ride(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RideRequest>,
) -> Result<Json<RideResponse>, AppError> {
    let response = state.dispatch.request_ride(request).await?;
    Ok(Json(response))
}

pub async fn get_ride(
    State(state): State<Arc<AppState>>,
    Path(ride_id): Path<String>,
) -> Result<Json<Ride>, AppError> {
    let ride = state.rides.get(&ride_id).await?;
    Ok(Json(ride))
}

pub async fn accept_ride(
    State(state): State<Arc<AppState>>,
    Path(ride_id): Path<String>,
    Json(request): Json<AcceptRideRequest>,
) -> Result<Json<Ride>, AppError> {
    let ride = state.dispatch.accept_ride(&ride_id, &request.driver_id).await?;
    Ok(Json(ride))
}

pub async fn driver_arrived(
    State(state): State<Arc<AppState>>,
    Path(ride_id): Path<String>,
    Json(action): Json<DriverAction>,
) -> Result<Json<Ride>, AppError> {
    let ride = state.dispatch.driver_arrived(&ride_id, &action.driver_id).await?;
    Ok(Json(ride))
}

pub async fn start_ride(
    State(state): State<Arc<AppState>>,
    Path(ride_id): Path<String>,
    Json(action): Json<DriverAction>,
) -> Result<Json<Ride>, AppError> {
    let ride = state.dispatch.start_ride(&ride_id, &action.driver_id).await?;
    Ok(Json(ride))
}

pub async fn complete_ride(
    State(state): State<Arc<AppState>>,
    Path(ride_id): Path<String>,
    Json(request): Json<CompleteRideRequest>,
) -> Result<Json<Ride>, AppError> {
    let ride = state
        .dispatch
        .complete_ride(
            &ride_id,
            &request.driver_id,
            request.final_fare,
            request.actual_distance_km,
        )
        .await?;
    Ok(Json(ride))
}

pub async fn cancel_ride(
    State(state): State<Arc<AppState>>,
    Path(ride_id): Path<String>,
    Json(request): Json<CancelRideRequest>,
) -> Result<Json<Ride>, AppError> {
    let ride = state
        .dispatch
        .cancel_ride(&ride_id, &request.actor, request.reason)
        .await?;
    Ok(Json(ride))
}

pub async fn rate_ride(
    State(state): State<Arc<AppState>>,
    Path(ride_id): Path<String>,
    Json(request): Json<RateRideRequest>,
) -> Result<Json<Ride>, AppError> {
    let ride = state
        .dispatch
        .rate_ride(&ride_id, &request.actor, request.rating, request.review)
        .await?;
    Ok(Json(ride))
}
