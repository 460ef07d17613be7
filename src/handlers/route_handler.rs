// src/handlers/route_handler.rs
use axum::{extract::State, Json};
use std::sync::Arc;

use crate::{
    errors::DispatchError as AppError,
    models::route::{
        MultiStopRequest, OptimalPickup, OptimalPickupRequest, OptimizedRoute, Route,
        RouteRequest,
    },
    state::AppState,
    utils::geo,
};

pub async fn plan_route(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RouteRequest>,
) -> Result<Json<Route>, AppError> {
    geo::validate_coordinates(request.origin.latitude, request.origin.longitude)?;
    geo::validate_coordinates(request.destination.latitude, request.destination.longitude)?;
    let route = state
        .routes
        .route(request.origin, request.destination, &request.options)
        .await;
    Ok(Json(route))
}

pub async fn optimize_stops(
    State(state): State<Arc<AppState>>,
    Json(request): Json<MultiStopRequest>,
) -> Result<Json<OptimizedRoute>, AppError> {
    geo::validate_coordinates(request.origin.latitude, request.origin.longitude)?;
    for stop in &request.stops {
        geo::validate_coordinates(stop.latitude, stop.longitude)?;
    }
    let optimized = state.routes.optimize_multi_stop(
        request.origin,
        &request.stops,
        request.return_to_origin,
        request.max_stops,
    )?;
    Ok(Json(optimized))
}

pub async fn optimal_pickup(
    State(state): State<Arc<AppState>>,
    Json(request): Json<OptimalPickupRequest>,
) -> Result<Json<OptimalPickup>, AppError> {
    geo::validate_coordinates(request.driver_location.latitude, request.driver_location.longitude)?;
    geo::validate_coordinates(request.rider_location.latitude, request.rider_location.longitude)?;
    geo::validate_coordinates(request.destination.latitude, request.destination.longitude)?;
    let pickup = state
        .routes
        .find_optimal_pickup(
            request.driver_location,
            request.rider_location,
            request.destination,
        )
        .await;
    Ok(Json(pickup))
}
