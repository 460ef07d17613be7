// src/handlers/driver_handler.rs
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    errors::DispatchError as AppError,
    models::driver::{
        Driver, DriverLocationUpdate, DriverRegistration, DriverResponse, DriverStatus,
        DriverStatusUpdate, MatchedDriver, VehicleType,
    },
    models::ride::GeoPoint,
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct StatusBody {
    pub status: DriverStatus,
}

#[derive(Debug, Deserialize)]
pub struct LocationBody {
    pub latitude: f64,
    pub longitude: f64,
    pub heading: Option<f64>,
    pub speed: Option<f64>,
    pub accuracy: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyBody {
    pub verified: bool,
}

#[derive(Debug, Deserialize)]
pub struct NearbyQuery {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_km: Option<f64>,
    pub vehicle_type: Option<VehicleType>,
    pub limit: Option<usize>,
}

pub async fn register_driver(
    State(state): State<Arc<AppState>>,
    Json(registration): Json<DriverRegistration>,
) -> Result<Json<Driver>, AppError> {
    let driver = state.drivers.register(registration).await?;
    Ok(Json(driver))
}

pub async fn get_driver(
    State(state): State<Arc<AppState>>,
    Path(driver_id): Path<String>,
) -> Result<Json<DriverResponse>, AppError> {
    let driver = state.drivers.get(&driver_id).await?;
    Ok(Json(DriverResponse::from(driver)))
}

pub async fn set_verified(
    State(state): State<Arc<AppState>>,
    Path(driver_id): Path<String>,
    Json(body): Json<VerifyBody>,
) -> Result<Json<DriverResponse>, AppError> {
    let driver = state.drivers.set_verified(&driver_id, body.verified).await?;
    Ok(Json(DriverResponse::from(driver)))
}

pub async fn set_status(
    State(state): State<Arc<AppState>>,
    Path(driver_id): Path<String>,
    Json(body): Json<StatusBody>,
) -> Result<Json<DriverResponse>, AppError> {
    let driver = state
        .drivers
        .set_status(DriverStatusUpdate {
            driver_id,
            status: body.status,
        })
        .await?;
    Ok(Json(DriverResponse::from(driver)))
}

/// Location over HTTP follows the same path as over the socket, including
/// the forward to the active ride's rider.
pub async fn update_location(
    State(state): State<Arc<AppState>>,
    Path(driver_id): Path<String>,
    Json(body): Json<LocationBody>,
) -> Result<Json<DriverResponse>, AppError> {
    state
        .dispatch
        .update_driver_location(DriverLocationUpdate {
            driver_id: driver_id.clone(),
            latitude: body.latitude,
            longitude: body.longitude,
            heading: body.heading,
            speed: body.speed,
            accuracy: body.accuracy,
        })
        .await?;
    let driver = state.drivers.get(&driver_id).await?;
    Ok(Json(DriverResponse::from(driver)))
}

/// Deactivation removes the driver from matching but keeps the record.
pub async fn deactivate_driver(
    State(state): State<Arc<AppState>>,
    Path(driver_id): Path<String>,
) -> Result<Json<DriverResponse>, AppError> {
    state.drivers.deactivate(&driver_id).await?;
    let driver = state.drivers.get(&driver_id).await?;
    Ok(Json(DriverResponse::from(driver)))
}

pub async fn nearby_drivers(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NearbyQuery>,
) -> Result<Json<Vec<MatchedDriver>>, AppError> {
    crate::utils::geo::validate_coordinates(query.latitude, query.longitude)?;
    let radius_km = query.radius_km.unwrap_or(5.0);
    let candidates = state
        .drivers
        .find_available(
            GeoPoint {
                latitude: query.latitude,
                longitude: query.longitude,
            },
            radius_km,
            query.vehicle_type,
            query.limit.unwrap_or(10),
        )
        .await;
    let matched = candidates
        .into_iter()
        .map(|(driver, distance_km)| MatchedDriver {
            driver: DriverResponse::from(driver),
            distance_km,
            eta_secs: distance_km / 30.0 * 3600.0,
        })
        .collect();
    Ok(Json(matched))
}
