// src/models/route.rs
use serde::{Deserialize, Serialize};

use crate::models::ride::GeoPoint;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Route {
    pub distance_km: f64,
    pub duration_secs: f64,
    // Encoded polyline when a provider supplied one; None for the
    // straight-line fallback
    pub polyline: Option<String>,
    pub instructions: Vec<String>,
    // Which backend produced this route ("osrm", "valhalla", "haversine")
    pub source: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct RouteOptions {
    pub avoid_tolls: bool,
    pub avoid_highways: bool,
    pub include_instructions: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RouteRequest {
    pub origin: GeoPoint,
    pub destination: GeoPoint,
    #[serde(default)]
    pub options: RouteOptions,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MultiStopRequest {
    pub origin: GeoPoint,
    pub stops: Vec<GeoPoint>,
    #[serde(default)]
    pub return_to_origin: bool,
    pub max_stops: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OptimizedRoute {
    // Indices into the request's stop list, in visiting order
    pub order: Vec<usize>,
    pub stops: Vec<GeoPoint>,
    pub total_distance_km: f64,
    pub total_duration_secs: f64,
    pub return_to_origin: bool,
    // "exhaustive" for the permutation search, "nearest_neighbor" beyond it
    pub strategy: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OptimalPickupRequest {
    pub driver_location: GeoPoint,
    pub rider_location: GeoPoint,
    pub destination: GeoPoint,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OptimalPickup {
    pub pickup: GeoPoint,
    pub total_duration_secs: f64,
    pub time_saved_secs: f64,
    // True when the rider's own location won
    pub is_rider_location: bool,
}
