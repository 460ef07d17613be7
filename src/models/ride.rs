// src/models/ride.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::driver::{MatchedDriver, VehicleType};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RideStatus {
    Requested,     // Created, waiting for a driver to accept
    Accepted,      // Driver won the accept race
    DriverArriving, // Driver reported arrival at pickup
    InProgress,    // Ride started
    Completed,     // Terminal
    Cancelled,     // Terminal
}

impl RideStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RideStatus::Completed | RideStatus::Cancelled)
    }

    /// Active rides block a rider/driver from holding another one.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

impl fmt::Display for RideStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RideStatus::Requested => "requested",
            RideStatus::Accepted => "accepted",
            RideStatus::DriverArriving => "driver_arriving",
            RideStatus::InProgress => "in_progress",
            RideStatus::Completed => "completed",
            RideStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// Which side of a ride an operation is performed by.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "role", content = "id", rename_all = "snake_case")]
pub enum RideActor {
    Rider(String),
    Driver(String),
}

impl RideActor {
    pub fn side(&self) -> &'static str {
        match self {
            RideActor::Rider(_) => "rider",
            RideActor::Driver(_) => "driver",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RidePoint {
    pub latitude: f64,
    pub longitude: f64,
    pub address: Option<String>,
}

impl RidePoint {
    pub fn geo(&self) -> GeoPoint {
        GeoPoint {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RideRating {
    pub rating: u8, // 1-5
    pub review: Option<String>,
    pub rated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Ride {
    pub id: String,
    pub rider_id: String,
    pub driver_id: Option<String>, // None until accepted
    pub status: RideStatus,
    pub vehicle_type: VehicleType,

    pub pickup: RidePoint,
    pub dropoff: RidePoint,

    pub estimated_fare: f64,
    pub estimated_distance_km: f64,
    pub estimated_duration_secs: f64,
    pub actual_fare: Option<f64>,
    pub actual_distance_km: Option<f64>,
    pub actual_duration_secs: Option<f64>,

    // Lifecycle timestamps, set once at each transition
    pub requested_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub arrived_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,

    pub cancelled_by: Option<String>, // "rider" or "driver"
    pub cancellation_reason: Option<String>,

    // Each side rates the other exactly once, after completion
    pub rider_rating: Option<RideRating>,  // Given by the rider
    pub driver_rating: Option<RideRating>, // Given by the driver

    pub notes: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RideRequest {
    pub rider_id: String,
    pub pickup: RidePoint,
    pub dropoff: RidePoint,
    pub vehicle_type: Option<VehicleType>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RideResponse {
    pub ride: Ride,
    pub matched_drivers: Vec<MatchedDriver>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AcceptRideRequest {
    pub driver_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CompleteRideRequest {
    pub driver_id: String,
    pub final_fare: Option<f64>,
    pub actual_distance_km: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CancelRideRequest {
    pub actor: RideActor,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RateRideRequest {
    pub actor: RideActor,
    pub rating: u8,
    pub review: Option<String>,
}
