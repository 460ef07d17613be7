// src/models/events.rs
//
// Live-channel payloads. Server events fan out through the hub; client
// events arrive on driver/rider sessions and are dispatched to the
// coordinator. Both are internally tagged by "type" so clients can switch
// on a single field.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::driver::VehicleType;
use crate::models::ride::{RidePoint, RideStatus};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Offer pushed to a matched driver.
    RideRequest {
        ride_id: String,
        pickup: RidePoint,
        dropoff: RidePoint,
        vehicle_type: VehicleType,
        estimated_fare: f64,
        distance_to_pickup_km: f64,
        eta_to_pickup_secs: f64,
    },
    RideAccepted {
        ride_id: String,
        driver_id: String,
        driver_name: String,
        vehicle_plate: String,
        eta_to_pickup_secs: Option<f64>,
    },
    DriverArrived {
        ride_id: String,
    },
    RideStarted {
        ride_id: String,
    },
    RideCompleted {
        ride_id: String,
        fare: f64,
        distance_km: f64,
        duration_secs: f64,
    },
    RideCancelled {
        ride_id: String,
        cancelled_by: String,
        reason: Option<String>,
    },
    /// Forwarded to the rider of the driver's active ride only.
    DriverLocationUpdate {
        driver_id: String,
        latitude: f64,
        longitude: f64,
        heading: Option<f64>,
        speed: Option<f64>,
        updated_at: DateTime<Utc>,
    },
    Error {
        message: String,
    },
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    LocationUpdate {
        latitude: f64,
        longitude: f64,
        heading: Option<f64>,
        speed: Option<f64>,
        accuracy: Option<f64>,
    },
    StatusUpdate {
        status: crate::models::driver::DriverStatus,
    },
    AcceptRide {
        ride_id: String,
    },
    DriverArrived {
        ride_id: String,
    },
    StartRide {
        ride_id: String,
    },
    CompleteRide {
        ride_id: String,
        final_fare: Option<f64>,
        actual_distance_km: Option<f64>,
    },
    RequestRide {
        pickup: RidePoint,
        dropoff: RidePoint,
        vehicle_type: Option<VehicleType>,
        notes: Option<String>,
    },
    CancelRide {
        ride_id: String,
        reason: Option<String>,
    },
    RateRide {
        ride_id: String,
        rating: u8,
        review: Option<String>,
    },
}

impl ServerEvent {
    /// Event name as it appears on the wire, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::RideRequest { .. } => "ride_request",
            ServerEvent::RideAccepted { .. } => "ride_accepted",
            ServerEvent::DriverArrived { .. } => "driver_arrived",
            ServerEvent::RideStarted { .. } => "ride_started",
            ServerEvent::RideCompleted { .. } => "ride_completed",
            ServerEvent::RideCancelled { .. } => "ride_cancelled",
            ServerEvent::DriverLocationUpdate { .. } => "driver_location_update",
            ServerEvent::Error { .. } => "error",
        }
    }

    /// Lifecycle echo for a status change, where one exists.
    pub fn for_status(ride_id: &str, status: RideStatus) -> Option<ServerEvent> {
        match status {
            RideStatus::DriverArriving => Some(ServerEvent::DriverArrived {
                ride_id: ride_id.to_string(),
            }),
            RideStatus::InProgress => Some(ServerEvent::RideStarted {
                ride_id: ride_id.to_string(),
            }),
            _ => None,
        }
    }
}
