// src/models/driver.rs
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DriverStatus {
    Offline,   // Not accepting work
    Available, // Online and matchable
    Busy,      // Accepted a ride, heading to pickup
    OnRide,    // Ride in progress
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum VehicleType {
    Regular,
    Premium,
    Suv,
    Moto,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Vehicle {
    pub id: String,
    pub license_plate: String, // Unique across the fleet
    pub vehicle_type: VehicleType,
    pub make: String,
    pub model: String,
    pub year: u16,
    pub color: String,
    pub capacity: u8, // Passenger seats
    pub is_verified: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>, // Accuracy in meters
    pub heading: Option<f64>,  // Direction in degrees (0-360)
    pub speed: Option<f64>,    // Speed in km/h
    pub timestamp: DateTime<Utc>,
}

impl Location {
    /// A location older than the freshness window is excluded from matching.
    pub fn is_fresh(&self, now: DateTime<Utc>, freshness: Duration) -> bool {
        now.signed_duration_since(self.timestamp) <= freshness
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Driver {
    pub id: String,
    pub user_id: String, // Reference to the account service
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub status: DriverStatus,
    pub current_location: Option<Location>,
    pub vehicle: Vehicle,
    pub rating: f32,        // Average rating (0-5)
    pub rating_count: u32,  // Ratings received so far
    pub total_rides: u32,   // Completed rides
    pub total_earnings: f64,
    pub is_verified: bool,
    pub is_active: bool,
    // Invariant: Some(_) implies status is Busy or OnRide
    pub current_ride_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Driver {
    /// True when the driver may be offered new rides at all.
    pub fn is_matchable(&self) -> bool {
        self.is_active
            && self.is_verified
            && self.vehicle.is_verified
            && self.status == DriverStatus::Available
            && self.current_ride_id.is_none()
    }

    /// Fold a new rating into the running average.
    pub fn apply_rating(&mut self, rating: u8) {
        let total = self.rating * self.rating_count as f32 + rating as f32;
        self.rating_count += 1;
        self.rating = total / self.rating_count as f32;
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DriverRegistration {
    pub user_id: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub license_plate: String,
    pub vehicle_type: VehicleType,
    pub vehicle_make: String,
    pub vehicle_model: String,
    pub vehicle_year: u16,
    pub vehicle_color: String,
    pub capacity: u8,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DriverStatusUpdate {
    pub driver_id: String,
    pub status: DriverStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverLocationUpdate {
    pub driver_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub heading: Option<f64>,
    pub speed: Option<f64>,
    pub accuracy: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DriverResponse {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub status: DriverStatus,
    pub current_location: Option<Location>,
    pub vehicle: Vehicle,
    pub rating: f32,
    pub total_rides: u32,
    pub is_verified: bool,
    pub current_ride_id: Option<String>,
}

impl From<Driver> for DriverResponse {
    fn from(driver: Driver) -> Self {
        DriverResponse {
            id: driver.id,
            first_name: driver.first_name,
            last_name: driver.last_name,
            status: driver.status,
            current_location: driver.current_location,
            vehicle: driver.vehicle,
            rating: driver.rating,
            total_rides: driver.total_rides,
            is_verified: driver.is_verified,
            current_ride_id: driver.current_ride_id,
        }
    }
}

/// A matched driver as returned from a dispatch query, closest first.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MatchedDriver {
    pub driver: DriverResponse,
    pub distance_km: f64,
    pub eta_secs: f64,
}
