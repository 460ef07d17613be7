// src/services/driver_index.rs
use chrono::{Duration, Utc};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use tracing;

use crate::{
    errors::DispatchError as AppError,
    models::driver::{
        Driver, DriverLocationUpdate, DriverRegistration, DriverStatus, DriverStatusUpdate,
        Location, Vehicle, VehicleType,
    },
    models::ride::GeoPoint,
    utils::geo,
    utils::id_generator::{IdGenerator, IdType},
};

struct IndexInner {
    drivers: HashMap<String, Driver>,
    // License plates are unique across the fleet
    plates: HashSet<String>,
}

/// In-memory geospatial driver registry. Location writes are last-write-wins
/// by contract: concurrent updates from the same driver's sessions clobber
/// each other and only the freshest position matters.
pub struct DriverIndex {
    inner: RwLock<IndexInner>,
    freshness: Duration,
}

impl DriverIndex {
    pub fn new(location_freshness_secs: i64) -> Self {
        Self {
            inner: RwLock::new(IndexInner {
                drivers: HashMap::new(),
                plates: HashSet::new(),
            }),
            freshness: Duration::seconds(location_freshness_secs),
        }
    }

    pub async fn register(&self, registration: DriverRegistration) -> Result<Driver, AppError> {
        tracing::info!("Registering driver for user: {}", registration.user_id);

        let mut inner = self.inner.write().await;
        if inner.plates.contains(&registration.license_plate) {
            return Err(AppError::conflict(format!(
                "license plate {} already registered",
                registration.license_plate
            )));
        }

        let now = Utc::now();
        let vehicle = Vehicle {
            id: IdGenerator::generate(IdType::Vehicle),
            license_plate: registration.license_plate.clone(),
            vehicle_type: registration.vehicle_type,
            make: registration.vehicle_make,
            model: registration.vehicle_model,
            year: registration.vehicle_year,
            color: registration.vehicle_color,
            capacity: registration.capacity,
            is_verified: false,
        };

        let driver = Driver {
            id: IdGenerator::generate(IdType::Driver),
            user_id: registration.user_id,
            first_name: registration.first_name,
            last_name: registration.last_name,
            phone_number: registration.phone_number,
            status: DriverStatus::Offline,
            current_location: None,
            vehicle,
            rating: 0.0,
            rating_count: 0,
            total_rides: 0,
            total_earnings: 0.0,
            is_verified: false,
            is_active: true,
            current_ride_id: None,
            created_at: now,
            updated_at: now,
        };

        inner.plates.insert(registration.license_plate);
        inner.drivers.insert(driver.id.clone(), driver.clone());

        tracing::info!("Driver registered: {}", driver.id);
        Ok(driver)
    }

    pub async fn get(&self, driver_id: &str) -> Result<Driver, AppError> {
        let inner = self.inner.read().await;
        inner
            .drivers
            .get(driver_id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("driver {}", driver_id)))
    }

    pub async fn exists(&self, driver_id: &str) -> bool {
        self.inner.read().await.drivers.contains_key(driver_id)
    }

    /// Mark a driver (and their vehicle) as verified. Verification itself is
    /// a collaborator concern; the index only records the outcome.
    pub async fn set_verified(&self, driver_id: &str, verified: bool) -> Result<Driver, AppError> {
        let mut inner = self.inner.write().await;
        let driver = inner
            .drivers
            .get_mut(driver_id)
            .ok_or_else(|| AppError::not_found(format!("driver {}", driver_id)))?;
        driver.is_verified = verified;
        driver.vehicle.is_verified = verified;
        driver.updated_at = Utc::now();
        Ok(driver.clone())
    }

    pub async fn set_status(&self, update: DriverStatusUpdate) -> Result<Driver, AppError> {
        if !IdGenerator::validate_id(&update.driver_id, Some(IdType::Driver)) {
            return Err(AppError::validation_error("driver_id", "invalid driver ID format"));
        }

        let mut inner = self.inner.write().await;
        let driver = inner
            .drivers
            .get_mut(&update.driver_id)
            .ok_or_else(|| AppError::not_found(format!("driver {}", update.driver_id)))?;

        // A driver holding an active ride cannot step out of it by flipping
        // their own status
        if driver.current_ride_id.is_some()
            && matches!(update.status, DriverStatus::Offline | DriverStatus::Available)
        {
            return Err(AppError::conflict("driver has an active ride"));
        }

        tracing::info!("Driver {} status: {:?}", driver.id, update.status);
        driver.status = update.status;
        driver.updated_at = Utc::now();
        Ok(driver.clone())
    }

    /// Pure overwrite; no version check. See the module note on
    /// last-write-wins.
    pub async fn update_location(&self, update: DriverLocationUpdate) -> Result<Driver, AppError> {
        geo::validate_coordinates(update.latitude, update.longitude)?;

        let mut inner = self.inner.write().await;
        let driver = inner
            .drivers
            .get_mut(&update.driver_id)
            .ok_or_else(|| AppError::not_found(format!("driver {}", update.driver_id)))?;

        let now = Utc::now();
        driver.current_location = Some(Location {
            latitude: update.latitude,
            longitude: update.longitude,
            accuracy: update.accuracy,
            heading: update.heading,
            speed: update.speed,
            timestamp: now,
        });
        driver.updated_at = now;

        tracing::debug!("Driver {} location updated", driver.id);
        Ok(driver.clone())
    }

    /// Nearest available drivers: active, verified, fresh location, within
    /// the radius, optionally filtered by vehicle type. Sorted by distance
    /// ascending and truncated to `limit`.
    pub async fn find_available(
        &self,
        point: GeoPoint,
        radius_km: f64,
        vehicle_type: Option<VehicleType>,
        limit: usize,
    ) -> Vec<(Driver, f64)> {
        let now = Utc::now();
        let inner = self.inner.read().await;

        let mut matches: Vec<(Driver, f64)> = inner
            .drivers
            .values()
            .filter(|d| d.is_matchable())
            .filter(|d| {
                vehicle_type.map_or(true, |vt| d.vehicle.vehicle_type == vt)
            })
            .filter_map(|d| {
                let loc = d.current_location.as_ref()?;
                if !loc.is_fresh(now, self.freshness) {
                    return None;
                }
                let distance = geo::haversine_km(
                    loc.latitude,
                    loc.longitude,
                    point.latitude,
                    point.longitude,
                );
                (distance <= radius_km).then(|| (d.clone(), distance))
            })
            .collect();

        matches.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        matches.truncate(limit);
        matches
    }

    /// Supply side of the demand/supply multiplier.
    pub async fn count_available_near(&self, point: GeoPoint, radius_km: f64) -> usize {
        self.find_available(point, radius_km, None, usize::MAX).await.len()
    }

    /// Transition the winning driver onto a ride. Caller holds the ride
    /// store's write lock, so the availability check here cannot race
    /// another accept.
    pub async fn begin_ride(&self, driver_id: &str, ride_id: &str) -> Result<Driver, AppError> {
        let mut inner = self.inner.write().await;
        let driver = inner
            .drivers
            .get_mut(driver_id)
            .ok_or_else(|| AppError::not_found(format!("driver {}", driver_id)))?;

        if !driver.is_matchable() {
            return Err(AppError::conflict("driver is not available"));
        }

        driver.status = DriverStatus::Busy;
        driver.current_ride_id = Some(ride_id.to_string());
        driver.updated_at = Utc::now();
        Ok(driver.clone())
    }

    pub async fn set_on_ride(&self, driver_id: &str) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        let driver = inner
            .drivers
            .get_mut(driver_id)
            .ok_or_else(|| AppError::not_found(format!("driver {}", driver_id)))?;
        driver.status = DriverStatus::OnRide;
        driver.updated_at = Utc::now();
        Ok(())
    }

    /// Release a driver after completion; credits earnings and counters.
    pub async fn finish_ride(&self, driver_id: &str, earnings: f64) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        let driver = inner
            .drivers
            .get_mut(driver_id)
            .ok_or_else(|| AppError::not_found(format!("driver {}", driver_id)))?;
        driver.status = DriverStatus::Available;
        driver.current_ride_id = None;
        driver.total_rides += 1;
        driver.total_earnings += earnings;
        driver.updated_at = Utc::now();
        Ok(())
    }

    /// Release a driver after a cancellation; no earnings credited.
    pub async fn release_ride(&self, driver_id: &str) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        let driver = inner
            .drivers
            .get_mut(driver_id)
            .ok_or_else(|| AppError::not_found(format!("driver {}", driver_id)))?;
        driver.status = DriverStatus::Available;
        driver.current_ride_id = None;
        driver.updated_at = Utc::now();
        Ok(())
    }

    pub async fn apply_rating(&self, driver_id: &str, rating: u8) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        let driver = inner
            .drivers
            .get_mut(driver_id)
            .ok_or_else(|| AppError::not_found(format!("driver {}", driver_id)))?;
        driver.apply_rating(rating);
        driver.updated_at = Utc::now();
        Ok(())
    }

    /// Drivers are never hard-deleted; deactivation removes them from
    /// matching while keeping their record.
    pub async fn deactivate(&self, driver_id: &str) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        let driver = inner
            .drivers
            .get_mut(driver_id)
            .ok_or_else(|| AppError::not_found(format!("driver {}", driver_id)))?;
        driver.is_active = false;
        driver.status = DriverStatus::Offline;
        driver.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(plate: &str, vehicle_type: VehicleType) -> DriverRegistration {
        DriverRegistration {
            user_id: "usr-260101-abc123".to_string(),
            first_name: "Ama".to_string(),
            last_name: "Mensah".to_string(),
            phone_number: "+233201234567".to_string(),
            license_plate: plate.to_string(),
            vehicle_type,
            vehicle_make: "Toyota".to_string(),
            vehicle_model: "Corolla".to_string(),
            vehicle_year: 2021,
            vehicle_color: "silver".to_string(),
            capacity: 4,
        }
    }

    async fn available_driver(index: &DriverIndex, plate: &str, lat: f64, lon: f64) -> Driver {
        let driver = index
            .register(registration(plate, VehicleType::Regular))
            .await
            .unwrap();
        index.set_verified(&driver.id, true).await.unwrap();
        index
            .set_status(DriverStatusUpdate {
                driver_id: driver.id.clone(),
                status: DriverStatus::Available,
            })
            .await
            .unwrap();
        index
            .update_location(DriverLocationUpdate {
                driver_id: driver.id.clone(),
                latitude: lat,
                longitude: lon,
                heading: None,
                speed: None,
                accuracy: None,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn duplicate_plate_is_rejected() {
        let index = DriverIndex::new(300);
        index.register(registration("GR-1234-20", VehicleType::Regular)).await.unwrap();
        let err = index
            .register(registration("GR-1234-20", VehicleType::Suv))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn find_available_orders_by_distance_and_truncates() {
        let index = DriverIndex::new(300);
        let near = available_driver(&index, "GR-0001-20", 40.7130, -74.0060).await;
        let far = available_driver(&index, "GR-0002-20", 40.7300, -74.0060).await;
        available_driver(&index, "GR-0003-20", 40.7500, -74.0060).await;

        let point = GeoPoint { latitude: 40.7128, longitude: -74.0060 };
        let matches = index.find_available(point, 10.0, None, 2).await;
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].0.id, near.id);
        assert_eq!(matches[1].0.id, far.id);
        assert!(matches[0].1 < matches[1].1);
    }

    #[tokio::test]
    async fn unverified_and_offline_drivers_are_excluded() {
        let index = DriverIndex::new(300);
        let driver = index.register(registration("GR-0004-20", VehicleType::Regular)).await.unwrap();
        // Online but never verified
        index
            .set_status(DriverStatusUpdate {
                driver_id: driver.id.clone(),
                status: DriverStatus::Available,
            })
            .await
            .unwrap();
        index
            .update_location(DriverLocationUpdate {
                driver_id: driver.id.clone(),
                latitude: 40.7128,
                longitude: -74.0060,
                heading: None,
                speed: None,
                accuracy: None,
            })
            .await
            .unwrap();

        let point = GeoPoint { latitude: 40.7128, longitude: -74.0060 };
        assert!(index.find_available(point, 5.0, None, 10).await.is_empty());
    }

    #[tokio::test]
    async fn stale_locations_are_excluded() {
        // Freshness window of zero seconds makes every location stale
        let index = DriverIndex::new(0);
        available_driver(&index, "GR-0005-20", 40.7128, -74.0060).await;

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let point = GeoPoint { latitude: 40.7128, longitude: -74.0060 };
        assert!(index.find_available(point, 5.0, None, 10).await.is_empty());
    }

    #[tokio::test]
    async fn vehicle_type_filter_applies() {
        let index = DriverIndex::new(300);
        available_driver(&index, "GR-0006-20", 40.7128, -74.0060).await;

        let point = GeoPoint { latitude: 40.7128, longitude: -74.0060 };
        let suvs = index.find_available(point, 5.0, Some(VehicleType::Suv), 10).await;
        assert!(suvs.is_empty());
        let regulars = index.find_available(point, 5.0, Some(VehicleType::Regular), 10).await;
        assert_eq!(regulars.len(), 1);
    }

    #[tokio::test]
    async fn location_update_is_last_write_wins() {
        let index = DriverIndex::new(300);
        let driver = available_driver(&index, "GR-0007-20", 40.0, -74.0).await;

        let updated = index
            .update_location(DriverLocationUpdate {
                driver_id: driver.id.clone(),
                latitude: 41.0,
                longitude: -73.0,
                heading: Some(90.0),
                speed: Some(35.0),
                accuracy: None,
            })
            .await
            .unwrap();
        let loc = updated.current_location.unwrap();
        assert_eq!(loc.latitude, 41.0);
        assert_eq!(loc.heading, Some(90.0));
    }

    #[tokio::test]
    async fn driver_with_active_ride_cannot_go_offline() {
        let index = DriverIndex::new(300);
        let driver = available_driver(&index, "GR-0008-20", 40.0, -74.0).await;
        index.begin_ride(&driver.id, "rid-260101-abc123").await.unwrap();

        let err = index
            .set_status(DriverStatusUpdate {
                driver_id: driver.id.clone(),
                status: DriverStatus::Offline,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn finish_ride_credits_earnings() {
        let index = DriverIndex::new(300);
        let driver = available_driver(&index, "GR-0009-20", 40.0, -74.0).await;
        index.begin_ride(&driver.id, "rid-260101-abc123").await.unwrap();
        index.finish_ride(&driver.id, 18.50).await.unwrap();

        let driver = index.get(&driver.id).await.unwrap();
        assert_eq!(driver.status, DriverStatus::Available);
        assert_eq!(driver.current_ride_id, None);
        assert_eq!(driver.total_rides, 1);
        assert!((driver.total_earnings - 18.50).abs() < 1e-9);
    }
}
