// src/services/ride_service.rs
//
// Authority for the ride lifecycle. Every transition happens under the ride
// store's write lock, so each one is atomic with respect to the ride's
// current state; accept in particular is a conditional update with exactly
// one winner. Lock order is rides -> riders -> drivers throughout.
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing;

use crate::{
    errors::DispatchError as AppError,
    models::pricing::FareEstimate,
    models::ride::{GeoPoint, Ride, RideActor, RideRating, RideRequest, RideStatus},
    models::rider::{Rider, RiderRegistration},
    services::driver_index::DriverIndex,
    utils::geo,
    utils::id_generator::{IdGenerator, IdType},
};

pub struct RideService {
    rides: RwLock<HashMap<String, Ride>>,
    riders: RwLock<HashMap<String, Rider>>,
    drivers: Arc<DriverIndex>,
}

impl RideService {
    pub fn new(drivers: Arc<DriverIndex>) -> Self {
        Self {
            rides: RwLock::new(HashMap::new()),
            riders: RwLock::new(HashMap::new()),
            drivers,
        }
    }

    // ------------------------------------------------------------------
    // Riders
    // ------------------------------------------------------------------

    pub async fn register_rider(&self, registration: RiderRegistration) -> Result<Rider, AppError> {
        let now = Utc::now();
        let rider = Rider {
            id: IdGenerator::generate(IdType::Rider),
            user_id: registration.user_id,
            first_name: registration.first_name,
            last_name: registration.last_name,
            phone_number: registration.phone_number,
            payment_preference: registration.payment_preference,
            rating: 0.0,
            rating_count: 0,
            current_ride_id: None,
            ride_history: Vec::new(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.riders.write().await.insert(rider.id.clone(), rider.clone());
        tracing::info!("Rider registered: {}", rider.id);
        Ok(rider)
    }

    pub async fn get_rider(&self, rider_id: &str) -> Result<Rider, AppError> {
        self.riders
            .read()
            .await
            .get(rider_id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("rider {}", rider_id)))
    }

    pub async fn rider_exists(&self, rider_id: &str) -> bool {
        self.riders.read().await.contains_key(rider_id)
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Create a ride in `requested`. Guards the one-active-ride-per-rider
    /// invariant under the ride store's write lock.
    pub async fn create(&self, request: RideRequest, estimate: &FareEstimate) -> Result<Ride, AppError> {
        geo::validate_coordinates(request.pickup.latitude, request.pickup.longitude)?;
        geo::validate_coordinates(request.dropoff.latitude, request.dropoff.longitude)?;

        let mut rides = self.rides.write().await;
        let mut riders = self.riders.write().await;
        let rider = riders
            .get_mut(&request.rider_id)
            .ok_or_else(|| AppError::not_found(format!("rider {}", request.rider_id)))?;
        if rider.current_ride_id.is_some() {
            return Err(AppError::conflict("rider already has an active ride"));
        }

        let now = Utc::now();
        let ride = Ride {
            id: IdGenerator::generate(IdType::Ride),
            rider_id: request.rider_id.clone(),
            driver_id: None,
            status: RideStatus::Requested,
            vehicle_type: request.vehicle_type.unwrap_or(crate::models::driver::VehicleType::Regular),
            pickup: request.pickup,
            dropoff: request.dropoff,
            estimated_fare: estimate.fare,
            estimated_distance_km: estimate.distance_km,
            estimated_duration_secs: estimate.duration_secs,
            actual_fare: None,
            actual_distance_km: None,
            actual_duration_secs: None,
            requested_at: now,
            accepted_at: None,
            arrived_at: None,
            started_at: None,
            completed_at: None,
            cancelled_at: None,
            cancelled_by: None,
            cancellation_reason: None,
            rider_rating: None,
            driver_rating: None,
            notes: request.notes,
            updated_at: now,
        };

        rider.current_ride_id = Some(ride.id.clone());
        rider.updated_at = now;
        rides.insert(ride.id.clone(), ride.clone());

        tracing::info!("Ride created: {} for rider {}", ride.id, ride.rider_id);
        Ok(ride)
    }

    pub async fn get(&self, ride_id: &str) -> Result<Ride, AppError> {
        self.rides
            .read()
            .await
            .get(ride_id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("ride {}", ride_id)))
    }

    /// The accept race. Conditional update: succeeds only while the ride is
    /// still `requested` with no driver assigned. Every losing caller gets
    /// `Conflict` so the driver UI can show "ride no longer available".
    pub async fn accept(&self, ride_id: &str, driver_id: &str) -> Result<Ride, AppError> {
        let mut rides = self.rides.write().await;
        let ride = rides
            .get_mut(ride_id)
            .ok_or_else(|| AppError::not_found(format!("ride {}", ride_id)))?;

        if ride.status != RideStatus::Requested || ride.driver_id.is_some() {
            return Err(AppError::ride_taken());
        }

        // Availability check and assignment happen while we still hold the
        // ride write lock, so a second accept cannot interleave.
        self.drivers.begin_ride(driver_id, ride_id).await?;

        let now = Utc::now();
        ride.driver_id = Some(driver_id.to_string());
        ride.status = RideStatus::Accepted;
        ride.accepted_at = Some(now);
        ride.updated_at = now;

        tracing::info!("Ride {} accepted by driver {}", ride_id, driver_id);
        Ok(ride.clone())
    }

    pub async fn mark_arrived(&self, ride_id: &str, driver_id: &str) -> Result<Ride, AppError> {
        let mut rides = self.rides.write().await;
        let ride = rides
            .get_mut(ride_id)
            .ok_or_else(|| AppError::not_found(format!("ride {}", ride_id)))?;

        if ride.status != RideStatus::Accepted {
            return Err(AppError::invalid_transition(ride.status.to_string(), "mark arrived on"));
        }
        Self::require_assigned_driver(ride, driver_id)?;

        let now = Utc::now();
        ride.status = RideStatus::DriverArriving;
        ride.arrived_at = Some(now);
        ride.updated_at = now;
        Ok(ride.clone())
    }

    pub async fn start(&self, ride_id: &str, driver_id: &str) -> Result<Ride, AppError> {
        let mut rides = self.rides.write().await;
        let ride = rides
            .get_mut(ride_id)
            .ok_or_else(|| AppError::not_found(format!("ride {}", ride_id)))?;

        if ride.status != RideStatus::DriverArriving {
            return Err(AppError::invalid_transition(ride.status.to_string(), "start"));
        }
        Self::require_assigned_driver(ride, driver_id)?;

        let now = Utc::now();
        ride.status = RideStatus::InProgress;
        ride.started_at = Some(now);
        ride.updated_at = now;

        self.drivers.set_on_ride(driver_id).await?;
        tracing::info!("Ride {} started", ride_id);
        Ok(ride.clone())
    }

    pub async fn complete(
        &self,
        ride_id: &str,
        driver_id: &str,
        final_fare: Option<f64>,
        actual_distance_km: Option<f64>,
    ) -> Result<Ride, AppError> {
        let mut rides = self.rides.write().await;
        let ride = rides
            .get_mut(ride_id)
            .ok_or_else(|| AppError::not_found(format!("ride {}", ride_id)))?;

        if ride.status != RideStatus::InProgress {
            return Err(AppError::invalid_transition(ride.status.to_string(), "complete"));
        }
        Self::require_assigned_driver(ride, driver_id)?;

        let now = Utc::now();
        let fare = final_fare.unwrap_or(ride.estimated_fare);
        ride.status = RideStatus::Completed;
        ride.completed_at = Some(now);
        ride.actual_fare = Some(fare);
        ride.actual_distance_km =
            Some(actual_distance_km.unwrap_or(ride.estimated_distance_km));
        ride.actual_duration_secs = ride
            .started_at
            .map(|started| now.signed_duration_since(started).num_milliseconds() as f64 / 1000.0);
        ride.updated_at = now;
        let ride = ride.clone();

        self.release_rider(&ride.rider_id, &ride.id).await;
        self.drivers.finish_ride(driver_id, fare).await?;

        tracing::info!("Ride {} completed, fare {:.2}", ride_id, fare);
        Ok(ride)
    }

    /// Cancellation is a state transition, legal only before the ride is in
    /// progress. Outstanding route or pricing work for the ride is simply
    /// discarded by its caller once the status has moved on.
    pub async fn cancel(
        &self,
        ride_id: &str,
        actor: &RideActor,
        reason: Option<String>,
    ) -> Result<Ride, AppError> {
        let mut rides = self.rides.write().await;
        let ride = rides
            .get_mut(ride_id)
            .ok_or_else(|| AppError::not_found(format!("ride {}", ride_id)))?;

        if !matches!(
            ride.status,
            RideStatus::Requested | RideStatus::Accepted | RideStatus::DriverArriving
        ) {
            return Err(AppError::invalid_transition(ride.status.to_string(), "cancel"));
        }
        Self::require_party(ride, actor)?;

        let now = Utc::now();
        ride.status = RideStatus::Cancelled;
        ride.cancelled_at = Some(now);
        ride.cancelled_by = Some(actor.side().to_string());
        ride.cancellation_reason = reason;
        ride.updated_at = now;
        let ride = ride.clone();

        self.release_rider(&ride.rider_id, &ride.id).await;
        if let Some(driver_id) = &ride.driver_id {
            self.drivers.release_ride(driver_id).await?;
        }

        tracing::info!("Ride {} cancelled by {}", ride_id, actor.side());
        Ok(ride)
    }

    /// Each side rates the other exactly once, only after completion.
    pub async fn rate(
        &self,
        ride_id: &str,
        actor: &RideActor,
        rating: u8,
        review: Option<String>,
    ) -> Result<Ride, AppError> {
        if !(1..=5).contains(&rating) {
            return Err(AppError::validation_error("rating", "must be between 1 and 5"));
        }

        let rated = {
            let mut rides = self.rides.write().await;
            let ride = rides
                .get_mut(ride_id)
                .ok_or_else(|| AppError::not_found(format!("ride {}", ride_id)))?;

            if ride.status != RideStatus::Completed {
                return Err(AppError::invalid_transition(ride.status.to_string(), "rate"));
            }
            Self::require_party(ride, actor)?;

            let slot = match actor {
                RideActor::Rider(_) => &mut ride.rider_rating,
                RideActor::Driver(_) => &mut ride.driver_rating,
            };
            if slot.is_some() {
                return Err(AppError::AlreadyRated(actor.side().to_string()));
            }
            *slot = Some(RideRating {
                rating,
                review,
                rated_at: Utc::now(),
            });
            ride.updated_at = Utc::now();
            ride.clone()
        };

        // Fold into the counterpart's aggregate outside the ride lock
        match actor {
            RideActor::Rider(_) => {
                if let Some(driver_id) = &rated.driver_id {
                    self.drivers.apply_rating(driver_id, rating).await?;
                }
            }
            RideActor::Driver(_) => {
                let mut riders = self.riders.write().await;
                if let Some(rider) = riders.get_mut(&rated.rider_id) {
                    rider.apply_rating(rating);
                }
            }
        }

        Ok(rated)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Demand side of the demand/supply multiplier: rides requested within
    /// the window whose pickup falls inside the radius.
    pub async fn count_recent_requests(
        &self,
        point: GeoPoint,
        radius_km: f64,
        window: Duration,
    ) -> usize {
        let cutoff = Utc::now() - window;
        let rides = self.rides.read().await;
        rides
            .values()
            .filter(|r| r.requested_at >= cutoff)
            .filter(|r| {
                geo::haversine_km(
                    r.pickup.latitude,
                    r.pickup.longitude,
                    point.latitude,
                    point.longitude,
                ) <= radius_km
            })
            .count()
    }

    pub async fn rides_for_rider(&self, rider_id: &str) -> Vec<Ride> {
        let rides = self.rides.read().await;
        let mut out: Vec<Ride> = rides
            .values()
            .filter(|r| r.rider_id == rider_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        out
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn require_assigned_driver(ride: &Ride, driver_id: &str) -> Result<(), AppError> {
        match &ride.driver_id {
            Some(assigned) if assigned == driver_id => Ok(()),
            _ => Err(AppError::forbidden("driver is not assigned to this ride")),
        }
    }

    fn require_party(ride: &Ride, actor: &RideActor) -> Result<(), AppError> {
        let is_party = match actor {
            RideActor::Rider(id) => *id == ride.rider_id,
            RideActor::Driver(id) => ride.driver_id.as_deref() == Some(id.as_str()),
        };
        if is_party {
            Ok(())
        } else {
            Err(AppError::forbidden("actor is not a party to this ride"))
        }
    }

    async fn release_rider(&self, rider_id: &str, ride_id: &str) {
        let mut riders = self.riders.write().await;
        if let Some(rider) = riders.get_mut(rider_id) {
            if rider.current_ride_id.as_deref() == Some(ride_id) {
                rider.current_ride_id = None;
            }
            rider.ride_history.push(ride_id.to_string());
            rider.updated_at = Utc::now();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::driver::{
        DriverLocationUpdate, DriverRegistration, DriverStatus, DriverStatusUpdate, VehicleType,
    };
    use crate::models::pricing::{FareBreakdown, FareEstimate};
    use crate::models::ride::RidePoint;
    use crate::models::rider::PaymentPreference;

    fn estimate() -> FareEstimate {
        FareEstimate {
            fare: 14.75,
            distance_km: 5.4,
            duration_secs: 648.0,
            breakdown: FareBreakdown {
                base_fare: 2.5,
                distance_fare: 6.48,
                time_fare: 0.0,
                surge_multiplier: 1.0,
                demand_multiplier: 1.0,
                weather_multiplier: 1.0,
                time_of_day_multiplier: 1.0,
                discount: 0.0,
                total: 14.75,
                currency: "USD".to_string(),
            },
            applied_promotions: vec![],
            surge_info: None,
        }
    }

    fn point(lat: f64, lon: f64) -> RidePoint {
        RidePoint { latitude: lat, longitude: lon, address: None }
    }

    async fn setup() -> (Arc<DriverIndex>, Arc<RideService>, String) {
        let drivers = Arc::new(DriverIndex::new(300));
        let service = Arc::new(RideService::new(drivers.clone()));
        let rider = service
            .register_rider(RiderRegistration {
                user_id: "usr-account-1".to_string(),
                first_name: "Kofi".to_string(),
                last_name: "Owusu".to_string(),
                phone_number: "+233209876543".to_string(),
                payment_preference: PaymentPreference::Card,
            })
            .await
            .unwrap();
        (drivers, service, rider.id)
    }

    async fn available_driver(drivers: &DriverIndex, plate: &str) -> String {
        let driver = drivers
            .register(DriverRegistration {
                user_id: "usr-account-2".to_string(),
                first_name: "Ama".to_string(),
                last_name: "Mensah".to_string(),
                phone_number: "+233201234567".to_string(),
                license_plate: plate.to_string(),
                vehicle_type: VehicleType::Regular,
                vehicle_make: "Toyota".to_string(),
                vehicle_model: "Corolla".to_string(),
                vehicle_year: 2021,
                vehicle_color: "silver".to_string(),
                capacity: 4,
            })
            .await
            .unwrap();
        drivers.set_verified(&driver.id, true).await.unwrap();
        drivers
            .set_status(DriverStatusUpdate {
                driver_id: driver.id.clone(),
                status: DriverStatus::Available,
            })
            .await
            .unwrap();
        drivers
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
        driver.id
    }

    async fn requested_ride(service: &RideService, rider_id: &str) -> Ride {
        service
            .create(
                RideRequest {
                    rider_id: rider_id.to_string(),
                    pickup: point(40.7128, -74.0060),
                    dropoff: point(40.7589, -73.9851),
                    vehicle_type: Some(VehicleType::Regular),
                    notes: None,
                },
                &estimate(),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn full_lifecycle_is_monotonic() {
        let (drivers, service, rider_id) = setup().await;
        let driver_id = available_driver(&drivers, "GR-1111-20").await;

        let ride = requested_ride(&service, &rider_id).await;
        assert_eq!(ride.status, RideStatus::Requested);

        let ride = service.accept(&ride.id, &driver_id).await.unwrap();
        assert_eq!(ride.status, RideStatus::Accepted);
        assert_eq!(ride.driver_id.as_deref(), Some(driver_id.as_str()));
        assert!(ride.accepted_at.is_some());

        let ride = service.mark_arrived(&ride.id, &driver_id).await.unwrap();
        assert_eq!(ride.status, RideStatus::DriverArriving);

        let ride = service.start(&ride.id, &driver_id).await.unwrap();
        assert_eq!(ride.status, RideStatus::InProgress);

        let ride = service
            .complete(&ride.id, &driver_id, Some(16.0), None)
            .await
            .unwrap();
        assert_eq!(ride.status, RideStatus::Completed);
        assert_eq!(ride.actual_fare, Some(16.0));
        assert!(ride.actual_duration_secs.is_some());

        // Both parties are released
        let rider = service.get_rider(&rider_id).await.unwrap();
        assert_eq!(rider.current_ride_id, None);
        assert_eq!(rider.ride_history, vec![ride.id.clone()]);
        let driver = drivers.get(&driver_id).await.unwrap();
        assert_eq!(driver.status, DriverStatus::Available);
    }

    #[tokio::test]
    async fn concurrent_accepts_have_exactly_one_winner() {
        let (drivers, service, rider_id) = setup().await;
        let ride = requested_ride(&service, &rider_id).await;

        let mut driver_ids = Vec::new();
        for i in 0..8 {
            driver_ids.push(available_driver(&drivers, &format!("GR-2{:03}-20", i)).await);
        }

        let mut handles = Vec::new();
        for driver_id in driver_ids {
            let service = service.clone();
            let ride_id = ride.id.clone();
            handles.push(tokio::spawn(async move {
                service.accept(&ride_id, &driver_id).await
            }));
        }

        let mut winners = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(ride) => {
                    winners += 1;
                    assert_eq!(ride.status, RideStatus::Accepted);
                    assert!(ride.driver_id.is_some());
                }
                Err(AppError::Conflict(_)) => conflicts += 1,
                Err(other) => panic!("unexpected error: {}", other),
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(conflicts, 7);
    }

    #[tokio::test]
    async fn rider_cannot_hold_two_active_rides() {
        let (_, service, rider_id) = setup().await;
        requested_ride(&service, &rider_id).await;

        let err = service
            .create(
                RideRequest {
                    rider_id: rider_id.clone(),
                    pickup: point(40.7128, -74.0060),
                    dropoff: point(40.7589, -73.9851),
                    vehicle_type: None,
                    notes: None,
                },
                &estimate(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn cancel_after_complete_is_invalid_transition() {
        let (drivers, service, rider_id) = setup().await;
        let driver_id = available_driver(&drivers, "GR-3333-20").await;
        let ride = requested_ride(&service, &rider_id).await;
        service.accept(&ride.id, &driver_id).await.unwrap();
        service.mark_arrived(&ride.id, &driver_id).await.unwrap();
        service.start(&ride.id, &driver_id).await.unwrap();
        service.complete(&ride.id, &driver_id, None, None).await.unwrap();

        let err = service
            .cancel(&ride.id, &RideActor::Rider(rider_id.clone()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn cancel_from_requested_records_actor_and_reason() {
        let (_, service, rider_id) = setup().await;
        let ride = requested_ride(&service, &rider_id).await;

        let ride = service
            .cancel(
                &ride.id,
                &RideActor::Rider(rider_id.clone()),
                Some("waited too long".to_string()),
            )
            .await
            .unwrap();
        assert_eq!(ride.status, RideStatus::Cancelled);
        assert_eq!(ride.cancelled_by.as_deref(), Some("rider"));
        assert_eq!(ride.cancellation_reason.as_deref(), Some("waited too long"));

        let rider = service.get_rider(&rider_id).await.unwrap();
        assert_eq!(rider.current_ride_id, None);
    }

    #[tokio::test]
    async fn cancel_releases_assigned_driver() {
        let (drivers, service, rider_id) = setup().await;
        let driver_id = available_driver(&drivers, "GR-4444-20").await;
        let ride = requested_ride(&service, &rider_id).await;
        service.accept(&ride.id, &driver_id).await.unwrap();

        service
            .cancel(&ride.id, &RideActor::Driver(driver_id.clone()), None)
            .await
            .unwrap();
        let driver = drivers.get(&driver_id).await.unwrap();
        assert_eq!(driver.status, DriverStatus::Available);
        assert_eq!(driver.current_ride_id, None);
    }

    #[tokio::test]
    async fn skipping_states_is_rejected() {
        let (drivers, service, rider_id) = setup().await;
        let driver_id = available_driver(&drivers, "GR-5555-20").await;
        let ride = requested_ride(&service, &rider_id).await;
        service.accept(&ride.id, &driver_id).await.unwrap();

        // accepted -> in_progress is not legal; arrival comes first
        let err = service.start(&ride.id, &driver_id).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn unassigned_driver_is_forbidden() {
        let (drivers, service, rider_id) = setup().await;
        let driver_a = available_driver(&drivers, "GR-6666-20").await;
        let driver_b = available_driver(&drivers, "GR-7777-20").await;
        let ride = requested_ride(&service, &rider_id).await;
        service.accept(&ride.id, &driver_a).await.unwrap();

        let err = service.mark_arrived(&ride.id, &driver_b).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn each_side_rates_once() {
        let (drivers, service, rider_id) = setup().await;
        let driver_id = available_driver(&drivers, "GR-8888-20").await;
        let ride = requested_ride(&service, &rider_id).await;
        service.accept(&ride.id, &driver_id).await.unwrap();
        service.mark_arrived(&ride.id, &driver_id).await.unwrap();
        service.start(&ride.id, &driver_id).await.unwrap();
        service.complete(&ride.id, &driver_id, None, None).await.unwrap();

        let rider_actor = RideActor::Rider(rider_id.clone());
        service.rate(&ride.id, &rider_actor, 5, None).await.unwrap();
        let err = service.rate(&ride.id, &rider_actor, 4, None).await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyRated(_)));

        // The other side still gets its one rating
        let driver_actor = RideActor::Driver(driver_id.clone());
        let ride = service
            .rate(&ride.id, &driver_actor, 4, Some("polite".to_string()))
            .await
            .unwrap();
        assert!(ride.rider_rating.is_some());
        assert!(ride.driver_rating.is_some());

        // Aggregates moved on both sides
        let driver = drivers.get(&driver_id).await.unwrap();
        assert!((driver.rating - 5.0).abs() < 1e-6);
        let rider = service.get_rider(&rider_id).await.unwrap();
        assert!((rider.rating - 4.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn rating_before_completion_is_rejected() {
        let (_, service, rider_id) = setup().await;
        let ride = requested_ride(&service, &rider_id).await;

        let err = service
            .rate(&ride.id, &RideActor::Rider(rider_id.clone()), 5, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn rating_out_of_range_is_validation_error() {
        let (_, service, rider_id) = setup().await;
        let ride = requested_ride(&service, &rider_id).await;
        let err = service
            .rate(&ride.id, &RideActor::Rider(rider_id.clone()), 6, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationFailed(_)));
    }

    #[tokio::test]
    async fn recent_request_count_is_radius_scoped() {
        let (_, service, rider_id) = setup().await;
        requested_ride(&service, &rider_id).await;

        let near = GeoPoint { latitude: 40.7128, longitude: -74.0060 };
        let far = GeoPoint { latitude: 41.5, longitude: -74.0060 };
        assert_eq!(
            service.count_recent_requests(near, 5.0, Duration::minutes(30)).await,
            1
        );
        assert_eq!(
            service.count_recent_requests(far, 5.0, Duration::minutes(30)).await,
            0
        );
    }
}
