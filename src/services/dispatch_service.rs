// src/services/dispatch_service.rs
//
// Coordinator tying the stores, the pricing pipeline and the event hub
// together. Every lifecycle operation goes through here: the state change
// is made by the owning service first, and only a successful change is
// echoed over the hub. Hub delivery is best effort; a dropped event never
// rolls a transition back.
use std::sync::Arc;
use tracing;

use crate::{
    errors::DispatchError as AppError,
    models::driver::{DriverLocationUpdate, DriverResponse, MatchedDriver},
    models::events::ServerEvent,
    models::pricing::FareEstimate,
    models::ride::{GeoPoint, Ride, RideActor, RideRequest, RideResponse},
    realtime::hub::EventHub,
    services::driver_index::DriverIndex,
    services::pricing_service::PricingService,
    services::ride_service::RideService,
    utils::geo,
};

#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub search_radius_km: f64,
    pub max_matched_drivers: usize,
    /// Speed assumed when quoting a driver's ETA to the pickup.
    pub approach_speed_kmh: f64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            search_radius_km: 5.0,
            max_matched_drivers: 5,
            approach_speed_kmh: 30.0,
        }
    }
}

pub struct DispatchService {
    config: DispatchConfig,
    rides: Arc<RideService>,
    drivers: Arc<DriverIndex>,
    pricing: Arc<PricingService>,
    hub: Arc<EventHub>,
}

impl DispatchService {
    pub fn new(
        config: DispatchConfig,
        rides: Arc<RideService>,
        drivers: Arc<DriverIndex>,
        pricing: Arc<PricingService>,
        hub: Arc<EventHub>,
    ) -> Self {
        Self {
            config,
            rides,
            drivers,
            pricing,
            hub,
        }
    }

    // ------------------------------------------------------------------
    // Ride request and offer fan-out
    // ------------------------------------------------------------------

    /// Price the trip, create the ride, and push an offer to every matched
    /// driver in ascending ETA order.
    pub async fn request_ride(&self, request: RideRequest) -> Result<RideResponse, AppError> {
        // The estimate applies promotions and increments their usage
        // counters, so a request that cannot proceed must not reach it.
        // The create call re-checks under the ride store's write lock,
        // which remains the authority.
        let rider = self.rides.get_rider(&request.rider_id).await?;
        if rider.current_ride_id.is_some() {
            return Err(AppError::conflict("rider already has an active ride"));
        }

        let vehicle_type = request
            .vehicle_type
            .unwrap_or(crate::models::driver::VehicleType::Regular);
        let estimate = self
            .pricing
            .estimate(
                request.pickup.geo(),
                request.dropoff.geo(),
                vehicle_type,
                chrono::Utc::now(),
                Some(&request.rider_id),
            )
            .await?;

        let ride = self.rides.create(request, &estimate).await?;
        let matched = self.offer_to_drivers(&ride, &estimate).await;

        if matched.is_empty() {
            tracing::warn!("Ride {}: no available drivers within radius", ride.id);
        }
        Ok(RideResponse {
            ride,
            matched_drivers: matched,
        })
    }

    async fn offer_to_drivers(&self, ride: &Ride, estimate: &FareEstimate) -> Vec<MatchedDriver> {
        let candidates = self
            .drivers
            .find_available(
                ride.pickup.geo(),
                self.config.search_radius_km,
                Some(ride.vehicle_type),
                self.config.max_matched_drivers,
            )
            .await;

        let mut matched = Vec::with_capacity(candidates.len());
        // find_available sorts ascending by distance, so offers go out
        // nearest first
        for (driver, distance_km) in candidates {
            let eta_secs = distance_km / self.config.approach_speed_kmh * 3600.0;
            let offer = ServerEvent::RideRequest {
                ride_id: ride.id.clone(),
                pickup: ride.pickup.clone(),
                dropoff: ride.dropoff.clone(),
                vehicle_type: ride.vehicle_type,
                estimated_fare: estimate.fare,
                distance_to_pickup_km: distance_km,
                eta_to_pickup_secs: eta_secs,
            };
            let delivered = self.hub.send_to_driver(&driver.id, offer).await;
            tracing::debug!(
                "Ride {}: offer to driver {} reached {} connection(s)",
                ride.id,
                driver.id,
                delivered
            );
            matched.push(MatchedDriver {
                driver: DriverResponse::from(driver),
                distance_km,
                eta_secs,
            });
        }
        matched
    }

    // ------------------------------------------------------------------
    // Lifecycle fronting
    // ------------------------------------------------------------------

    pub async fn accept_ride(&self, ride_id: &str, driver_id: &str) -> Result<Ride, AppError> {
        let ride = self.rides.accept(ride_id, driver_id).await?;
        let driver = self.drivers.get(driver_id).await?;

        let eta_to_pickup_secs = driver.current_location.as_ref().map(|loc| {
            geo::haversine_km(
                loc.latitude,
                loc.longitude,
                ride.pickup.latitude,
                ride.pickup.longitude,
            ) / self.config.approach_speed_kmh
                * 3600.0
        });
        self.hub
            .send_to_rider(
                &ride.rider_id,
                ServerEvent::RideAccepted {
                    ride_id: ride.id.clone(),
                    driver_id: driver.id.clone(),
                    driver_name: format!("{} {}", driver.first_name, driver.last_name),
                    vehicle_plate: driver.vehicle.license_plate.clone(),
                    eta_to_pickup_secs,
                },
            )
            .await;
        Ok(ride)
    }

    pub async fn driver_arrived(&self, ride_id: &str, driver_id: &str) -> Result<Ride, AppError> {
        let ride = self.rides.mark_arrived(ride_id, driver_id).await?;
        if let Some(event) = ServerEvent::for_status(&ride.id, ride.status) {
            self.hub.send_to_rider(&ride.rider_id, event).await;
        }
        Ok(ride)
    }

    pub async fn start_ride(&self, ride_id: &str, driver_id: &str) -> Result<Ride, AppError> {
        let ride = self.rides.start(ride_id, driver_id).await?;
        if let Some(event) = ServerEvent::for_status(&ride.id, ride.status) {
            self.hub.send_to_rider(&ride.rider_id, event).await;
        }
        Ok(ride)
    }

    pub async fn complete_ride(
        &self,
        ride_id: &str,
        driver_id: &str,
        final_fare: Option<f64>,
        actual_distance_km: Option<f64>,
    ) -> Result<Ride, AppError> {
        let ride = self
            .rides
            .complete(ride_id, driver_id, final_fare, actual_distance_km)
            .await?;
        let event = ServerEvent::RideCompleted {
            ride_id: ride.id.clone(),
            fare: ride.actual_fare.unwrap_or(ride.estimated_fare),
            distance_km: ride.actual_distance_km.unwrap_or(ride.estimated_distance_km),
            duration_secs: ride
                .actual_duration_secs
                .unwrap_or(ride.estimated_duration_secs),
        };
        self.hub.send_to_rider(&ride.rider_id, event.clone()).await;
        self.hub.send_to_driver(driver_id, event).await;
        Ok(ride)
    }

    /// Cancellation notifies the counterparty; the cancelling side already
    /// knows from the call result.
    pub async fn cancel_ride(
        &self,
        ride_id: &str,
        actor: &RideActor,
        reason: Option<String>,
    ) -> Result<Ride, AppError> {
        let ride = self.rides.cancel(ride_id, actor, reason).await?;
        let event = ServerEvent::RideCancelled {
            ride_id: ride.id.clone(),
            cancelled_by: actor.side().to_string(),
            reason: ride.cancellation_reason.clone(),
        };
        match actor {
            RideActor::Rider(_) => {
                if let Some(driver_id) = &ride.driver_id {
                    self.hub.send_to_driver(driver_id, event).await;
                }
            }
            RideActor::Driver(_) => {
                self.hub.send_to_rider(&ride.rider_id, event).await;
            }
        }
        Ok(ride)
    }

    pub async fn rate_ride(
        &self,
        ride_id: &str,
        actor: &RideActor,
        rating: u8,
        review: Option<String>,
    ) -> Result<Ride, AppError> {
        self.rides.rate(ride_id, actor, rating, review).await
    }

    // ------------------------------------------------------------------
    // Driver telemetry
    // ------------------------------------------------------------------

    /// Store the location, then forward it to the rider of the driver's
    /// active ride only. Other riders never see a driver's position.
    pub async fn update_driver_location(&self, update: DriverLocationUpdate) -> Result<(), AppError> {
        let driver = self.drivers.update_location(update).await?;

        let Some(ride_id) = &driver.current_ride_id else {
            return Ok(());
        };
        let ride = match self.rides.get(ride_id).await {
            Ok(ride) => ride,
            Err(_) => return Ok(()),
        };
        if !ride.status.is_active() {
            return Ok(());
        }
        if let Some(location) = &driver.current_location {
            self.hub
                .send_to_rider(
                    &ride.rider_id,
                    ServerEvent::DriverLocationUpdate {
                        driver_id: driver.id.clone(),
                        latitude: location.latitude,
                        longitude: location.longitude,
                        heading: location.heading,
                        speed: location.speed,
                        updated_at: location.timestamp,
                    },
                )
                .await;
        }
        Ok(())
    }

    pub fn hub(&self) -> &Arc<EventHub> {
        &self.hub
    }
}
