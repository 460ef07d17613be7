// src/services/pricing_service.rs
//
// Multi-factor fare computation. The pipeline is multiplicative except for
// the promotional discount, and the result never drops below the flat base
// fare. Surge areas and promotions live in process memory; promotion usage
// is a serialized check-and-increment under the store's write lock so a
// fixed-limit offer can never be over-redeemed.
use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, Timelike, Utc, Weekday};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing;

use crate::{
    errors::DispatchError as AppError,
    models::driver::VehicleType,
    models::pricing::{
        FareBreakdown, FareEstimate, PromoOffer, RegisterPromoRequest, RegisterSurgeAreaRequest,
        SurgeArea, SurgeInfo,
    },
    models::ride::GeoPoint,
    models::route::RouteOptions,
    services::driver_index::DriverIndex,
    services::ride_service::RideService,
    services::route_service::RouteService,
    utils::id_generator::{IdGenerator, IdType},
};

#[derive(Debug, Clone)]
pub struct PricingConfig {
    pub base_fare: f64,
    pub per_km_regular: f64,
    pub per_km_premium: f64,
    pub per_km_suv: f64,
    pub per_km_moto: f64,
    // Per-second charge on the portion of the estimate beyond the threshold
    pub long_ride_threshold_secs: f64,
    pub long_ride_per_sec: f64,
    pub currency: String,
    pub demand_window_mins: i64,
    pub demand_radius_km: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            base_fare: 2.50,
            per_km_regular: 1.20,
            per_km_premium: 2.00,
            per_km_suv: 1.75,
            per_km_moto: 0.80,
            long_ride_threshold_secs: 1800.0,
            long_ride_per_sec: 0.01,
            currency: "USD".to_string(),
            demand_window_mins: 30,
            demand_radius_km: 5.0,
        }
    }
}

impl PricingConfig {
    pub fn per_km(&self, vehicle_type: VehicleType) -> f64 {
        match vehicle_type {
            VehicleType::Regular => self.per_km_regular,
            VehicleType::Premium => self.per_km_premium,
            VehicleType::Suv => self.per_km_suv,
            VehicleType::Moto => self.per_km_moto,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeatherCondition {
    Clear,
    Rain,
    Storm,
    Snow,
}

impl WeatherCondition {
    pub fn multiplier(&self) -> f64 {
        match self {
            WeatherCondition::Clear => 1.0,
            WeatherCondition::Rain => 1.2,
            WeatherCondition::Storm => 1.4,
            WeatherCondition::Snow => 1.5,
        }
    }
}

/// Weather lookups are a collaborator boundary; estimates treat a failed
/// lookup as clear weather rather than failing the fare.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn current(&self, at: DateTime<Utc>, point: &GeoPoint) -> Result<WeatherCondition, AppError>;
}

/// Default source: weighted random conditions. Tests inject FixedWeather
/// to keep breakdowns reproducible.
pub struct SimulatedWeather;

#[async_trait]
impl WeatherSource for SimulatedWeather {
    async fn current(&self, _at: DateTime<Utc>, _point: &GeoPoint) -> Result<WeatherCondition, AppError> {
        use rand::Rng;
        let roll: f64 = rand::rng().random_range(0.0..1.0);
        Ok(if roll < 0.70 {
            WeatherCondition::Clear
        } else if roll < 0.90 {
            WeatherCondition::Rain
        } else if roll < 0.97 {
            WeatherCondition::Storm
        } else {
            WeatherCondition::Snow
        })
    }
}

pub struct FixedWeather(pub WeatherCondition);

#[async_trait]
impl WeatherSource for FixedWeather {
    async fn current(&self, _at: DateTime<Utc>, _point: &GeoPoint) -> Result<WeatherCondition, AppError> {
        Ok(self.0)
    }
}

pub struct PricingService {
    config: PricingConfig,
    surge_areas: RwLock<Vec<SurgeArea>>,
    promotions: RwLock<HashMap<String, PromoOffer>>,
    weather: Arc<dyn WeatherSource>,
    routes: Arc<RouteService>,
    drivers: Arc<DriverIndex>,
    rides: Arc<RideService>,
}

impl PricingService {
    pub fn new(
        config: PricingConfig,
        routes: Arc<RouteService>,
        drivers: Arc<DriverIndex>,
        rides: Arc<RideService>,
        weather: Arc<dyn WeatherSource>,
    ) -> Self {
        Self {
            config,
            surge_areas: RwLock::new(Vec::new()),
            promotions: RwLock::new(HashMap::new()),
            weather,
            routes,
            drivers,
            rides,
        }
    }

    /// Full estimate pipeline. `at` is passed explicitly so breakdowns are
    /// reproducible in tests and audits.
    pub async fn estimate(
        &self,
        pickup: GeoPoint,
        dropoff: GeoPoint,
        vehicle_type: VehicleType,
        at: DateTime<Utc>,
        _rider_id: Option<&str>,
    ) -> Result<FareEstimate, AppError> {
        crate::utils::geo::validate_coordinates(pickup.latitude, pickup.longitude)?;
        crate::utils::geo::validate_coordinates(dropoff.latitude, dropoff.longitude)?;

        // Route first; no lock is held across this call
        let route = self.routes.route(pickup, dropoff, &RouteOptions::default()).await;

        // 1. Base + distance + long-ride time component
        let base_fare = self.config.base_fare;
        let distance_fare = route.distance_km * self.config.per_km(vehicle_type);
        let overtime = (route.duration_secs - self.config.long_ride_threshold_secs).max(0.0);
        let time_fare = overtime * self.config.long_ride_per_sec;
        let mut fare = base_fare + distance_fare + time_fare;

        // 2. Surge: first matching live area wins, areas never stack
        let surge_info = self.active_surge(&pickup, at).await;
        let surge_multiplier = surge_info.as_ref().map_or(1.0, |s| s.multiplier);
        fare *= surge_multiplier;

        // 3. Demand/supply ratio in the pickup neighborhood
        let demand_multiplier = self.demand_multiplier(pickup).await;
        fare *= demand_multiplier;

        // 4. Weather and time-of-day
        let weather_multiplier = match self.weather.current(at, &pickup).await {
            Ok(condition) => condition.multiplier(),
            Err(err) => {
                tracing::warn!("Weather lookup failed, using neutral multiplier: {}", err);
                1.0
            }
        };
        fare *= weather_multiplier;
        let time_of_day_multiplier = Self::time_of_day_multiplier(at);
        fare *= time_of_day_multiplier;

        // 5. Promotions: serialized check-and-increment per offer
        let (discount, applied_promotions) =
            self.apply_promotions(at, route.distance_km, vehicle_type, fare).await;
        fare -= discount;

        // 6. Fare never drops below the flat base fare
        let total = fare.max(base_fare);

        Ok(FareEstimate {
            fare: total,
            distance_km: route.distance_km,
            duration_secs: route.duration_secs,
            breakdown: FareBreakdown {
                base_fare,
                distance_fare,
                time_fare,
                surge_multiplier,
                demand_multiplier,
                weather_multiplier,
                time_of_day_multiplier,
                discount,
                total,
                currency: self.config.currency.clone(),
            },
            applied_promotions,
            surge_info,
        })
    }

    async fn active_surge(&self, pickup: &GeoPoint, at: DateTime<Utc>) -> Option<SurgeInfo> {
        let areas = self.surge_areas.read().await;
        areas
            .iter()
            .find(|area| area.is_live(at) && area.contains(pickup))
            .map(|area| SurgeInfo {
                name: area.name.clone(),
                multiplier: area.multiplier,
                expires_at: area.expires_at,
            })
    }

    async fn demand_multiplier(&self, pickup: GeoPoint) -> f64 {
        let radius = self.config.demand_radius_km;
        let window = Duration::minutes(self.config.demand_window_mins);
        let requests = self.rides.count_recent_requests(pickup, radius, window).await;
        let supply = self.drivers.count_available_near(pickup, radius).await;

        if supply == 0 {
            // No drivers around: treat any demand as the top band
            return if requests > 0 { 1.5 } else { 1.0 };
        }
        Self::band_for_ratio(requests as f64 / supply as f64)
    }

    fn band_for_ratio(ratio: f64) -> f64 {
        if ratio > 2.0 {
            1.5
        } else if ratio > 1.5 {
            1.3
        } else if ratio > 1.0 {
            1.2
        } else if ratio > 0.5 {
            1.1
        } else {
            1.0
        }
    }

    fn time_of_day_multiplier(at: DateTime<Utc>) -> f64 {
        let hour = at.hour();
        let weekday = at.weekday();
        let late_night = hour >= 22 || hour < 5;
        let weekend = matches!(weekday, Weekday::Sat | Weekday::Sun);
        let rush_hour = !weekend && ((7..=9).contains(&hour) || (16..=19).contains(&hour));

        if weekend && late_night {
            1.5
        } else if rush_hour {
            1.3
        } else if late_night {
            1.2
        } else {
            1.0
        }
    }

    /// Apply every currently-applicable offer under the write lock so
    /// check-and-increment is atomic per offer. Offers are walked in id
    /// order to keep breakdowns reproducible.
    async fn apply_promotions(
        &self,
        at: DateTime<Utc>,
        distance_km: f64,
        vehicle_type: VehicleType,
        fare: f64,
    ) -> (f64, Vec<String>) {
        let mut promotions = self.promotions.write().await;
        let mut ids: Vec<String> = promotions.keys().cloned().collect();
        ids.sort();

        let mut total_discount = 0.0;
        let mut applied = Vec::new();
        let mut remaining = fare;

        for id in ids {
            let offer = match promotions.get_mut(&id) {
                Some(offer) => offer,
                None => continue,
            };
            if !offer.is_applicable(at, distance_km, vehicle_type) {
                continue;
            }
            let amount = offer.discount_amount(remaining);
            if amount <= 0.0 {
                continue;
            }
            offer.usage_count += 1;
            remaining -= amount;
            total_discount += amount;
            applied.push(offer.name.clone());
        }
        (total_discount, applied)
    }

    // ------------------------------------------------------------------
    // Surge area and promotion administration
    // ------------------------------------------------------------------

    pub async fn register_surge_area(&self, request: RegisterSurgeAreaRequest) -> Result<SurgeArea, AppError> {
        if request.multiplier < 1.0 {
            return Err(AppError::validation_error("multiplier", "must be at least 1.0"));
        }
        if request.radius_km <= 0.0 {
            return Err(AppError::validation_error("radius_km", "must be positive"));
        }
        crate::utils::geo::validate_coordinates(request.center.latitude, request.center.longitude)?;

        let area = SurgeArea {
            id: IdGenerator::generate(IdType::SurgeArea),
            name: request.name,
            center: request.center,
            radius_km: request.radius_km,
            multiplier: request.multiplier,
            expires_at: request.expires_at,
        };

        let mut areas = self.surge_areas.write().await;
        // Expired areas are swept opportunistically on registration
        let now = Utc::now();
        areas.retain(|a| a.is_live(now));
        areas.push(area.clone());

        tracing::info!("Surge area registered: {} x{}", area.name, area.multiplier);
        Ok(area)
    }

    pub async fn list_surge_areas(&self) -> Vec<SurgeArea> {
        let now = Utc::now();
        self.surge_areas
            .read()
            .await
            .iter()
            .filter(|a| a.is_live(now))
            .cloned()
            .collect()
    }

    pub async fn register_promotion(&self, request: RegisterPromoRequest) -> Result<PromoOffer, AppError> {
        if request.valid_until <= request.valid_from {
            return Err(AppError::validation_error("valid_until", "must be after valid_from"));
        }

        let offer = PromoOffer {
            id: IdGenerator::generate(IdType::Promotion),
            name: request.name,
            discount: request.discount,
            min_distance_km: request.min_distance_km,
            vehicle_types: request.vehicle_types,
            valid_from: request.valid_from,
            valid_until: request.valid_until,
            usage_count: 0,
            usage_limit: request.usage_limit,
        };

        self.promotions.write().await.insert(offer.id.clone(), offer.clone());
        tracing::info!("Promotion registered: {}", offer.name);
        Ok(offer)
    }

    pub async fn list_promotions(&self) -> Vec<PromoOffer> {
        let mut offers: Vec<PromoOffer> = self.promotions.read().await.values().cloned().collect();
        offers.sort_by(|a, b| a.id.cmp(&b.id));
        offers
    }
}
