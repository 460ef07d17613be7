// src/state.rs
use std::sync::Arc;
use std::time::Duration;

use crate::realtime::hub::EventHub;
use crate::services::dispatch_service::{DispatchConfig, DispatchService};
use crate::services::driver_index::DriverIndex;
use crate::services::pricing_service::{PricingConfig, PricingService, SimulatedWeather};
use crate::services::ride_service::RideService;
use crate::services::route_service::{
    OsrmProvider, RouteProvider, RouteService, ValhallaProvider,
};

pub struct AppState {
    pub rides: Arc<RideService>,
    pub drivers: Arc<DriverIndex>,
    pub pricing: Arc<PricingService>,
    pub routes: Arc<RouteService>,
    pub dispatch: Arc<DispatchService>,
    pub hub: Arc<EventHub>,
    pub config: AppConfig,
}

#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub osrm_url: Option<String>,
    pub valhalla_url: Option<String>,
    pub provider_timeout_ms: u64,
    pub location_freshness_secs: i64,
    // When set, socket sessions must present it at upgrade
    pub ws_auth_token: Option<String>,
    pub pricing: PricingConfig,
}

fn env_parsed<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = PricingConfig::default();
        let pricing = PricingConfig {
            base_fare: env_parsed("BASE_FARE", defaults.base_fare),
            per_km_regular: env_parsed("PER_KM_REGULAR", defaults.per_km_regular),
            per_km_premium: env_parsed("PER_KM_PREMIUM", defaults.per_km_premium),
            per_km_suv: env_parsed("PER_KM_SUV", defaults.per_km_suv),
            per_km_moto: env_parsed("PER_KM_MOTO", defaults.per_km_moto),
            demand_radius_km: env_parsed("DEMAND_RADIUS_KM", defaults.demand_radius_km),
            demand_window_mins: env_parsed("DEMAND_WINDOW_MINS", defaults.demand_window_mins),
            currency: std::env::var("CURRENCY").unwrap_or(defaults.currency),
            ..defaults
        };
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            osrm_url: std::env::var("OSRM_URL").ok(),
            valhalla_url: std::env::var("VALHALLA_URL").ok(),
            provider_timeout_ms: env_parsed("PROVIDER_TIMEOUT_MS", 2000),
            location_freshness_secs: env_parsed("LOCATION_FRESHNESS_SECS", 300),
            ws_auth_token: std::env::var("WS_AUTH_TOKEN").ok(),
            pricing,
        }
    }
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let provider_timeout = Duration::from_millis(config.provider_timeout_ms);

        let mut providers: Vec<Arc<dyn RouteProvider>> = Vec::new();
        if let Some(url) = &config.osrm_url {
            providers.push(Arc::new(OsrmProvider::new(url.clone(), provider_timeout)));
        }
        if let Some(url) = &config.valhalla_url {
            providers.push(Arc::new(ValhallaProvider::new(url.clone(), provider_timeout)));
        }
        if providers.is_empty() {
            tracing::warn!("No route providers configured, estimates use the fallback only");
        }

        let drivers = Arc::new(DriverIndex::new(config.location_freshness_secs));
        let rides = Arc::new(RideService::new(drivers.clone()));
        let routes = Arc::new(RouteService::new(providers, provider_timeout));
        let pricing = Arc::new(PricingService::new(
            config.pricing.clone(),
            routes.clone(),
            drivers.clone(),
            rides.clone(),
            Arc::new(SimulatedWeather),
        ));
        let hub = Arc::new(EventHub::new());
        let dispatch = Arc::new(DispatchService::new(
            DispatchConfig::default(),
            rides.clone(),
            drivers.clone(),
            pricing.clone(),
            hub.clone(),
        ));

        Self {
            rides,
            drivers,
            pricing,
            routes,
            dispatch,
            hub,
            config,
        }
    }
}
