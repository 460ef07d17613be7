// src/services/route_service.rs
//
// Route planning across interchangeable providers. Providers are tried in
// a fixed priority order with a bounded timeout each; when every provider
// fails the straight-line haversine estimate takes over, so routing as a
// whole never fails. No entity lock is ever held across a provider call.
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing;

use crate::{
    errors::DispatchError as AppError,
    models::ride::GeoPoint,
    models::route::{OptimalPickup, OptimizedRoute, Route, RouteOptions},
    utils::geo,
};

/// Assumed average speed for straight-line duration estimates, km/h.
pub const FALLBACK_SPEED_KMH: f64 = 30.0;

/// Hard cap on multi-stop optimization input.
pub const DEFAULT_MAX_STOPS: usize = 10;

/// Above this count the permutation search gives way to nearest-neighbor.
const EXHAUSTIVE_STOP_LIMIT: usize = 8;

/// Ring of candidate pickup points around the rider, ~200 m out.
const PICKUP_RING_RADIUS_KM: f64 = 0.2;
const PICKUP_RING_POINTS: usize = 8;

#[async_trait]
pub trait RouteProvider: Send + Sync {
    fn name(&self) -> &'static str;
    async fn route(
        &self,
        origin: GeoPoint,
        destination: GeoPoint,
        options: &RouteOptions,
    ) -> Result<Route, AppError>;
}

// ---------------------------------------------------------------------------
// OSRM provider (primary)
// ---------------------------------------------------------------------------

pub struct OsrmProvider {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct OsrmResponse {
    code: String,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    distance: f64, // meters
    duration: f64, // seconds
    geometry: Option<String>,
    #[serde(default)]
    legs: Vec<OsrmLeg>,
}

#[derive(Debug, Deserialize)]
struct OsrmLeg {
    #[serde(default)]
    steps: Vec<OsrmStep>,
}

#[derive(Debug, Deserialize)]
struct OsrmStep {
    #[serde(default)]
    name: String,
    maneuver: OsrmManeuver,
}

#[derive(Debug, Deserialize)]
struct OsrmManeuver {
    #[serde(rename = "type")]
    kind: String,
}

impl OsrmProvider {
    pub fn new(endpoint: String, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            endpoint,
        }
    }
}

#[async_trait]
impl RouteProvider for OsrmProvider {
    fn name(&self) -> &'static str {
        "osrm"
    }

    async fn route(
        &self,
        origin: GeoPoint,
        destination: GeoPoint,
        options: &RouteOptions,
    ) -> Result<Route, AppError> {
        let url = format!(
            "{}/route/v1/driving/{},{};{},{}?overview=full&steps={}",
            self.endpoint,
            origin.longitude,
            origin.latitude,
            destination.longitude,
            destination.latitude,
            options.include_instructions,
        );

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(AppError::ProviderFailed {
                provider: "osrm".to_string(),
                reason: format!("status {}", response.status()),
            });
        }

        let body: OsrmResponse = response.json().await?;
        if body.code != "Ok" {
            return Err(AppError::ProviderFailed {
                provider: "osrm".to_string(),
                reason: body.code,
            });
        }
        let route = body.routes.into_iter().next().ok_or(AppError::ProviderFailed {
            provider: "osrm".to_string(),
            reason: "empty route set".to_string(),
        })?;

        let instructions = route
            .legs
            .iter()
            .flat_map(|leg| leg.steps.iter())
            .map(|step| {
                if step.name.is_empty() {
                    step.maneuver.kind.clone()
                } else {
                    format!("{} onto {}", step.maneuver.kind, step.name)
                }
            })
            .collect();

        Ok(Route {
            distance_km: route.distance / 1000.0,
            duration_secs: route.duration,
            polyline: route.geometry,
            instructions,
            source: "osrm".to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Valhalla provider (secondary)
// ---------------------------------------------------------------------------

pub struct ValhallaProvider {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct ValhallaResponse {
    trip: ValhallaTrip,
}

#[derive(Debug, Deserialize)]
struct ValhallaTrip {
    legs: Vec<ValhallaLeg>,
    summary: ValhallaSummary,
}

#[derive(Debug, Deserialize)]
struct ValhallaSummary {
    length: f64, // kilometers
    time: f64,   // seconds
}

#[derive(Debug, Deserialize)]
struct ValhallaLeg {
    shape: Option<String>,
    #[serde(default)]
    maneuvers: Vec<ValhallaManeuver>,
}

#[derive(Debug, Deserialize)]
struct ValhallaManeuver {
    #[serde(default)]
    instruction: String,
}

impl ValhallaProvider {
    pub fn new(endpoint: String, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            endpoint,
        }
    }
}

#[async_trait]
impl RouteProvider for ValhallaProvider {
    fn name(&self) -> &'static str {
        "valhalla"
    }

    async fn route(
        &self,
        origin: GeoPoint,
        destination: GeoPoint,
        _options: &RouteOptions,
    ) -> Result<Route, AppError> {
        let body = serde_json::json!({
            "locations": [
                { "lat": origin.latitude, "lon": origin.longitude },
                { "lat": destination.latitude, "lon": destination.longitude },
            ],
            "costing": "auto",
            "units": "kilometers",
        });

        let response = self
            .client
            .post(format!("{}/route", self.endpoint))
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(AppError::ProviderFailed {
                provider: "valhalla".to_string(),
                reason: format!("status {}", response.status()),
            });
        }

        let parsed: ValhallaResponse = response.json().await?;
        let polyline = parsed.trip.legs.first().and_then(|leg| leg.shape.clone());
        let instructions = parsed
            .trip
            .legs
            .iter()
            .flat_map(|leg| leg.maneuvers.iter())
            .map(|m| m.instruction.clone())
            .filter(|i| !i.is_empty())
            .collect();

        Ok(Route {
            distance_km: parsed.trip.summary.length,
            duration_secs: parsed.trip.summary.time,
            polyline,
            instructions,
            source: "valhalla".to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Route service
// ---------------------------------------------------------------------------

pub struct RouteService {
    // Priority order: first entry is tried first
    providers: Vec<Arc<dyn RouteProvider>>,
    provider_timeout: Duration,
    fallback_speed_kmh: f64,
    max_stops: usize,
}

impl RouteService {
    pub fn new(providers: Vec<Arc<dyn RouteProvider>>, provider_timeout: Duration) -> Self {
        Self {
            providers,
            provider_timeout,
            fallback_speed_kmh: FALLBACK_SPEED_KMH,
            max_stops: DEFAULT_MAX_STOPS,
        }
    }

    pub fn with_max_stops(mut self, max_stops: usize) -> Self {
        self.max_stops = max_stops;
        self
    }

    /// Try every provider in order, then fall back to the straight-line
    /// estimate. This method always succeeds.
    pub async fn route(&self, origin: GeoPoint, destination: GeoPoint, options: &RouteOptions) -> Route {
        for provider in &self.providers {
            match tokio::time::timeout(
                self.provider_timeout,
                provider.route(origin, destination, options),
            )
            .await
            {
                Ok(Ok(route)) => {
                    tracing::debug!("Route from provider {}", provider.name());
                    return route;
                }
                Ok(Err(err)) => {
                    tracing::warn!("Provider {} failed: {}", provider.name(), err);
                }
                Err(_) => {
                    tracing::warn!("Provider {} timed out", provider.name());
                }
            }
        }
        self.fallback_route(origin, destination)
    }

    /// Straight-line haversine estimate at an assumed average speed.
    fn fallback_route(&self, origin: GeoPoint, destination: GeoPoint) -> Route {
        let distance_km = geo::haversine_km(
            origin.latitude,
            origin.longitude,
            destination.latitude,
            destination.longitude,
        );
        Route {
            distance_km,
            duration_secs: distance_km / self.fallback_speed_kmh * 3600.0,
            polyline: None,
            instructions: Vec::new(),
            source: "haversine".to_string(),
        }
    }

    /// Multi-stop ordering: exhaustive permutation search up to
    /// EXHAUSTIVE_STOP_LIMIT stops, nearest-neighbor greedy beyond.
    pub fn optimize_multi_stop(
        &self,
        origin: GeoPoint,
        stops: &[GeoPoint],
        return_to_origin: bool,
        max_stops: Option<usize>,
    ) -> Result<OptimizedRoute, AppError> {
        if stops.is_empty() {
            return Err(AppError::validation_error("stops", "at least one stop is required"));
        }
        let max = max_stops.unwrap_or(self.max_stops);
        if stops.len() > max {
            return Err(AppError::TooManyStops {
                given: stops.len(),
                max,
            });
        }

        let (order, strategy) = if stops.len() <= EXHAUSTIVE_STOP_LIMIT {
            (Self::best_permutation(origin, stops, return_to_origin), "exhaustive")
        } else {
            (Self::nearest_neighbor(origin, stops), "nearest_neighbor")
        };

        let ordered: Vec<GeoPoint> = order.iter().map(|&i| stops[i]).collect();
        let total_distance_km = Self::tour_distance(origin, &ordered, return_to_origin);
        Ok(OptimizedRoute {
            order,
            stops: ordered,
            total_distance_km,
            total_duration_secs: total_distance_km / self.fallback_speed_kmh * 3600.0,
            return_to_origin,
            strategy: strategy.to_string(),
        })
    }

    fn tour_distance(origin: GeoPoint, ordered: &[GeoPoint], return_to_origin: bool) -> f64 {
        let mut total = 0.0;
        let mut prev = origin;
        for stop in ordered {
            total += geo::haversine_km(prev.latitude, prev.longitude, stop.latitude, stop.longitude);
            prev = *stop;
        }
        if return_to_origin {
            total += geo::haversine_km(prev.latitude, prev.longitude, origin.latitude, origin.longitude);
        }
        total
    }

    fn best_permutation(origin: GeoPoint, stops: &[GeoPoint], return_to_origin: bool) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..stops.len()).collect();
        let mut best = indices.clone();
        let mut best_distance = f64::INFINITY;

        Self::permute(&mut indices, 0, &mut |candidate| {
            let ordered: Vec<GeoPoint> = candidate.iter().map(|&i| stops[i]).collect();
            let distance = Self::tour_distance(origin, &ordered, return_to_origin);
            if distance < best_distance {
                best_distance = distance;
                best = candidate.to_vec();
            }
        });
        best
    }

    fn permute(indices: &mut Vec<usize>, k: usize, visit: &mut impl FnMut(&[usize])) {
        if k == indices.len() {
            visit(indices);
            return;
        }
        for i in k..indices.len() {
            indices.swap(k, i);
            Self::permute(indices, k + 1, visit);
            indices.swap(k, i);
        }
    }

    fn nearest_neighbor(origin: GeoPoint, stops: &[GeoPoint]) -> Vec<usize> {
        let mut remaining: Vec<usize> = (0..stops.len()).collect();
        let mut order = Vec::with_capacity(stops.len());
        let mut current = origin;

        while !remaining.is_empty() {
            let (pos, &idx) = remaining
                .iter()
                .enumerate()
                .min_by(|(_, &a), (_, &b)| {
                    let da = geo::haversine_km(
                        current.latitude,
                        current.longitude,
                        stops[a].latitude,
                        stops[a].longitude,
                    );
                    let db = geo::haversine_km(
                        current.latitude,
                        current.longitude,
                        stops[b].latitude,
                        stops[b].longitude,
                    );
                    da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
                })
                .map(|(pos, idx)| (pos, idx))
                .unwrap_or((0, &remaining[0]));
            current = stops[idx];
            order.push(idx);
            remaining.remove(pos);
        }
        order
    }

    /// Evaluate a ring of candidate pickup points around the rider plus the
    /// rider's own location; pick the one minimizing driver->pickup plus
    /// pickup->destination duration, and report the time saved versus a
    /// direct pickup.
    pub async fn find_optimal_pickup(
        &self,
        driver_location: GeoPoint,
        rider_location: GeoPoint,
        destination: GeoPoint,
    ) -> OptimalPickup {
        let mut candidates = vec![rider_location];
        for i in 0..PICKUP_RING_POINTS {
            let bearing = 360.0 / PICKUP_RING_POINTS as f64 * i as f64;
            let (lat, lon) = geo::destination_point(
                rider_location.latitude,
                rider_location.longitude,
                bearing,
                PICKUP_RING_RADIUS_KM,
            );
            candidates.push(GeoPoint { latitude: lat, longitude: lon });
        }

        let options = RouteOptions::default();
        let mut best_index = 0;
        let mut best_duration = f64::INFINITY;
        let mut direct_duration = f64::INFINITY;

        for (i, candidate) in candidates.iter().enumerate() {
            let leg_in = self.route(driver_location, *candidate, &options).await;
            let leg_out = self.route(*candidate, destination, &options).await;
            let total = leg_in.duration_secs + leg_out.duration_secs;
            if i == 0 {
                direct_duration = total;
            }
            if total < best_duration {
                best_duration = total;
                best_index = i;
            }
        }

        OptimalPickup {
            pickup: candidates[best_index],
            total_duration_secs: best_duration,
            time_saved_secs: (direct_duration - best_duration).max(0.0),
            is_rider_location: best_index == 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingProvider;

    #[async_trait]
    impl RouteProvider for FailingProvider {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn route(
            &self,
            _origin: GeoPoint,
            _destination: GeoPoint,
            _options: &RouteOptions,
        ) -> Result<Route, AppError> {
            Err(AppError::ProviderFailed {
                provider: "failing".to_string(),
                reason: "always fails".to_string(),
            })
        }
    }

    struct FixedProvider {
        distance_km: f64,
    }

    #[async_trait]
    impl RouteProvider for FixedProvider {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn route(
            &self,
            _origin: GeoPoint,
            _destination: GeoPoint,
            _options: &RouteOptions,
        ) -> Result<Route, AppError> {
            Ok(Route {
                distance_km: self.distance_km,
                duration_secs: 600.0,
                polyline: Some("abc".to_string()),
                instructions: vec![],
                source: "fixed".to_string(),
            })
        }
    }

    fn p(lat: f64, lon: f64) -> GeoPoint {
        GeoPoint { latitude: lat, longitude: lon }
    }

    #[tokio::test]
    async fn falls_back_when_every_provider_fails() {
        let service = RouteService::new(
            vec![Arc::new(FailingProvider), Arc::new(FailingProvider)],
            Duration::from_millis(100),
        );
        let route = service
            .route(p(40.7128, -74.0060), p(40.7589, -73.9851), &RouteOptions::default())
            .await;
        assert_eq!(route.source, "haversine");
        assert!(route.distance_km > 0.0);
        // 30 km/h assumed speed
        let expected = route.distance_km / 30.0 * 3600.0;
        assert!((route.duration_secs - expected).abs() < 1e-6);
    }

    #[tokio::test]
    async fn first_successful_provider_wins() {
        let service = RouteService::new(
            vec![
                Arc::new(FailingProvider),
                Arc::new(FixedProvider { distance_km: 7.0 }),
            ],
            Duration::from_millis(100),
        );
        let route = service
            .route(p(40.7128, -74.0060), p(40.7589, -73.9851), &RouteOptions::default())
            .await;
        assert_eq!(route.source, "fixed");
        assert!((route.distance_km - 7.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn slow_provider_times_out_to_fallback() {
        struct SlowProvider;

        #[async_trait]
        impl RouteProvider for SlowProvider {
            fn name(&self) -> &'static str {
                "slow"
            }

            async fn route(
                &self,
                _origin: GeoPoint,
                _destination: GeoPoint,
                _options: &RouteOptions,
            ) -> Result<Route, AppError> {
                tokio::time::sleep(Duration::from_secs(30)).await;
                unreachable!("timeout fires first")
            }
        }

        let service = RouteService::new(vec![Arc::new(SlowProvider)], Duration::from_millis(20));
        let route = service
            .route(p(40.7128, -74.0060), p(40.7589, -73.9851), &RouteOptions::default())
            .await;
        assert_eq!(route.source, "haversine");
    }

    #[test]
    fn too_many_stops_is_rejected() {
        let service =
            RouteService::new(vec![], Duration::from_millis(100)).with_max_stops(10);
        let stops: Vec<GeoPoint> = (0..11).map(|i| p(40.0 + i as f64 * 0.01, -74.0)).collect();
        let err = service
            .optimize_multi_stop(p(40.0, -74.0), &stops, false, None)
            .unwrap_err();
        assert!(matches!(err, AppError::TooManyStops { given: 11, max: 10 }));
    }

    #[test]
    fn exhaustive_search_finds_the_obvious_order() {
        let service = RouteService::new(vec![], Duration::from_millis(100));
        let origin = p(40.0, -74.0);
        // Stops given out of order along a straight line heading north
        let stops = vec![p(40.3, -74.0), p(40.1, -74.0), p(40.2, -74.0)];

        let optimized = service.optimize_multi_stop(origin, &stops, false, None).unwrap();
        assert_eq!(optimized.strategy, "exhaustive");
        assert_eq!(optimized.order, vec![1, 2, 0]);

        // Visiting in the given order must never beat the optimized order
        let given_order = RouteService::tour_distance(origin, &stops, false);
        assert!(optimized.total_distance_km <= given_order + 1e-9);
    }

    #[test]
    fn large_stop_sets_use_nearest_neighbor() {
        let service = RouteService::new(vec![], Duration::from_millis(100));
        let origin = p(40.0, -74.0);
        let stops: Vec<GeoPoint> = (0..9).map(|i| p(40.0 + (9 - i) as f64 * 0.01, -74.0)).collect();

        let optimized = service.optimize_multi_stop(origin, &stops, false, None).unwrap();
        assert_eq!(optimized.strategy, "nearest_neighbor");
        // Greedy from the origin walks the line nearest-first
        assert_eq!(optimized.order[0], 8);
        assert_eq!(optimized.stops.len(), 9);
    }

    #[test]
    fn return_to_origin_adds_the_closing_leg() {
        let service = RouteService::new(vec![], Duration::from_millis(100));
        let origin = p(40.0, -74.0);
        let stops = vec![p(40.1, -74.0)];

        let one_way = service.optimize_multi_stop(origin, &stops, false, None).unwrap();
        let round_trip = service.optimize_multi_stop(origin, &stops, true, None).unwrap();
        assert!((round_trip.total_distance_km - one_way.total_distance_km * 2.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn optimal_pickup_never_loses_time() {
        let service = RouteService::new(vec![], Duration::from_millis(100));
        let result = service
            .find_optimal_pickup(p(40.70, -74.00), p(40.7128, -74.0060), p(40.7589, -73.9851))
            .await;
        assert!(result.time_saved_secs >= 0.0);
        assert!(result.total_duration_secs > 0.0);
    }
}
