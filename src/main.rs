use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use heron_dispatch::{
    handlers::{driver_handler, pricing_handler, ride_handler, route_handler},
    realtime::session,
    state::{AppConfig, AppState},
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "heron_dispatch=debug,tower_http=info".into()),
        )
        .init();

    let config = AppConfig::from_env();
    let bind_addr = config.bind_addr.clone();
    let app_state = Arc::new(AppState::new(config));

    let app = Router::new()
        .route("/riders", post(ride_handler::register_rider))
        .route("/riders/:id", get(ride_handler::get_rider))
        .route("/riders/:id/rides", get(ride_handler::rider_rides))
        .route("/rides", post(ride_handler::request_ride))
        .route("/rides/:id", get(ride_handler::get_ride))
        .route("/rides/:id/accept", post(ride_handler::accept_ride))
        .route("/rides/:id/arrived", post(ride_handler::driver_arrived))
        .route("/rides/:id/start", post(ride_handler::start_ride))
        .route("/rides/:id/complete", post(ride_handler::complete_ride))
        .route("/rides/:id/cancel", post(ride_handler::cancel_ride))
        .route("/rides/:id/rate", post(ride_handler::rate_ride))
        .route("/drivers", post(driver_handler::register_driver))
        .route("/drivers/nearby", get(driver_handler::nearby_drivers))
        .route(
            "/drivers/:id",
            get(driver_handler::get_driver).delete(driver_handler::deactivate_driver),
        )
        .route("/drivers/:id/verified", put(driver_handler::set_verified))
        .route("/drivers/:id/status", put(driver_handler::set_status))
        .route("/drivers/:id/location", put(driver_handler::update_location))
        .route("/pricing/estimate", post(pricing_handler::estimate_fare))
        .route(
            "/pricing/surge-areas",
            get(pricing_handler::list_surge_areas).post(pricing_handler::register_surge_area),
        )
        .route(
            "/pricing/promotions",
            get(pricing_handler::list_promotions).post(pricing_handler::register_promotion),
        )
        .route("/routes", post(route_handler::plan_route))
        .route("/routes/optimize", post(route_handler::optimize_stops))
        .route("/routes/optimal-pickup", post(route_handler::optimal_pickup))
        .route("/ws", get(session::websocket_handler))
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    tracing::info!("Dispatch engine listening on {}", bind_addr);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
