// src/realtime/session.rs
//
// One task per socket. The socket is split: a writer task drains the hub
// channel for this connection, while the read loop parses client events
// and hands them to the coordinator. A malformed frame earns an `error`
// event, never a disconnect; the session ends when the peer closes or the
// writer's channel does.
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tracing;

use crate::{
    errors::DispatchError as AppError,
    models::driver::{DriverLocationUpdate, DriverStatusUpdate},
    models::events::{ClientEvent, ServerEvent},
    models::ride::{RideActor, RideRequest},
    realtime::hub::Participant,
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    pub role: SessionRole,
    pub id: String,
    pub token: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionRole {
    Rider,
    Driver,
}

impl SessionRole {
    fn participant(self) -> Participant {
        match self {
            SessionRole::Rider => Participant::Rider,
            SessionRole::Driver => Participant::Driver,
        }
    }
}

/// GET /ws?role=rider|driver&id=...&token=...
///
/// Authentication happens once, before the upgrade completes: the shared
/// token (when configured) must match and the participant must already be
/// registered. Token issuance belongs to the account service.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<SessionQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    if let Some(expected) = &state.config.ws_auth_token {
        if query.token.as_deref() != Some(expected.as_str()) {
            return Err(AppError::Unauthorized("invalid session token".to_string()));
        }
    }
    let known = match query.role {
        SessionRole::Rider => state.rides.rider_exists(&query.id).await,
        SessionRole::Driver => state.drivers.exists(&query.id).await,
    };
    if !known {
        return Err(AppError::not_found(format!("participant {}", query.id)));
    }
    Ok(ws.on_upgrade(move |socket| run_session(socket, state, query.role, query.id)))
}

async fn run_session(socket: WebSocket, state: Arc<AppState>, role: SessionRole, id: String) {
    let participant = role.participant();
    let (connection_id, mut events) = state.hub.connect(participant, &id).await;
    let (mut sink, mut stream) = socket.split();

    let writer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let frame = match serde_json::to_string(&event) {
                Ok(frame) => frame,
                Err(err) => {
                    tracing::error!("Failed to serialize {}: {}", event.name(), err);
                    continue;
                }
            };
            if sink.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = stream.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(err) => {
                tracing::debug!("Socket error on connection {}: {}", connection_id, err);
                break;
            }
        };
        match frame {
            Message::Text(text) => {
                let event: ClientEvent = match serde_json::from_str(&text) {
                    Ok(event) => event,
                    Err(err) => {
                        state
                            .hub
                            .send(
                                participant,
                                &id,
                                ServerEvent::Error {
                                    message: format!("malformed event: {}", err),
                                },
                            )
                            .await;
                        continue;
                    }
                };
                if let Err(err) = handle_client_event(&state, role, &id, event).await {
                    state
                        .hub
                        .send(participant, &id, ServerEvent::Error { message: err.to_string() })
                        .await;
                }
            }
            Message::Close(_) => break,
            // Pings are answered by axum; binary frames are not part of the protocol
            _ => {}
        }
    }

    state.hub.disconnect(participant, &id, &connection_id).await;
    writer.abort();
}

async fn handle_client_event(
    state: &Arc<AppState>,
    role: SessionRole,
    id: &str,
    event: ClientEvent,
) -> Result<(), AppError> {
    match (role, event) {
        (SessionRole::Driver, ClientEvent::LocationUpdate { latitude, longitude, heading, speed, accuracy }) => {
            state
                .dispatch
                .update_driver_location(DriverLocationUpdate {
                    driver_id: id.to_string(),
                    latitude,
                    longitude,
                    heading,
                    speed,
                    accuracy,
                })
                .await
        }
        (SessionRole::Driver, ClientEvent::StatusUpdate { status }) => {
            state
                .drivers
                .set_status(DriverStatusUpdate {
                    driver_id: id.to_string(),
                    status,
                })
                .await
                .map(|_| ())
        }
        (SessionRole::Driver, ClientEvent::AcceptRide { ride_id }) => {
            state.dispatch.accept_ride(&ride_id, id).await.map(|_| ())
        }
        (SessionRole::Driver, ClientEvent::DriverArrived { ride_id }) => {
            state.dispatch.driver_arrived(&ride_id, id).await.map(|_| ())
        }
        (SessionRole::Driver, ClientEvent::StartRide { ride_id }) => {
            state.dispatch.start_ride(&ride_id, id).await.map(|_| ())
        }
        (SessionRole::Driver, ClientEvent::CompleteRide { ride_id, final_fare, actual_distance_km }) => {
            state
                .dispatch
                .complete_ride(&ride_id, id, final_fare, actual_distance_km)
                .await
                .map(|_| ())
        }
        (SessionRole::Rider, ClientEvent::RequestRide { pickup, dropoff, vehicle_type, notes }) => {
            state
                .dispatch
                .request_ride(RideRequest {
                    rider_id: id.to_string(),
                    pickup,
                    dropoff,
                    vehicle_type,
                    notes,
                })
                .await
                .map(|_| ())
        }
        (role, ClientEvent::CancelRide { ride_id, reason }) => {
            let actor = match role {
                SessionRole::Rider => RideActor::Rider(id.to_string()),
                SessionRole::Driver => RideActor::Driver(id.to_string()),
            };
            state.dispatch.cancel_ride(&ride_id, &actor, reason).await.map(|_| ())
        }
        (role, ClientEvent::RateRide { ride_id, rating, review }) => {
            let actor = match role {
                SessionRole::Rider => RideActor::Rider(id.to_string()),
                SessionRole::Driver => RideActor::Driver(id.to_string()),
            };
            state
                .dispatch
                .rate_ride(&ride_id, &actor, rating, review)
                .await
                .map(|_| ())
        }
        (SessionRole::Rider, _) => Err(AppError::forbidden("event requires a driver session")),
        (SessionRole::Driver, _) => Err(AppError::forbidden("event requires a rider session")),
    }
}
