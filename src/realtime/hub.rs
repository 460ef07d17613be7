// src/realtime/hub.rs
//
// Fan-out point for server events. Each participant may hold several open
// connections (phone plus web, reconnect races); an event addressed to a
// participant goes to every connection that is still alive. Delivery is
// best effort and at most once: a connection whose channel has closed is
// pruned on the next send, never retried.
use std::collections::HashMap;
use tokio::sync::{mpsc, RwLock};
use tracing;
use uuid::Uuid;

use crate::models::events::ServerEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Participant {
    Rider,
    Driver,
}

#[derive(Debug, Clone)]
pub struct Connection {
    pub id: String,
    sender: mpsc::UnboundedSender<ServerEvent>,
}

#[derive(Default)]
pub struct EventHub {
    riders: RwLock<HashMap<String, Vec<Connection>>>,
    drivers: RwLock<HashMap<String, Vec<Connection>>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection for a participant. Returns the connection id
    /// and the receiving half the session task drains.
    pub async fn connect(
        &self,
        participant: Participant,
        participant_id: &str,
    ) -> (String, mpsc::UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connection = Connection {
            id: Uuid::new_v4().to_string(),
            sender: tx,
        };
        let connection_id = connection.id.clone();

        let mut map = self.map_for(participant).write().await;
        map.entry(participant_id.to_string()).or_default().push(connection);
        tracing::debug!(
            "Connection {} opened for {:?} {}",
            connection_id,
            participant,
            participant_id
        );
        (connection_id, rx)
    }

    pub async fn disconnect(&self, participant: Participant, participant_id: &str, connection_id: &str) {
        let mut map = self.map_for(participant).write().await;
        if let Some(connections) = map.get_mut(participant_id) {
            connections.retain(|c| c.id != connection_id);
            if connections.is_empty() {
                map.remove(participant_id);
            }
        }
        tracing::debug!(
            "Connection {} closed for {:?} {}",
            connection_id,
            participant,
            participant_id
        );
    }

    /// Best-effort send to every live connection of one participant.
    /// Returns the number of connections the event reached.
    pub async fn send(&self, participant: Participant, participant_id: &str, event: ServerEvent) -> usize {
        let mut map = self.map_for(participant).write().await;
        let Some(connections) = map.get_mut(participant_id) else {
            tracing::debug!(
                "Dropping {} for {:?} {}: no live connections",
                event.name(),
                participant,
                participant_id
            );
            return 0;
        };

        let mut delivered = 0;
        connections.retain(|connection| match connection.sender.send(event.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(_) => false,
        });
        if connections.is_empty() {
            map.remove(participant_id);
        }
        delivered
    }

    pub async fn send_to_rider(&self, rider_id: &str, event: ServerEvent) -> usize {
        self.send(Participant::Rider, rider_id, event).await
    }

    pub async fn send_to_driver(&self, driver_id: &str, event: ServerEvent) -> usize {
        self.send(Participant::Driver, driver_id, event).await
    }

    pub async fn is_connected(&self, participant: Participant, participant_id: &str) -> bool {
        self.map_for(participant)
            .read()
            .await
            .get(participant_id)
            .map_or(false, |c| !c.is_empty())
    }

    pub async fn connection_count(&self, participant: Participant) -> usize {
        self.map_for(participant)
            .read()
            .await
            .values()
            .map(|c| c.len())
            .sum()
    }

    fn map_for(&self, participant: Participant) -> &RwLock<HashMap<String, Vec<Connection>>> {
        match participant {
            Participant::Rider => &self.riders,
            Participant::Driver => &self.drivers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arrived(ride_id: &str) -> ServerEvent {
        ServerEvent::DriverArrived {
            ride_id: ride_id.to_string(),
        }
    }

    #[tokio::test]
    async fn event_reaches_every_connection_of_a_participant() {
        let hub = EventHub::new();
        let (_, mut rx_a) = hub.connect(Participant::Rider, "usr-1").await;
        let (_, mut rx_b) = hub.connect(Participant::Rider, "usr-1").await;

        let delivered = hub.send_to_rider("usr-1", arrived("rid-1")).await;
        assert_eq!(delivered, 2);
        assert_eq!(rx_a.recv().await.unwrap(), arrived("rid-1"));
        assert_eq!(rx_b.recv().await.unwrap(), arrived("rid-1"));
    }

    #[tokio::test]
    async fn send_to_absent_participant_is_a_noop() {
        let hub = EventHub::new();
        assert_eq!(hub.send_to_driver("drv-ghost", arrived("rid-1")).await, 0);
    }

    #[tokio::test]
    async fn closed_connections_are_pruned_on_send() {
        let hub = EventHub::new();
        let (_, rx_dead) = hub.connect(Participant::Driver, "drv-1").await;
        let (_, mut rx_live) = hub.connect(Participant::Driver, "drv-1").await;
        drop(rx_dead);

        let delivered = hub.send_to_driver("drv-1", arrived("rid-1")).await;
        assert_eq!(delivered, 1);
        assert!(rx_live.recv().await.is_some());
        assert_eq!(hub.connection_count(Participant::Driver).await, 1);
    }

    #[tokio::test]
    async fn disconnect_removes_only_the_named_connection() {
        let hub = EventHub::new();
        let (id_a, _rx_a) = hub.connect(Participant::Rider, "usr-1").await;
        let (_, mut rx_b) = hub.connect(Participant::Rider, "usr-1").await;

        hub.disconnect(Participant::Rider, "usr-1", &id_a).await;
        assert!(hub.is_connected(Participant::Rider, "usr-1").await);

        hub.send_to_rider("usr-1", arrived("rid-9")).await;
        assert!(rx_b.recv().await.is_some());
    }

    #[tokio::test]
    async fn rider_and_driver_namespaces_are_separate() {
        let hub = EventHub::new();
        let (_, mut rider_rx) = hub.connect(Participant::Rider, "p-1").await;
        let (_, mut driver_rx) = hub.connect(Participant::Driver, "p-1").await;

        hub.send_to_driver("p-1", arrived("rid-1")).await;
        assert!(driver_rx.recv().await.is_some());
        assert!(rider_rx.try_recv().is_err());
    }
}
