use dashmap::DashMap;
use metrics::counter;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use super::{EventPublisher, LifecycleEvent, Room};

pub type ConnectionId = u64;

struct Connection {
    tx: mpsc::Sender<Arc<LifecycleEvent>>,
    rooms: HashSet<Room>,
}

struct HubInner {
    /// Room -> member connections
    rooms: DashMap<Room, HashSet<ConnectionId>>,
    /// Connection -> outbound queue and joined rooms
    connections: DashMap<ConnectionId, Connection>,
    next_id: AtomicU64,
    buffer: usize,
}

/// In-process room registry and fan-out.
///
/// Each connection gets a bounded queue. Publishing never waits: a full queue
/// drops the event for that connection only.
#[derive(Clone)]
pub struct RealtimeHub {
    inner: Arc<HubInner>,
}

impl RealtimeHub {
    pub fn new(buffer: usize) -> Self {
        Self {
            inner: Arc::new(HubInner {
                rooms: DashMap::new(),
                connections: DashMap::new(),
                next_id: AtomicU64::new(1),
                buffer: buffer.max(1),
            }),
        }
    }

    /// Registers a connection that has not joined any room yet.
    pub fn connect(&self) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.inner.buffer);
        self.inner.connections.insert(
            id,
            Connection {
                tx,
                rooms: HashSet::new(),
            },
        );
        debug!(connection_id = id, "Realtime connection opened");
        Subscription {
            id,
            hub: self.inner.clone(),
            rx,
        }
    }

    /// Registers a connection and joins it to `rooms`.
    pub fn subscribe(&self, rooms: impl IntoIterator<Item = Room>) -> Subscription {
        let subscription = self.connect();
        for room in rooms {
            subscription.join(room);
        }
        subscription
    }

    pub fn connection_count(&self) -> usize {
        self.inner.connections.len()
    }

    pub fn room_size(&self, room: &Room) -> usize {
        self.inner.rooms.get(room).map(|m| m.len()).unwrap_or(0)
    }
}

impl HubInner {
    fn join(&self, id: ConnectionId, room: Room) {
        let Some(mut conn) = self.connections.get_mut(&id) else {
            return;
        };
        // entry stays held until the room lists the id; disconnect must see both
        conn.rooms.insert(room);
        self.rooms.entry(room).or_default().insert(id);
    }

    fn leave(&self, id: ConnectionId, room: &Room) {
        if let Some(mut conn) = self.connections.get_mut(&id) {
            conn.rooms.remove(room);
        }
        self.remove_member(id, room);
    }

    fn remove_member(&self, id: ConnectionId, room: &Room) {
        if let Some(mut members) = self.rooms.get_mut(room) {
            members.remove(&id);
        }
        self.rooms.remove_if(room, |_, members| members.is_empty());
    }

    fn disconnect(&self, id: ConnectionId) {
        if let Some((_, conn)) = self.connections.remove(&id) {
            for room in &conn.rooms {
                self.remove_member(id, room);
            }
            debug!(connection_id = id, "Realtime connection closed");
        }
    }

    fn rooms_of(&self, id: ConnectionId) -> Vec<Room> {
        self.connections
            .get(&id)
            .map(|conn| conn.rooms.iter().copied().collect())
            .unwrap_or_default()
    }
}

impl EventPublisher for RealtimeHub {
    fn publish(&self, event: LifecycleEvent) -> usize {
        let rooms = event.rooms();
        let event = Arc::new(event);

        // a connection in several target rooms still gets one copy
        let mut targets: HashSet<ConnectionId> = HashSet::new();
        for room in &rooms {
            if let Some(members) = self.inner.rooms.get(room) {
                targets.extend(members.iter().copied());
            }
        }

        let mut delivered = 0;
        let mut closed = Vec::new();
        for id in targets {
            let Some(conn) = self.inner.connections.get(&id) else {
                continue;
            };
            match conn.tx.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    counter!("tableside_realtime.dropped", 1, "reason" => "full");
                    warn!(
                        connection_id = id,
                        event = %event.kind,
                        order_id = %event.order_id,
                        "Subscriber queue full; event dropped"
                    );
                }
                Err(TrySendError::Closed(_)) => closed.push(id),
            }
        }
        for id in closed {
            self.inner.disconnect(id);
        }

        counter!("tableside_realtime.published", 1, "event" => event.kind.to_string());
        debug!(
            event = %event.kind,
            order_id = %event.order_id,
            delivered,
            "Lifecycle event published"
        );
        delivered
    }
}

/// A live connection to the hub. Dropping it leaves every joined room.
pub struct Subscription {
    id: ConnectionId,
    hub: Arc<HubInner>,
    rx: mpsc::Receiver<Arc<LifecycleEvent>>,
}

impl Subscription {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn join(&self, room: Room) {
        self.hub.join(self.id, room);
    }

    pub fn leave(&self, room: &Room) {
        self.hub.leave(self.id, room);
    }

    pub fn rooms(&self) -> Vec<Room> {
        self.hub.rooms_of(self.id)
    }

    /// Waits for the next event. Returns `None` once the hub is gone.
    pub async fn recv(&mut self) -> Option<Arc<LifecycleEvent>> {
        self.rx.recv().await
    }

    /// Returns a queued event without waiting.
    pub fn try_recv(&mut self) -> Option<Arc<LifecycleEvent>> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.disconnect(self.id);
    }
}
