//! Lifecycle events and the rooms they are delivered to.
//!
//! Events are published only after the transaction that produced them has
//! committed. Delivery is best effort; a subscriber that misses one re-reads
//! the order and keeps whichever copy has the newest `updated_at`.

pub mod hub;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use strum::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::OrderView;

pub use hub::{RealtimeHub, Subscription};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
pub enum EventKind {
    #[serde(rename = "order.created")]
    #[strum(serialize = "order.created")]
    OrderCreated,
    #[serde(rename = "order.updated")]
    #[strum(serialize = "order.updated")]
    OrderUpdated,
    #[serde(rename = "order.paid")]
    #[strum(serialize = "order.paid")]
    OrderPaid,
    #[serde(rename = "order.cancelled")]
    #[strum(serialize = "order.cancelled")]
    OrderCancelled,
    #[serde(rename = "payment.updated")]
    #[strum(serialize = "payment.updated")]
    PaymentUpdated,
    #[serde(rename = "kitchen.ack")]
    #[strum(serialize = "kitchen.ack")]
    KitchenAck,
}

impl EventKind {
    /// Audiences that receive this kind of event.
    pub fn audience(self) -> &'static [Audience] {
        use Audience::*;
        match self {
            EventKind::OrderCreated => &[Floor, Admin],
            EventKind::OrderUpdated | EventKind::OrderCancelled => &[Floor, Kitchen, Admin],
            EventKind::OrderPaid => &[Kitchen, Admin],
            EventKind::PaymentUpdated | EventKind::KitchenAck => &[Floor, Admin],
        }
    }
}

/// Role half of a room name. `Floor` is the bare `branch:{id}` room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Audience {
    Floor,
    Kitchen,
    Admin,
}

/// A logical subscription channel: `branch:{id}`, `branch:{id}:kitchen` or
/// `branch:{id}:admin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Room {
    pub branch_id: Uuid,
    pub audience: Audience,
}

impl Room {
    pub fn branch(branch_id: Uuid) -> Self {
        Self {
            branch_id,
            audience: Audience::Floor,
        }
    }

    pub fn kitchen(branch_id: Uuid) -> Self {
        Self {
            branch_id,
            audience: Audience::Kitchen,
        }
    }

    pub fn admin(branch_id: Uuid) -> Self {
        Self {
            branch_id,
            audience: Audience::Admin,
        }
    }
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.audience {
            Audience::Floor => write!(f, "branch:{}", self.branch_id),
            Audience::Kitchen => write!(f, "branch:{}:kitchen", self.branch_id),
            Audience::Admin => write!(f, "branch:{}:admin", self.branch_id),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid room name '{0}'")]
pub struct InvalidRoom(pub String);

impl FromStr for Room {
    type Err = InvalidRoom;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidRoom(s.to_string());
        let mut parts = s.split(':');
        if parts.next() != Some("branch") {
            return Err(invalid());
        }
        let branch_id = parts
            .next()
            .and_then(|raw| Uuid::parse_str(raw).ok())
            .ok_or_else(invalid)?;
        let audience = match parts.next() {
            None => Audience::Floor,
            Some("kitchen") => Audience::Kitchen,
            Some("admin") => Audience::Admin,
            Some(_) => return Err(invalid()),
        };
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Room {
            branch_id,
            audience,
        })
    }
}

/// One committed change to an order. Carries the whole projection, keyed by
/// `(order_id, updated_at)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LifecycleEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub order_id: Uuid,
    pub updated_at: DateTime<Utc>,
    pub order: OrderView,
}

impl LifecycleEvent {
    pub fn new(kind: EventKind, order: OrderView) -> Self {
        Self {
            kind,
            order_id: order.id,
            updated_at: order.updated_at,
            order,
        }
    }

    pub fn rooms(&self) -> Vec<Room> {
        self.kind
            .audience()
            .iter()
            .map(|&audience| Room {
                branch_id: self.order.branch_id,
                audience,
            })
            .collect()
    }

    /// True if `self` should replace `current` under last-write-wins.
    pub fn supersedes(&self, current: &OrderView) -> bool {
        self.order_id == current.id && self.updated_at >= current.updated_at
    }
}

/// Sink for committed lifecycle events. Implementations must not block.
pub trait EventPublisher: Send + Sync {
    /// Returns the number of connections the event was queued for.
    fn publish(&self, event: LifecycleEvent) -> usize;
}

/// Publisher that drops everything. Used where no hub is wired in.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPublisher;

impl EventPublisher for NoopPublisher {
    fn publish(&self, _event: LifecycleEvent) -> usize {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_names_round_trip() {
        let id = Uuid::new_v4();
        for room in [Room::branch(id), Room::kitchen(id), Room::admin(id)] {
            assert_eq!(room.to_string().parse::<Room>().unwrap(), room);
        }
        assert_eq!(Room::kitchen(id).to_string(), format!("branch:{}:kitchen", id));
    }

    #[test]
    fn malformed_room_names_are_rejected() {
        let id = Uuid::new_v4();
        assert!("branch".parse::<Room>().is_err());
        assert!("table:1".parse::<Room>().is_err());
        assert!("branch:not-a-uuid".parse::<Room>().is_err());
        assert!(format!("branch:{}:bar", id).parse::<Room>().is_err());
        assert!(format!("branch:{}:kitchen:x", id).parse::<Room>().is_err());
    }

    #[test]
    fn paid_goes_to_kitchen_not_floor() {
        let audience = EventKind::OrderPaid.audience();
        assert!(audience.contains(&Audience::Kitchen));
        assert!(!audience.contains(&Audience::Floor));
    }

    #[test]
    fn event_kind_wire_names() {
        assert_eq!(EventKind::KitchenAck.to_string(), "kitchen.ack");
        assert_eq!(
            serde_json::to_string(&EventKind::OrderCreated).unwrap(),
            "\"order.created\""
        );
        assert_eq!(
            "payment.updated".parse::<EventKind>().unwrap(),
            EventKind::PaymentUpdated
        );
    }
}
