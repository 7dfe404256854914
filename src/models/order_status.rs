use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;

/// Lifecycle status of an order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
    ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Submitted,
    AwaitingPayment,
    Pending,
    Confirmed,
    Preparing,
    Ready,
    Served,
    /// Legacy value. No transition targets it and none leaves it.
    Paid,
    Completed,
    Cancelled,
}

impl OrderStatus {
    /// Statuses reachable in one step from `self`.
    pub fn allowed_targets(self) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match self {
            Submitted => &[Pending, Confirmed, Cancelled],
            AwaitingPayment => &[Pending, Cancelled],
            Pending => &[Confirmed, Cancelled],
            Confirmed => &[Preparing, Cancelled],
            Preparing => &[Ready, Cancelled],
            Ready => &[Served],
            Served => &[Completed],
            Paid | Completed | Cancelled => &[],
        }
    }

    pub fn can_transition_to(self, target: OrderStatus) -> bool {
        self.allowed_targets().contains(&target)
    }

    pub fn is_terminal(self) -> bool {
        self.allowed_targets().is_empty()
    }

    /// Statuses from which cancelling has to put stock back.
    pub fn holds_stock(self) -> bool {
        matches!(self, OrderStatus::Confirmed | OrderStatus::Preparing)
    }

    /// Statuses that settle-by-payment moves forward to CONFIRMED.
    pub fn awaits_payment(self) -> bool {
        matches!(self, OrderStatus::AwaitingPayment | OrderStatus::Pending)
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
    ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Unpaid,
    Pending,
    Paid,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
    ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Cash,
    Card,
}

impl PaymentMethod {
    /// Status pair an order starts in when paid this way.
    pub fn initial_state(self) -> (OrderStatus, PaymentStatus) {
        match self {
            PaymentMethod::Cash => (OrderStatus::Submitted, PaymentStatus::Unpaid),
            PaymentMethod::Card => (OrderStatus::AwaitingPayment, PaymentStatus::Pending),
        }
    }
}
