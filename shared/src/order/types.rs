//! Order snapshot and status types

use serde::{Deserialize, Serialize};

/// Kitchen / service lifecycle status
///
/// Kitchen status only ever moves forward (`PENDING → PREPARING → READY`) or
/// sideways into `REJECTED`; it never regresses outside an administrative
/// restore. Service status tracks front-of-house progress independently.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    Pending,
    Preparing,
    Ready,
    Served,
    Completed,
    Rejected,
}

impl OrderStatus {
    /// Forward-progression rank, used to resolve out-of-order delivery.
    ///
    /// `REJECTED` ranks above everything: it is terminal and must never be
    /// overridden by a late-arriving lower status.
    pub fn rank(&self) -> u8 {
        match self {
            OrderStatus::Pending => 0,
            OrderStatus::Preparing => 1,
            OrderStatus::Ready => 2,
            OrderStatus::Served => 3,
            OrderStatus::Completed => 4,
            OrderStatus::Rejected => 5,
        }
    }

    /// Terminal statuses leave the active working set
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Rejected)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "PENDING"),
            OrderStatus::Preparing => write!(f, "PREPARING"),
            OrderStatus::Ready => write!(f, "READY"),
            OrderStatus::Served => write!(f, "SERVED"),
            OrderStatus::Completed => write!(f, "COMPLETED"),
            OrderStatus::Rejected => write!(f, "REJECTED"),
        }
    }
}

/// Which lifecycle field a transition targets
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusField {
    Kitchen,
    Service,
}

impl std::fmt::Display for StatusField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatusField::Kitchen => write!(f, "KITCHEN"),
            StatusField::Service => write!(f, "SERVICE"),
        }
    }
}

/// Order line - read-only display snapshot, never mutated by the engine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderLine {
    pub name: String,
    pub quantity: i32,
    /// Display unit (e.g. "pcs", "kg")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// Order snapshot as the sync engine sees it
///
/// Created externally by the billing flow; mutated exclusively through the
/// transition state machine. Local copies are a cache of the order store and
/// must always be reconcilable by re-reading it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    /// Opaque store-assigned ID, immutable
    pub id: String,
    /// Human-readable sequence label, shown on screens and announced by voice
    pub display_number: String,
    pub kitchen_status: OrderStatus,
    pub service_status: OrderStatus,
    pub items: Vec<OrderLine>,
    /// Creation time (unix millis), used for FIFO ordering and elapsed display
    pub created_at: i64,
}

impl Order {
    /// Read the requested status field
    pub fn status(&self, field: StatusField) -> OrderStatus {
        match field {
            StatusField::Kitchen => self.kitchen_status,
            StatusField::Service => self.service_status,
        }
    }

    /// Write the requested status field
    pub fn set_status(&mut self, field: StatusField, status: OrderStatus) {
        match field {
            StatusField::Kitchen => self.kitchen_status = status,
            StatusField::Service => self.service_status = status,
        }
    }

    /// Active working set membership - a view-level filter, not a deletion.
    ///
    /// An order drops out once either field is terminal.
    pub fn is_active(&self) -> bool {
        !self.kitchen_status.is_terminal() && !self.service_status.is_terminal()
    }

    /// Elapsed time since creation, for "waiting N minutes" display
    pub fn elapsed_millis(&self, now: i64) -> i64 {
        (now - self.created_at).max(0)
    }
}
