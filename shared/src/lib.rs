//! Shared types for the order lifecycle sync engine
//!
//! Value types that cross surface boundaries (kitchen display, billing,
//! other device views) plus small time utilities. No I/O lives here.

pub mod order;
pub mod util;

// Re-exports
pub use order::{ChangeEvent, Order, OrderLine, OrderStatus, StatusChange, StatusField};
pub use serde::{Deserialize, Serialize};
