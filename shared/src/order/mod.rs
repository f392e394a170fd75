//! Order lifecycle types
//!
//! - [`types`] - order snapshot, status enums, status ranking
//! - [`event`] - change events (the unit of propagation)

pub mod event;
pub mod types;

pub use event::{ChangeEvent, StatusChange};
pub use types::{Order, OrderLine, OrderStatus, StatusField};
