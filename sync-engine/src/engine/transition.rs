//! Order state machine - pure transition validation
//!
//! `transition` is the only way order status moves. It is pure: same input,
//! same output, no I/O, no hidden clock (the caller supplies `now` for the
//! event's `observed_at` stamp).

use crate::core::{EngineError, EngineResult};
use shared::{ChangeEvent, Order, OrderStatus, StatusField};

/// Validate and apply one status transition, producing the canonical next
/// order state and the event describing it.
///
/// # Kitchen
///
/// `PENDING → PREPARING`, `PREPARING → READY`, plus the sideways move into
/// `REJECTED` from any non-terminal state. Everything else - skipping steps,
/// moving backward, leaving a terminal state - is an invalid transition.
///
/// # Service
///
/// Front-of-house advances independently: any strictly rank-increasing move
/// from a non-terminal state is accepted (`READY → SERVED`,
/// `SERVED → COMPLETED`, rejection, ...).
///
/// # Side effect
///
/// Kitchen `READY` means "food is up, front-of-house must act": it promotes
/// `service_status` to `READY` if service is still `PENDING`/`PREPARING`,
/// but never regresses a service status that already advanced past `READY`.
pub fn transition(
    order: &Order,
    field: StatusField,
    target: OrderStatus,
    now: i64,
) -> EngineResult<(Order, ChangeEvent)> {
    let current = order.status(field);

    let valid = match field {
        StatusField::Kitchen => matches!(
            (current, target),
            (OrderStatus::Pending, OrderStatus::Preparing)
                | (OrderStatus::Preparing, OrderStatus::Ready)
        ) || (!current.is_terminal() && target == OrderStatus::Rejected),
        StatusField::Service => !current.is_terminal() && target.rank() > current.rank(),
    };

    if !valid {
        return Err(EngineError::InvalidTransition {
            field,
            from: current,
            to: target,
        });
    }

    let mut next = order.clone();
    next.set_status(field, target);
    if field == StatusField::Kitchen && target == OrderStatus::Ready {
        promote_service_on_kitchen_ready(&mut next);
    }

    let event = ChangeEvent::new(order.id.clone(), field, current, target, now);
    Ok((next, event))
}

/// Replicate the kitchen-ready side effect on a locally held order.
///
/// Also used when applying a remotely originated kitchen `READY` event: the
/// feed carries one event per transition call, so receivers re-derive the
/// service promotion instead of waiting for a second event.
pub fn promote_service_on_kitchen_ready(order: &mut Order) {
    if matches!(
        order.service_status,
        OrderStatus::Pending | OrderStatus::Preparing
    ) {
        order.service_status = OrderStatus::Ready;
    }
}
