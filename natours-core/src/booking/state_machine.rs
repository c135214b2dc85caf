use std::fmt;

/// Stage of one purchase attempt.
///
/// - Initiated: checkout session requested, nothing stored
/// - Completed: the payment provider confirmed payment
/// - Materialized: the booking row exists (terminal)
///
/// An abandoned checkout never leaves `Initiated` and is never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchaseState {
    Initiated,
    Completed,
    Materialized,
}

impl fmt::Display for PurchaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PurchaseState::Initiated => write!(f, "initiated"),
            PurchaseState::Completed => write!(f, "completed"),
            PurchaseState::Materialized => write!(f, "materialized"),
        }
    }
}

/// Input that can move a purchase forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchaseEvent {
    /// A verified payment-completion callback arrived
    PaymentConfirmed,

    /// The booking insert returned a new row
    BookingRecorded,
}

/// Side effect the workflow owes after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchaseAction {
    RecordBooking,
    SendConfirmation,
    NoAction,
}

impl fmt::Display for PurchaseAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PurchaseAction::RecordBooking => write!(f, "record_booking"),
            PurchaseAction::SendConfirmation => write!(f, "send_confirmation"),
            PurchaseAction::NoAction => write!(f, "no_action"),
        }
    }
}

/// Transition rules for a purchase attempt.
pub trait Transition {
    /// Next state and owed action. Events that do not apply to the current
    /// state leave it unchanged with no action.
    fn transition(current: PurchaseState, event: PurchaseEvent) -> (PurchaseState, PurchaseAction);

    fn initial_state() -> PurchaseState {
        PurchaseState::Initiated
    }
}

pub struct PurchaseStateMachine;

impl Transition for PurchaseStateMachine {
    fn transition(current: PurchaseState, event: PurchaseEvent) -> (PurchaseState, PurchaseAction) {
        match (current, event) {
            (PurchaseState::Initiated, PurchaseEvent::PaymentConfirmed) => {
                (PurchaseState::Completed, PurchaseAction::RecordBooking)
            }
            (PurchaseState::Completed, PurchaseEvent::BookingRecorded) => {
                (PurchaseState::Materialized, PurchaseAction::SendConfirmation)
            }
            (state, _) => (state, PurchaseAction::NoAction),
        }
    }
}
