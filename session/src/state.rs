//! Per-operation state machine.
//!
//! ```text
//!   Idle ───────begin──▶ Loading ──succeed──▶ Success
//!                          │
//!                          └─────fail───────▶ Error
//!
//!   Success | Error ──begin──▶ Loading        (begin while Loading is refused)
//! ```
//!
//! Each `begin` hands out a [`Ticket`]. A completion is applied only if its ticket
//! still matches the current generation, so results of cancelled invocations are
//! dropped instead of landing on a controller nobody observes anymore.

use docchat_api::ApiError;

/// Lifecycle phase of one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
}

/// Proof that an invocation started; required to complete it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    generation: u64,
}

/// Observable state of one operation (upload or chat).
#[derive(Debug, Clone, PartialEq)]
pub struct OperationState<T> {
    pub phase: Phase,
    /// Result of the last successful invocation
    pub result: Option<T>,
    /// Error of the last failed invocation; cleared when a new one starts
    pub last_error: Option<ApiError>,
    /// Correlation id of the last completed invocation, if the backend sent one
    pub last_request_id: Option<String>,
    generation: u64,
}

impl<T> Default for OperationState<T> {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            result: None,
            last_error: None,
            last_request_id: None,
            generation: 0,
        }
    }
}

impl<T> OperationState<T> {
    pub fn is_loading(&self) -> bool {
        self.phase == Phase::Loading
    }

    pub fn is_success(&self) -> bool {
        self.phase == Phase::Success
    }

    pub fn is_error(&self) -> bool {
        self.phase == Phase::Error
    }

    /// Enter `Loading`. Returns `None` while an invocation is already in flight.
    pub fn begin(&mut self) -> Option<Ticket> {
        if self.is_loading() {
            return None;
        }

        self.generation += 1;
        self.phase = Phase::Loading;
        self.last_error = None;
        Some(Ticket {
            generation: self.generation,
        })
    }

    /// Record a successful completion. Returns `false` for stale tickets.
    pub fn succeed(&mut self, ticket: Ticket, request_id: &str, result: T) -> bool {
        if !self.accepts(ticket) {
            return false;
        }

        self.phase = Phase::Success;
        self.result = Some(result);
        self.last_request_id = non_empty(request_id);
        true
    }

    /// Record a failed completion. Returns `false` for stale tickets.
    pub fn fail(&mut self, ticket: Ticket, error: ApiError) -> bool {
        if !self.accepts(ticket) {
            return false;
        }

        self.phase = Phase::Error;
        self.last_request_id = non_empty(&error.request_id);
        self.last_error = Some(error);
        true
    }

    /// Invalidate any outstanding ticket; an in-flight invocation returns to `Idle`.
    ///
    /// Returns whether the observable state changed.
    pub fn cancel(&mut self) -> bool {
        self.generation += 1;
        if self.is_loading() {
            self.phase = Phase::Idle;
            return true;
        }
        false
    }

    /// Abandon one invocation: back to `Idle` only if `ticket` is still current.
    pub fn cancel_ticket(&mut self, ticket: Ticket) -> bool {
        if !self.accepts(ticket) {
            return false;
        }

        self.generation += 1;
        self.phase = Phase::Idle;
        true
    }

    fn accepts(&self, ticket: Ticket) -> bool {
        self.is_loading() && ticket.generation == self.generation
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
