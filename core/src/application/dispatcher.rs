//! Backend dispatch with single fallback.
//!
//! A request moves through
//! `Idle → Validating → Attempting(primary) → {Success | Attempting(secondary) → {Success | Failure}}`.
//! The transition function is pure; `Dispatcher::dispatch` drives it and
//! performs the backend calls, so there are at most two external calls per
//! request and none at all when validation fails.

use tracing::{debug, info, warn};

use crate::domain::{ErrorInfo, ErrorKind, ExecutionMode, Operation, OperationResult, ResourceOutput};
use crate::ports::{BackendResult, ClusterBackend};

/// Which backend an attempt goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    Primary,
    Secondary,
}

/// Dispatch state of one request.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchState {
    Idle,
    Validating,
    Attempting(Attempt),
    Success(ResourceOutput),
    Failure(ErrorInfo),
}

impl DispatchState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success(_) | Self::Failure(_))
    }

    /// Converts a terminal state into the caller-facing result.
    pub fn into_result(self) -> OperationResult {
        match self {
            Self::Success(output) => OperationResult::ok(output),
            Self::Failure(error) => OperationResult::failed(error),
            other => OperationResult::failed(ErrorInfo::new(
                ErrorKind::Unknown,
                format!("dispatch stopped in non-terminal state {:?}", other),
            )),
        }
    }
}

/// Inputs that move a request between states.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchEvent {
    Start,
    Validated(Result<(), ErrorInfo>),
    Completed(BackendResult),
}

/// Computes the next state.
///
/// Events that do not apply to the current state leave it unchanged.
pub fn transition(state: DispatchState, event: DispatchEvent, has_secondary: bool) -> DispatchState {
    use DispatchEvent as E;
    use DispatchState as S;

    match (state, event) {
        (S::Idle, E::Start) => S::Validating,
        (S::Validating, E::Validated(Ok(()))) => S::Attempting(Attempt::Primary),
        (S::Validating, E::Validated(Err(error))) => S::Failure(error),
        (S::Attempting(_), E::Completed(Ok(output))) => S::Success(output),
        (S::Attempting(Attempt::Primary), E::Completed(Err(error)))
            if error.is_retryable() && has_secondary =>
        {
            S::Attempting(Attempt::Secondary)
        }
        (S::Attempting(_), E::Completed(Err(error))) => S::Failure(error),
        (state, _) => state,
    }
}

/// Routes operations to a primary backend and falls back to a secondary one.
pub struct Dispatcher<B: ClusterBackend> {
    primary: B,
    secondary: Option<B>,
}

impl<B: ClusterBackend> Dispatcher<B> {
    /// Creates a dispatcher. Pass `None` to disable fallback.
    pub fn new(primary: B, secondary: Option<B>) -> Self {
        Self { primary, secondary }
    }

    pub fn primary_mode(&self) -> ExecutionMode {
        self.primary.mode()
    }

    pub fn secondary_mode(&self) -> Option<ExecutionMode> {
        self.secondary.as_ref().map(|backend| backend.mode())
    }

    /// Validates and executes an operation.
    pub async fn dispatch(&self, operation: &Operation) -> OperationResult {
        let has_secondary = self.secondary.is_some();
        let mut state = DispatchState::Idle;

        while !state.is_terminal() {
            let event = match &state {
                DispatchState::Idle => DispatchEvent::Start,
                DispatchState::Validating => DispatchEvent::Validated(operation.validate()),
                DispatchState::Attempting(attempt) => {
                    DispatchEvent::Completed(self.attempt(*attempt, operation).await)
                }
                DispatchState::Success(_) | DispatchState::Failure(_) => break,
            };

            let next = transition(state, event, has_secondary);
            if next == DispatchState::Attempting(Attempt::Secondary) {
                info!(
                    %operation,
                    from = %self.primary.mode(),
                    "primary backend unavailable, falling back"
                );
            }
            state = next;
        }

        if let DispatchState::Failure(error) = &state {
            warn!(%operation, kind = ?error.kind, "operation failed: {}", error.message);
        }

        state.into_result()
    }

    async fn attempt(&self, attempt: Attempt, operation: &Operation) -> BackendResult {
        let backend = match attempt {
            Attempt::Primary => &self.primary,
            Attempt::Secondary => self
                .secondary
                .as_ref()
                .ok_or_else(|| ErrorInfo::unavailable("no secondary backend configured"))?,
        };

        debug!(%operation, mode = %backend.mode(), ?attempt, "executing");
        backend.execute(operation).await
    }
}
