use thiserror::Error;

use crate::send::SendState;

/// Errors surfaced by the send flow. Malformed destinations never appear
/// here: they classify as [`Classification::Unrecognized`] instead, and a
/// bad amount string is a `None` from the amount engine, not an error.
///
/// [`Classification::Unrecognized`]: crate::Classification::Unrecognized
#[derive(Debug, Clone, Error, Eq, PartialEq)]
pub enum SendError {
    /// Confirmation was requested with a missing or invalid amount, or an
    /// unrecognized destination. Local only; the attempt state is unchanged.
    #[error("cannot confirm payment: {reason}")]
    ConfirmationRejected { reason: String },

    /// The attempt is frozen while the engine call is in flight.
    #[error("a dispatch is in flight and the attempt is frozen until it completes")]
    DispatchInProgress,

    #[error("cannot {action} from the {from} state")]
    InvalidTransition {
        from: SendState,
        action: &'static str,
    },

    /// The requested sub-method is not offered by the current destination.
    #[error("that payment method is not offered by this destination")]
    MethodNotAvailable,

    /// The external wallet engine rejected the send. Terminal for the
    /// attempt; the message is the engine's own text when it has any.
    #[error("payment failed: {message}")]
    Dispatch { message: String },

    /// The engine returned a result shape the normalizer cannot map. This is
    /// a programming error, never coerced into a partial record.
    #[error("engine returned a result that cannot be recorded: {message}")]
    Normalization { message: String },
}
