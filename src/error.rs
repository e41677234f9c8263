use thiserror::Error;

/// Validation failures raised by the calculators and the boundary parsers.
///
/// These are never defaulted away: an unrecognized code or a negative
/// amount is a data-integrity problem in the caller, not something to
/// coerce into a result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("unrecognized commission type: {value}")]
    InvalidPolicy { value: String },

    #[error("commission amount must not be negative, got {amount}")]
    InvalidAmount { amount: i64 },

    #[error("unrecognized attendance status: {value}")]
    InvalidStatus { value: String },

    #[error("unrecognized payment status: {value}")]
    InvalidPaymentStatus { value: String },
}
