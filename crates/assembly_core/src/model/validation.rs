//! Input validation errors for assembly and agenda records.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Validation failure detected before any storage mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Title is empty after trim.
    BlankTitle,
    /// Condominium identifier is empty after trim.
    BlankCondominium,
    /// Unit identifier is empty after trim.
    BlankUnit,
    /// The caller does not represent any unit.
    MissingUnit,
    /// Install quorum is not a percentage in `0..=100`.
    QuorumOutOfRange(u8),
    /// `schedule` requires a date strictly after the current time.
    ScheduledInPast { scheduled_at: i64, now: i64 },
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankTitle => write!(f, "title must not be blank"),
            Self::BlankCondominium => write!(f, "condominium id must not be blank"),
            Self::BlankUnit => write!(f, "unit id must not be blank"),
            Self::MissingUnit => write!(f, "caller does not represent a unit"),
            Self::QuorumOutOfRange(value) => {
                write!(f, "install quorum must be within 0..=100, got {value}")
            }
            Self::ScheduledInPast { scheduled_at, now } => write!(
                f,
                "assembly date {scheduled_at} must be in the future (now {now})"
            ),
        }
    }
}

impl Error for ValidationError {}

/// Trims `value` and rejects blank input with `error`.
pub(crate) fn normalize_required(
    value: &str,
    error: ValidationError,
) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(error);
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::{normalize_required, ValidationError};

    #[test]
    fn normalize_required_trims_surrounding_whitespace() {
        let value = normalize_required("  A-101 ", ValidationError::BlankUnit)
            .expect("non-blank input should pass");
        assert_eq!(value, "A-101");
    }

    #[test]
    fn normalize_required_rejects_whitespace_only() {
        let err = normalize_required(" \t ", ValidationError::BlankTitle)
            .expect_err("blank input must fail");
        assert_eq!(err, ValidationError::BlankTitle);
    }
}
