//! Tagged stage results.
//!
//! Every research stage either succeeds or degrades to a well-formed value
//! with a human-readable reason. Callers match on the outcome instead of
//! relying on unwinding.

/// Result of one pipeline stage.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome<T> {
    /// The stage did what it was asked.
    Ok(T),
    /// The stage fell back to `value`.
    Degraded { value: T, reason: String },
}

impl<T> StageOutcome<T> {
    pub fn degraded(value: T, reason: impl Into<String>) -> Self {
        Self::Degraded {
            value,
            reason: reason.into(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    pub fn value(&self) -> &T {
        match self {
            Self::Ok(value) | Self::Degraded { value, .. } => value,
        }
    }

    /// Split into the value and the degradation reason, if any.
    pub fn into_parts(self) -> (T, Option<String>) {
        match self {
            Self::Ok(value) => (value, None),
            Self::Degraded { value, reason } => (value, Some(reason)),
        }
    }
}
