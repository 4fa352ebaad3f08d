//! Results of store mutations.

use crate::error::StoreError;

/// How a create, update or delete ended.
///
/// Storage faults never surface as errors from mutations: a write the
/// primary engine rejects is queued for replay and reported as
/// [`WriteOutcome::Queued`]. Only validation problems, or a write that could
/// be neither persisted nor queued, end up in [`WriteOutcome::Failed`].
#[derive(Debug)]
#[must_use]
pub enum WriteOutcome<T> {
    /// Written to the primary engine.
    Persisted(T),
    /// Deferred to the offline queue and visible through fallback reads.
    Queued(T),
    /// The target record does not exist (or is soft-deleted).
    NotFound,
    /// Rejected; nothing was written.
    Failed(StoreError),
}

impl<T> WriteOutcome<T> {
    /// The written record, whether persisted or queued.
    pub fn record(&self) -> Option<&T> {
        match self {
            WriteOutcome::Persisted(record) | WriteOutcome::Queued(record) => Some(record),
            WriteOutcome::NotFound | WriteOutcome::Failed(_) => None,
        }
    }

    /// Consumes the outcome, returning the written record.
    pub fn into_record(self) -> Option<T> {
        match self {
            WriteOutcome::Persisted(record) | WriteOutcome::Queued(record) => Some(record),
            WriteOutcome::NotFound | WriteOutcome::Failed(_) => None,
        }
    }

    /// Returns true if the primary engine accepted the write.
    pub fn is_persisted(&self) -> bool {
        matches!(self, WriteOutcome::Persisted(_))
    }

    /// Returns true if the write waits in the offline queue.
    pub fn is_queued(&self) -> bool {
        matches!(self, WriteOutcome::Queued(_))
    }

    /// Returns true if the target did not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, WriteOutcome::NotFound)
    }

    /// Returns true if the write was rejected.
    pub fn is_failed(&self) -> bool {
        matches!(self, WriteOutcome::Failed(_))
    }

    /// Short label for logs and CLI output.
    pub fn label(&self) -> &'static str {
        match self {
            WriteOutcome::Persisted(_) => "persisted",
            WriteOutcome::Queued(_) => "queued",
            WriteOutcome::NotFound => "not_found",
            WriteOutcome::Failed(_) => "failed",
        }
    }

    /// Maps the carried record.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> WriteOutcome<U> {
        match self {
            WriteOutcome::Persisted(record) => WriteOutcome::Persisted(f(record)),
            WriteOutcome::Queued(record) => WriteOutcome::Queued(f(record)),
            WriteOutcome::NotFound => WriteOutcome::NotFound,
            WriteOutcome::Failed(e) => WriteOutcome::Failed(e),
        }
    }

    /// Converts into a `Result`: `Ok(Some)` for written records, `Ok(None)`
    /// for a missing target, `Err` for a rejected write.
    ///
    /// # Errors
    ///
    /// Returns the error carried by [`WriteOutcome::Failed`].
    pub fn into_result(self) -> Result<Option<T>, StoreError> {
        match self {
            WriteOutcome::Persisted(record) | WriteOutcome::Queued(record) => Ok(Some(record)),
            WriteOutcome::NotFound => Ok(None),
            WriteOutcome::Failed(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_access() {
        let persisted = WriteOutcome::Persisted(3);
        assert_eq!(persisted.record(), Some(&3));
        assert!(persisted.is_persisted());

        let queued = WriteOutcome::Queued("x").map(str::len);
        assert!(queued.is_queued());
        assert_eq!(queued.into_record(), Some(1));
    }

    #[test]
    fn test_into_result() {
        assert_eq!(WriteOutcome::<u8>::NotFound.into_result().unwrap(), None);
        let failed = WriteOutcome::<u8>::Failed(StoreError::Config("bad".to_string()));
        assert_eq!(failed.label(), "failed");
        assert!(failed.into_result().is_err());
    }
}
