use std::error::Error as StdError;

type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Failure kinds surfaced by the subscription core.
///
/// Collaborator errors are translated into one of these while the original
/// error stays reachable through `source()`.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Malformed input. Never retried.
    #[error("{0}")]
    Validation(String),

    /// Collaborator unreachable or timed out. Nothing was written, safe to retry.
    #[error("{message}")]
    Transient {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// A concurrent write changed the record after it was read.
    #[error("{0}")]
    Conflict(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        CoreError::Validation(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        CoreError::Conflict(message.into())
    }

    pub fn transient(message: impl Into<String>) -> Self {
        CoreError::Transient {
            message: message.into(),
            source: None,
        }
    }

    pub fn transient_from(
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        CoreError::Transient {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Translates a MongoDB error. A duplicate key becomes `Conflict` with
    /// `on_duplicate` as the message; everything else is transient.
    pub fn from_mongo(err: mongodb::error::Error, on_duplicate: &str) -> Self {
        if is_duplicate_key(&err) {
            return CoreError::Conflict(on_duplicate.to_string());
        }
        CoreError::transient_from(format!("Database error: {}", err), err)
    }
}

// MongoDB duplicate key
const DUPLICATE_KEY: i32 = 11000;

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    use mongodb::error::{ErrorKind, WriteFailure};

    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY,
        _ => false,
    }
}

impl From<mongodb::error::Error> for CoreError {
    fn from(err: mongodb::error::Error) -> Self {
        CoreError::from_mongo(err, "Record already exists")
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(err: reqwest::Error) -> Self {
        CoreError::transient_from(format!("Upstream request failed: {}", err), err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;
    use mongodb::error::{ErrorKind, WriteError, WriteFailure};
    use std::error::Error;

    fn duplicate_key() -> mongodb::error::Error {
        let write_error: WriteError = mongodb::bson::from_document(doc! {
            "code": DUPLICATE_KEY,
            "codeName": "DuplicateKey",
            "errmsg": "E11000 duplicate key error collection: payments index: order_id_1",
        })
        .unwrap();
        mongodb::error::Error::from(ErrorKind::Write(WriteFailure::WriteError(write_error)))
    }

    #[test]
    fn transient_keeps_its_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "socket timed out");
        let err = CoreError::transient_from("Database unreachable", io);

        assert!(matches!(err, CoreError::Transient { .. }));
        assert_eq!(err.to_string(), "Database unreachable");
        let cause = err.source().map(|e| e.to_string());
        assert_eq!(cause.as_deref(), Some("socket timed out"));
    }

    #[test]
    fn duplicate_key_carries_the_callers_message() {
        let err = CoreError::from_mongo(duplicate_key(), "Payment order already recorded");
        assert!(matches!(&err, CoreError::Conflict(m) if m == "Payment order already recorded"));

        let err = CoreError::from(duplicate_key());
        assert!(matches!(&err, CoreError::Conflict(m) if m == "Record already exists"));
    }

    #[test]
    fn other_database_errors_are_transient() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        let err = CoreError::from_mongo(mongodb::error::Error::from(io), "unused");
        assert!(matches!(err, CoreError::Transient { .. }));
        assert!(err.source().is_some());
    }
}
