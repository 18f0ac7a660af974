//! Mapping of native SQLite failures onto the store's error kinds

use rusqlite::ErrorCode;
use vellum_core::VellumError;

/// Normalize a `rusqlite` error
///
/// A uniqueness failure naming `transaction_id` means one object was written
/// twice in a batch; one naming a version or time column means the version
/// already exists.
pub fn normalize(err: rusqlite::Error) -> VellumError {
    match &err {
        rusqlite::Error::SqliteFailure(e, message) if e.code == ErrorCode::ConstraintViolation => {
            let text = message.as_deref().unwrap_or("");
            if text.contains("transaction_id") {
                VellumError::DuplicateWrite {
                    entity: text.to_string(),
                }
            } else if text.contains("version") || text.contains("_time") {
                VellumError::FailedUpdate {
                    reason: text.to_string(),
                }
            } else {
                VellumError::unknown(&err)
            }
        }
        rusqlite::Error::QueryReturnedNoRows => VellumError::NotFound {
            entity: "no qualifying row".into(),
        },
        _ => VellumError::unknown(&err),
    }
}
