//! Server error codes the mongodb crate has no constants for.

use mongodb::error::{Error as DbError, ErrorKind, WriteFailure};

/// E11000: a unique index rejected the write.
pub const DUPLICATE_KEY: i32 = 11000;

/// Did this write fail because it collided with a unique index?
pub fn is_duplicate_key_error(err: &DbError) -> bool {
    match *err.kind {
        ErrorKind::Write(WriteFailure::WriteError(ref e)) => e.code == DUPLICATE_KEY,
        ErrorKind::BulkWrite(ref failure) => failure
            .write_errors
            .iter()
            .flatten()
            .any(|e| e.code == DUPLICATE_KEY),
        _ => false,
    }
}
