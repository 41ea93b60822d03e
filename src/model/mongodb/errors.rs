//! For some reason, the mongodb crate doesn't provide error code constants.
//! This module fills in the gaps.

use mongodb::error::{Error as DbError, ErrorKind, WriteFailure};

pub const DUPLICATE_KEY: i32 = 11000;
pub const WRITE_CONFLICT: i32 = 112;

/// Return true if the given error is a duplicate key write error.
pub fn is_duplicate_key_error(err: &DbError) -> bool {
    error_code(err) == Some(DUPLICATE_KEY)
}

/// Return true if the given error is a transactional write conflict, i.e. another
/// in-flight transaction has already written the same document or index key.
pub fn is_write_conflict_error(err: &DbError) -> bool {
    error_code(err) == Some(WRITE_CONFLICT)
}

/// Extract the server error code, if there is one.
fn error_code(err: &DbError) -> Option<i32> {
    match *err.kind {
        ErrorKind::Write(WriteFailure::WriteError(ref e)) => Some(e.code),
        ErrorKind::Write(WriteFailure::WriteConcernError(ref e)) => Some(e.code),
        ErrorKind::Command(ref e) => Some(e.code),
        _ => None,
    }
}
