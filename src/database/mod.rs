use std::time::{SystemTime, UNIX_EPOCH};

pub mod comments;
pub mod create;
pub mod posts;
pub mod users;

/// Outcome of an ownership-gated mutation.
///
/// The gate runs inside the same transaction as the write, so `NotOwner`
/// and `NotFound` both guarantee the stored row is untouched.
#[derive(Debug)]
pub enum Mutation<T> {
    /// Ownership verified, mutation committed.
    Applied(T),

    /// No row with the requested id.
    NotFound,

    /// The acting username is not the stored author — nothing written.
    NotOwner,
}

/// Current Unix timestamp in seconds.
pub(crate) fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before Unix epoch")
        .as_secs() as i64
}
