use thiserror::Error;

use crate::{HandleKind, RawHandle};

/// Errors reported by the fallible [`HandlePool`][crate::HandlePool] operations and by the pool
/// builder.
///
/// The sentinel-returning operations ([`allocate()`][1], [`get()`][2], [`free()`][3]) never
/// produce these. They exist for callers that prefer to know *why* an operation had no effect.
///
/// [1]: crate::HandlePool::allocate
/// [2]: crate::HandlePool::get
/// [3]: crate::HandlePool::free
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Every slot of the pool was occupied at allocation time.
    #[error("all {capacity} slots of the {kind} handle pool are occupied")]
    Exhausted {
        /// The kind of handles the pool issues.
        kind: HandleKind,

        /// The fixed capacity of the pool.
        capacity: usize,
    },

    /// The handle does not belong to the pool: either its kind tag differs from the pool's or
    /// its index is outside the pool's capacity.
    #[error("handle {handle} is not a valid {kind} handle for this pool")]
    InvalidHandle {
        /// The rejected handle.
        handle: RawHandle,

        /// The kind of handles the pool issues.
        kind: HandleKind,
    },

    /// The handle was issued by the pool but its slot has since been freed (and possibly
    /// reused for another resource).
    #[error("handle {handle} refers to a resource that has already been freed")]
    StaleHandle {
        /// The rejected handle.
        handle: RawHandle,
    },

    /// The pool capacity requested from the builder cannot be represented.
    #[error("pool capacity {capacity} is invalid: must be between 1 and {max}")]
    InvalidCapacity {
        /// The requested capacity.
        capacity: usize,

        /// The largest supported capacity.
        max: usize,
    },

    /// The pool was configured without a handle kind, or with [`HandleKind::Undefined`].
    #[error("a handle pool must be configured with a defined handle kind")]
    UndefinedKind,
}

/// A specialized `Result` type for handle pool operations, returning the crate's
/// [`Error`] type as the error value.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::fmt::Debug;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(Error: Send, Sync, Debug);

    #[test]
    fn messages_name_the_problem() {
        let error = Error::Exhausted {
            kind: HandleKind::Pwm,
            capacity: 20,
        };
        assert_eq!(
            error.to_string(),
            "all 20 slots of the pwm handle pool are occupied"
        );

        let error = Error::InvalidHandle {
            handle: RawHandle::encode(1, HandleKind::Dio, 0),
            kind: HandleKind::Relay,
        };
        assert_eq!(
            error.to_string(),
            "handle 0x01000001 is not a valid relay handle for this pool"
        );

        let error = Error::InvalidCapacity {
            capacity: 0,
            max: 32768,
        };
        assert_eq!(
            error.to_string(),
            "pool capacity 0 is invalid: must be between 1 and 32768"
        );
    }
}
