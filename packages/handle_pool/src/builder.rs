use std::fmt;
use std::marker::PhantomData;

use crate::{Error, Handle, HandleKind, HandlePool, MAX_INDEX, Result};

/// The largest number of slots a pool can have: one per encodable index.
#[expect(
    clippy::cast_lossless,
    reason = "usize::from is not const; u16 to usize never loses data"
)]
pub const MAX_CAPACITY: usize = MAX_INDEX as usize + 1;

/// Builder for creating an instance of [`HandlePool`].
///
/// Both the handle kind and the capacity must be set. They are fixed for the lifetime of the pool.
///
/// # Examples
///
/// ```
/// use handle_pool::{HandleKind, HandlePool, RawHandle};
///
/// let pool = HandlePool::<RawHandle, String>::builder()
///     .kind(HandleKind::Relay)
///     .capacity(8)
///     .build()
///     .unwrap();
///
/// assert_eq!(pool.capacity(), 8);
/// ```
#[must_use]
pub struct HandlePoolBuilder<H, T> {
    kind: HandleKind,
    capacity: usize,

    _types: PhantomData<fn() -> (H, T)>,
}

impl<H, T> fmt::Debug for HandlePoolBuilder<H, T> {
    #[cfg_attr(test, mutants::skip)] // No API contract.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlePoolBuilder")
            .field(
                "handle_type",
                &format_args!("{}", std::any::type_name::<H>()),
            )
            .field(
                "resource_type",
                &format_args!("{}", std::any::type_name::<T>()),
            )
            .field("kind", &self.kind)
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl<H: Handle, T> HandlePoolBuilder<H, T> {
    pub(crate) fn new() -> Self {
        Self {
            kind: HandleKind::Undefined,
            capacity: 0,
            _types: PhantomData,
        }
    }

    /// Sets the kind of handles the pool issues and accepts.
    pub fn kind(mut self, kind: HandleKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets the number of slots in the pool, i.e. the maximum number of resources it can track
    /// at the same time.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Builds the pool with the specified configuration.
    ///
    /// All slot storage is allocated here, once. The pool never allocates afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UndefinedKind`] if no kind (or [`HandleKind::Undefined`]) was set and
    /// [`Error::InvalidCapacity`] if the capacity is zero or exceeds [`MAX_CAPACITY`].
    pub fn build(self) -> Result<HandlePool<H, T>> {
        if !self.kind.is_defined() {
            return Err(Error::UndefinedKind);
        }

        if self.capacity == 0 || self.capacity > MAX_CAPACITY {
            return Err(Error::InvalidCapacity {
                capacity: self.capacity,
                max: MAX_CAPACITY,
            });
        }

        Ok(HandlePool::new_inner(self.kind, self.capacity))
    }
}
