use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::{Error, Handle, HandleKind, HandlePoolBuilder, PriorityMutex, RawHandle, Result};

/// A fixed-capacity pool that maps typed integer handles to reference-counted resources.
///
/// Hardware abstraction layers hand out handles instead of references so that callers across
/// integer API boundaries can refer to ports, sensors and devices cheaply. The pool keeps one
/// [`Arc<T>`] per occupied slot and gives out clones of it on lookup.
///
/// The pool has a fixed number of slots chosen at build time. Each slot holds either nothing or
/// one resource. Handles are issued for the lowest free slot and carry the pool's
/// [`HandleKind`], so a handle issued by a pool of another kind never resolves here.
///
/// # Failure handling
///
/// Nothing in the pool panics on bad input. The primary operations use sentinel values, the way
/// integer-based HAL APIs expect them:
///
/// * [`allocate()`][1] returns [`Handle::invalid()`] when all slots are occupied.
/// * [`get()`][2] returns `None` for handles of another kind, out of range or already freed.
/// * [`free()`][3] ignores such handles.
///
/// The [`try_allocate()`][4] and [`try_get()`][5] variants report the reason as an [`Error`].
///
/// # Thread safety
///
/// All operations take `&self` and may be called from any thread. Two layers of
/// [`PriorityMutex`] protect the pool: one allocation lock, held while searching for a free
/// slot and while clearing a slot, and one lock per slot, held while reading or writing that
/// slot. The allocation lock is always acquired before any slot lock.
///
/// Lookups only take the lock of the slot they read, so they do not wait for allocations or
/// frees of other slots. A lookup racing a free of the same handle returns either the resource
/// or `None`; a returned [`Arc<T>`] keeps the resource alive regardless of what happens to the
/// slot afterwards.
///
/// # Handle reuse
///
/// Each slot has an 8-bit generation that advances whenever the slot is cleared. A handle
/// remembers the generation it was issued for, so a freed handle does not resolve to a later
/// resource that reuses its slot, at least until the generation wraps around after 256 reuses.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
///
/// use handle_pool::{Handle, HandleKind, HandlePool, RawHandle};
///
/// let pool = HandlePool::<RawHandle, &str>::new(HandleKind::Dio, 2).unwrap();
///
/// let a = pool.allocate(Arc::new("A"));
/// let b = pool.allocate(Arc::new("B"));
/// assert!(pool.allocate(Arc::new("C")).is_invalid());
///
/// pool.free(a);
/// let c = pool.allocate(Arc::new("C"));
///
/// assert_eq!(c.index(), 0);
/// assert!(pool.get(a).is_none());
/// assert_eq!(*pool.get(b).unwrap(), "B");
/// assert_eq!(*pool.get(c).unwrap(), "C");
/// ```
///
/// [1]: Self::allocate
/// [2]: Self::get
/// [3]: Self::free
/// [4]: Self::try_allocate
/// [5]: Self::try_get
pub struct HandlePool<H, T> {
    kind: HandleKind,

    /// Which slots hold a resource. Only read or written under the allocation lock, which lets
    /// the free slot search run without touching any slot lock.
    occupancy: PriorityMutex<Occupancy>,

    /// One entry per slot, allocated once when the pool is built.
    slots: Box<[PriorityMutex<Slot<T>>]>,

    _handle: PhantomData<fn() -> H>,
}

struct Occupancy {
    occupied: Box<[bool]>,
    count: usize,
}

impl Occupancy {
    fn first_vacant(&self) -> Option<u16> {
        self.occupied
            .iter()
            .position(|occupied| !occupied)
            .and_then(|index| u16::try_from(index).ok())
    }

    fn set(&mut self, index: u16, occupied: bool) {
        if let Some(entry) = self.occupied.get_mut(usize::from(index)) {
            if *entry != occupied {
                *entry = occupied;

                if occupied {
                    self.count = self.count.wrapping_add(1);
                } else {
                    self.count = self.count.wrapping_sub(1);
                }
            }
        }
    }
}

struct Slot<T> {
    resource: Option<Arc<T>>,
    generation: u8,
}

impl<T> Slot<T> {
    const fn empty() -> Self {
        Self {
            resource: None,
            generation: 0,
        }
    }

    /// Removes the resource, retiring all handles issued for it.
    fn clear(&mut self) -> Option<Arc<T>> {
        let resource = self.resource.take();

        if resource.is_some() {
            self.generation = self.generation.wrapping_add(1);
        }

        resource
    }
}

/// A decoded handle that addresses a slot of this pool.
#[derive(Clone, Copy)]
struct SlotRef {
    index: u16,
    generation: u8,
}

impl<H: Handle, T> HandlePool<H, T> {
    /// Creates a pool issuing handles of `kind`, with room for `capacity` resources.
    ///
    /// Shorthand for [`builder()`][Self::builder] with both settings applied.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UndefinedKind`] for [`HandleKind::Undefined`] and
    /// [`Error::InvalidCapacity`] if `capacity` is zero or exceeds
    /// [`MAX_CAPACITY`][crate::MAX_CAPACITY].
    pub fn new(kind: HandleKind, capacity: usize) -> Result<Self> {
        Self::builder().kind(kind).capacity(capacity).build()
    }

    /// Starts building a new [`HandlePool`].
    pub fn builder() -> HandlePoolBuilder<H, T> {
        HandlePoolBuilder::new()
    }

    pub(crate) fn new_inner(kind: HandleKind, capacity: usize) -> Self {
        Self {
            kind,
            occupancy: PriorityMutex::new(Occupancy {
                occupied: vec![false; capacity].into_boxed_slice(),
                count: 0,
            }),
            slots: (0..capacity)
                .map(|_| PriorityMutex::new(Slot::empty()))
                .collect(),
            _handle: PhantomData,
        }
    }

    /// The number of slots in the pool.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// The kind of handles this pool issues and accepts.
    #[must_use]
    pub fn kind(&self) -> HandleKind {
        self.kind
    }

    /// The number of occupied slots.
    ///
    /// Under concurrent use this is a snapshot that may be outdated by the time it is returned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.occupancy.lock().count
    }

    /// Whether no slot is occupied. A snapshot, like [`len()`][Self::len].
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stores `resource` in the lowest free slot and returns a handle to it.
    ///
    /// Returns [`Handle::invalid()`] without modifying the pool if every slot is occupied. The
    /// pool's reference to a rejected resource is dropped immediately; the caller's own clones
    /// are unaffected.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::sync::Arc;
    ///
    /// use handle_pool::{Handle, HandleKind, HandlePool, RawHandle};
    ///
    /// let pool = HandlePool::<RawHandle, u32>::new(HandleKind::Counter, 1).unwrap();
    ///
    /// let handle = pool.allocate(Arc::new(42));
    /// assert!(!handle.is_invalid());
    ///
    /// let overflow = pool.allocate(Arc::new(43));
    /// assert!(overflow.is_invalid());
    /// ```
    pub fn allocate(&self, resource: Arc<T>) -> H {
        self.try_allocate(resource).unwrap_or_else(|_| H::invalid())
    }

    /// Stores `resource` in the lowest free slot and returns a handle to it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Exhausted`] if every slot is occupied. The pool is not modified.
    pub fn try_allocate(&self, resource: Arc<T>) -> Result<H> {
        // Held for the whole search so that two allocations cannot pick the same slot.
        let mut occupancy = self.occupancy.lock();

        let Some(index) = occupancy.first_vacant() else {
            debug!(kind = %self.kind, capacity = self.capacity(), "handle pool exhausted");

            return Err(Error::Exhausted {
                kind: self.kind,
                capacity: self.capacity(),
            });
        };

        let Some(slot) = self.slots.get(usize::from(index)) else {
            // Occupancy and slots are built with the same length, so this is unreachable.
            return Err(Error::Exhausted {
                kind: self.kind,
                capacity: self.capacity(),
            });
        };

        let generation = {
            let mut slot = slot.lock();
            slot.resource = Some(resource);
            slot.generation
        };

        occupancy.set(index, true);
        drop(occupancy);

        trace!(kind = %self.kind, index, generation, "allocated handle");

        Ok(H::from_raw(RawHandle::encode(index, self.kind, generation)))
    }

    /// Looks up the resource that `handle` refers to.
    ///
    /// Returns `None` if the handle is of another kind, outside the pool's capacity, or refers to
    /// a slot that has been freed. None of these is a fault; they are the normal way of telling
    /// the caller that the handle does not (or no longer) name a resource.
    ///
    /// The returned [`Arc<T>`] keeps the resource alive even if another thread frees the handle
    /// immediately afterwards.
    #[must_use]
    pub fn get(&self, handle: H) -> Option<Arc<T>> {
        self.try_get(handle).ok()
    }

    /// Looks up the resource that `handle` refers to.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHandle`] if the handle is of another kind or outside the pool's
    /// capacity and [`Error::StaleHandle`] if its slot has been freed since it was issued.
    pub fn try_get(&self, handle: H) -> Result<Arc<T>> {
        let raw = handle.to_raw();
        let (slot_ref, slot) = self.resolve(raw)?;

        let slot = slot.lock();

        match &slot.resource {
            Some(resource) if slot.generation == slot_ref.generation => Ok(Arc::clone(resource)),
            _ => Err(Error::StaleHandle { handle: raw }),
        }
    }

    /// Whether `handle` currently refers to a resource in this pool.
    #[must_use]
    pub fn is_allocated(&self, handle: H) -> bool {
        self.try_get(handle).is_ok()
    }

    /// Releases the pool's reference to the resource that `handle` refers to.
    ///
    /// Handles of another kind, outside the pool's capacity or already freed are ignored. The
    /// resource itself is only dropped once every clone obtained via [`get()`][Self::get] has
    /// been dropped as well.
    pub fn free(&self, handle: H) {
        drop(self.take(handle));
    }

    /// Removes the resource that `handle` refers to and returns the pool's reference to it.
    ///
    /// Behaves like [`free()`][Self::free] except that the reference is handed to the caller
    /// instead of being dropped. Returns `None` wherever [`free()`][Self::free] would do nothing.
    #[must_use = "use free() if the resource is not needed"]
    pub fn take(&self, handle: H) -> Option<Arc<T>> {
        let (slot_ref, slot) = self.resolve(handle.to_raw()).ok()?;

        // Same order as in allocation: the allocation lock first, then the slot lock.
        let mut occupancy = self.occupancy.lock();
        let mut slot = slot.lock();

        if slot.generation != slot_ref.generation {
            return None;
        }

        let resource = slot.clear()?;
        occupancy.set(slot_ref.index, false);

        trace!(kind = %self.kind, index = slot_ref.index, "freed handle");

        Some(resource)
    }

    /// Frees every slot, invalidating all handles issued so far.
    ///
    /// Meant for harnesses that reinitialize a hardware abstraction layer between simulation
    /// runs or tests. Resources stay alive while callers hold clones of them.
    pub fn reset(&self) {
        let mut retired = Vec::new();

        {
            let mut occupancy = self.occupancy.lock();

            for (index, slot) in (0..=u16::MAX).zip(self.slots.iter()) {
                if let Some(resource) = slot.lock().clear() {
                    retired.push(resource);
                    occupancy.set(index, false);
                }
            }
        }

        trace!(kind = %self.kind, freed = retired.len(), "reset handle pool");

        // Resources are dropped here, outside of any lock.
        drop(retired);
    }

    fn resolve(&self, handle: RawHandle) -> Result<(SlotRef, &PriorityMutex<Slot<T>>)> {
        let invalid = || Error::InvalidHandle {
            handle,
            kind: self.kind,
        };

        let index = handle.decode(self.kind).ok_or_else(invalid)?;
        let slot = self.slots.get(usize::from(index)).ok_or_else(invalid)?;

        Ok((
            SlotRef {
                index,
                generation: handle.generation(),
            },
            slot,
        ))
    }
}

impl<H, T> fmt::Debug for HandlePool<H, T> {
    #[cfg_attr(test, mutants::skip)] // No API contract.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("kind", &self.kind)
            .field("capacity", &self.slots.len())
            .field("len", &self.occupancy.lock().count)
            .finish_non_exhaustive()
    }
}
