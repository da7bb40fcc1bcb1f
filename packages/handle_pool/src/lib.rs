#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! A fixed-capacity, thread-safe pool that maps typed integer handles to reference-counted
//! resources.
//!
//! Hardware abstraction layers expose ports, sensors and devices to their callers as small
//! integer handles while the real resource state lives behind the scenes. This crate provides
//! the registry behind such handles: [`HandlePool`].
//!
//! # Key Features
//!
//! - **Bounded memory**: the pool has a fixed number of slots, allocated once when it is built
//! - **Typed handles**: every handle carries a [`HandleKind`] tag and only resolves in a pool of
//!   that kind
//! - **Shared ownership**: resources are [`Arc`][std::sync::Arc]s, so a resource obtained via
//!   lookup stays alive even if its handle is freed concurrently
//! - **Stale handle detection**: slots carry a generation, so a freed handle does not resolve to
//!   the next resource stored in its slot
//! - **No panics on bad input**: exhaustion and invalid handles are reported through sentinel
//!   values or, with the `try_` operations, through [`Error`]
//! - **Bounded priority inversion**: all locking uses [`PriorityMutex`], which applies priority
//!   inheritance where the platform supports it
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use handle_pool::{Handle, HandleKind, HandlePool, RawHandle};
//!
//! struct AnalogInput {
//!     channel: u8,
//! }
//!
//! let pool = HandlePool::<RawHandle, AnalogInput>::new(HandleKind::AnalogInput, 8).unwrap();
//!
//! let handle = pool.allocate(Arc::new(AnalogInput { channel: 3 }));
//! assert!(!handle.is_invalid());
//!
//! // The handle is a plain integer that can cross any API boundary.
//! let raw: i32 = handle.as_raw();
//! let input = pool.get(RawHandle::from_raw(raw)).unwrap();
//! assert_eq!(input.channel, 3);
//!
//! pool.free(handle);
//! assert!(pool.get(handle).is_none());
//! ```
//!
//! # Platform support
//!
//! Priority inheritance is available on Linux, where [`PriorityMutex`] is built on PI futexes.
//! On other platforms the pool works the same but its locks do not bound priority inversion;
//! check [`PriorityMutex::PRIORITY_INHERITANCE`] if your application depends on it.
//!
//! # Logging
//!
//! The crate emits `tracing` events at `trace` level for allocations and frees and at `debug`
//! level when a pool is exhausted. It never installs a subscriber.

mod builder;
mod error;
mod handle;
mod kind;
#[cfg(target_os = "linux")]
mod pi_futex;
mod pool;
mod priority_mutex;

#[cfg_attr(
    target_os = "linux",
    allow(dead_code, reason = "only used as the lock on platforms without PI futexes")
)]
mod park_lock;

pub use builder::*;
pub use error::*;
pub use handle::*;
pub use kind::*;
pub use pool::*;
pub use priority_mutex::*;
