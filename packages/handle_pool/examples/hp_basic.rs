//! Basic usage of the `handle_pool` crate:
//!
//! * Creating a pool for one kind of hardware resource.
//! * Allocating handles.
//! * Looking up resources by handle.
//! * Freeing handles and what happens to handles that outlive their resource.

use std::sync::Arc;

use handle_pool::{HandleKind, HandlePool, RawHandle};

#[derive(Debug)]
struct DigitalPort {
    channel: u8,
}

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .init();

    // The pool has room for exactly two digital ports. It never grows.
    let pool = HandlePool::<RawHandle, DigitalPort>::new(HandleKind::Dio, 2)
        .expect("Dio with two slots is a valid configuration");

    let first = pool.allocate(Arc::new(DigitalPort { channel: 0 }));
    let second = pool.allocate(Arc::new(DigitalPort { channel: 1 }));
    println!("Allocated handles {first} and {second}");

    // A third allocation does not fit and yields the invalid-handle sentinel.
    let third = pool.allocate(Arc::new(DigitalPort { channel: 2 }));
    println!("Third allocation is invalid: {}", third.is_invalid());

    // Lookups return a shared reference that stays valid even after the handle is freed.
    let port = pool.get(first).expect("first handle was just allocated");
    pool.free(first);
    println!("Still holding port on channel {} after freeing its handle", port.channel);

    // The freed slot is reused, but the stale handle does not resolve to the new resource.
    let reused = pool.allocate(Arc::new(DigitalPort { channel: 2 }));
    println!(
        "Reused slot {} with handle {reused}; stale handle {first} resolves to {:?}",
        reused.index(),
        pool.get(first)
    );

    println!("{pool:?}");
}
