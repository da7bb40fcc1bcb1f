//! Integration tests for the `handle_pool` package.
//!
//! These tests exercise the public API the way a hardware abstraction layer would: typed handle
//! newtypes, several pools side by side and handles crossing integer boundaries.

use std::sync::Arc;

use handle_pool::{Error, Handle, HandleKind, HandlePool, RawHandle};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct DigitalHandle(RawHandle);

impl Handle for DigitalHandle {
    fn from_raw(raw: RawHandle) -> Self {
        Self(raw)
    }

    fn to_raw(self) -> RawHandle {
        self.0
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct EncoderHandle(RawHandle);

impl Handle for EncoderHandle {
    fn from_raw(raw: RawHandle) -> Self {
        Self(raw)
    }

    fn to_raw(self) -> RawHandle {
        self.0
    }
}

#[derive(Debug, PartialEq)]
struct DigitalPort {
    channel: u8,
}

#[derive(Debug, PartialEq)]
struct Encoder {
    a_channel: u8,
    b_channel: u8,
}

#[test]
fn two_slot_walkthrough() {
    let pool = HandlePool::<RawHandle, &str>::new(HandleKind::Dio, 2).unwrap();

    let h1 = pool.allocate(Arc::new("A"));
    let h2 = pool.allocate(Arc::new("B"));
    assert_eq!(h1.decode(HandleKind::Dio), Some(0));
    assert_eq!(h2.decode(HandleKind::Dio), Some(1));

    assert!(pool.allocate(Arc::new("C")).is_invalid());

    pool.free(h1);
    let h3 = pool.allocate(Arc::new("C"));
    assert_eq!(h3.decode(HandleKind::Dio), Some(0));

    assert!(pool.get(h1).is_none());
    assert_eq!(*pool.get(h3).unwrap(), "C");
    assert_eq!(*pool.get(h2).unwrap(), "B");
}

#[test]
fn exhaustion_does_not_alter_existing_slots() {
    let pool = HandlePool::<DigitalHandle, DigitalPort>::new(HandleKind::Dio, 4).unwrap();

    let ports = (0..4)
        .map(|channel| Arc::new(DigitalPort { channel }))
        .collect::<Vec<_>>();
    let handles = ports
        .iter()
        .map(|port| pool.allocate(Arc::clone(port)))
        .collect::<Vec<_>>();

    assert!(pool.allocate(Arc::new(DigitalPort { channel: 99 })).is_invalid());

    for (port, handle) in ports.iter().zip(&handles) {
        assert!(Arc::ptr_eq(port, &pool.get(*handle).unwrap()));
    }
}

#[test]
fn pools_of_different_kinds_reject_each_others_handles() {
    let digital = HandlePool::<DigitalHandle, DigitalPort>::new(HandleKind::Dio, 4).unwrap();
    let encoders = HandlePool::<EncoderHandle, Encoder>::new(HandleKind::Encoder, 4).unwrap();

    let port = digital.allocate(Arc::new(DigitalPort { channel: 1 }));
    let encoder = encoders.allocate(Arc::new(Encoder {
        a_channel: 2,
        b_channel: 3,
    }));

    // Both sit at index 0 in their pools.
    assert_eq!(port.to_raw().index(), encoder.to_raw().index());

    let smuggled = DigitalHandle::from_raw(encoder.to_raw());
    assert!(digital.get(smuggled).is_none());
    assert!(matches!(
        digital.try_get(smuggled),
        Err(Error::InvalidHandle {
            kind: HandleKind::Dio,
            ..
        })
    ));

    digital.free(smuggled);
    assert_eq!(digital.get(port).unwrap().channel, 1);
    assert_eq!(encoders.get(encoder).unwrap().b_channel, 3);
}

#[test]
fn handle_survives_integer_round_trip() {
    let pool = HandlePool::<DigitalHandle, DigitalPort>::new(HandleKind::Dio, 2).unwrap();

    let handle = pool.allocate(Arc::new(DigitalPort { channel: 7 }));
    let raw: i32 = handle.to_raw().into();

    let restored = DigitalHandle::from_raw(RawHandle::from_raw(raw));
    assert_eq!(restored, handle);
    assert_eq!(pool.get(restored).unwrap().channel, 7);
}

#[test]
fn arbitrary_integers_never_resolve() {
    let pool = HandlePool::<RawHandle, u32>::new(HandleKind::Pwm, 8).unwrap();
    for value in 0..8 {
        pool.allocate(Arc::new(value));
    }

    for raw in [0, 1, -1, i32::MIN, i32::MAX, 0x0100_0000, 0x0a00_0000, 0x0900_0008] {
        let handle = RawHandle::from_raw(raw);

        assert!(pool.get(handle).is_none(), "{handle} resolved");
        pool.free(handle);
    }

    assert_eq!(pool.len(), 8);
}

#[test]
fn error_kinds_are_distinguishable() {
    let pool = HandlePool::<RawHandle, u32>::new(HandleKind::Relay, 1).unwrap();

    let handle = pool.try_allocate(Arc::new(1)).unwrap();
    assert!(matches!(
        pool.try_allocate(Arc::new(2)),
        Err(Error::Exhausted { capacity: 1, .. })
    ));

    pool.free(handle);
    assert!(matches!(
        pool.try_get(handle),
        Err(Error::StaleHandle { handle: stale }) if stale == handle
    ));

    assert!(matches!(
        pool.try_get(RawHandle::INVALID),
        Err(Error::InvalidHandle { .. })
    ));
}

#[test]
fn undefined_kind_cannot_build() {
    let result = HandlePool::<RawHandle, u32>::new(HandleKind::Undefined, 4);
    assert!(matches!(result, Err(Error::UndefinedKind)));
}
