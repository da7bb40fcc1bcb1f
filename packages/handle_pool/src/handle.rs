use std::fmt;

use crate::HandleKind;

/// The largest slot index that can be encoded into a handle.
pub const MAX_INDEX: u16 = 0x7fff;

const INDEX_MASK: i32 = 0xffff;
const GENERATION_SHIFT: u32 = 16;
const GENERATION_MASK: i32 = 0xff;
const TAG_SHIFT: u32 = 24;
const TAG_MASK: i32 = 0xff;
const MAX_TAG: u8 = 0x7f;

/// An opaque handle value as it crosses integer API boundaries.
///
/// The value packs three fields into an `i32`:
///
/// ```text
/// bit 31     30..24      23..16         15..0
///   [ 0 ][ kind tag ][ generation ][ slot index ]
/// ```
///
/// The pool never looks at these bits itself. It only calls [`RawHandle::encode()`] and
/// [`RawHandle::decode()`], so the layout can be reasoned about in one place.
///
/// The all-zero value is [`RawHandle::INVALID`]. No valid handle is zero because every valid
/// handle carries a non-zero kind tag.
///
/// # Examples
///
/// ```
/// use handle_pool::{HandleKind, RawHandle};
///
/// let handle = RawHandle::encode(3, HandleKind::Relay, 0);
/// assert_eq!(handle.as_raw(), (8 << 24) + 3);
///
/// assert_eq!(handle.decode(HandleKind::Relay), Some(3));
/// assert_eq!(handle.decode(HandleKind::Pwm), None);
/// ```
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[repr(transparent)]
pub struct RawHandle(i32);

impl RawHandle {
    /// The sentinel returned when no handle could be issued.
    pub const INVALID: Self = Self(0);

    /// Wraps an integer received from outside of the crate.
    ///
    /// Any value is accepted. Values that were not produced by [`encode()`][Self::encode] simply
    /// fail to decode.
    #[must_use]
    pub const fn from_raw(value: i32) -> Self {
        Self(value)
    }

    /// The integer form of the handle, for handing to callers.
    #[must_use]
    pub const fn as_raw(self) -> i32 {
        self.0
    }

    /// Packs a slot index, kind tag and slot generation into a handle.
    ///
    /// Returns [`RawHandle::INVALID`] if `index` exceeds [`MAX_INDEX`] or if `kind` cannot be
    /// encoded (i.e. it is [`HandleKind::Undefined`]).
    #[must_use]
    pub fn encode(index: u16, kind: HandleKind, generation: u8) -> Self {
        let tag = kind.tag();

        if index > MAX_INDEX || tag == 0 || tag > MAX_TAG {
            return Self::INVALID;
        }

        Self(
            (i32::from(tag) << TAG_SHIFT)
                | (i32::from(generation) << GENERATION_SHIFT)
                | i32::from(index),
        )
    }

    /// Extracts the slot index if the handle carries the tag of `expected`.
    ///
    /// A `None` result means the handle belongs to a different kind of resource (or is not a
    /// handle at all). The index is not checked against any pool capacity.
    #[must_use]
    pub fn decode(self, expected: HandleKind) -> Option<u16> {
        if !expected.is_defined() || self.tag() != expected.tag() {
            return None;
        }

        Some(self.index())
    }

    /// The slot index field, without any validation.
    #[must_use]
    pub fn index(self) -> u16 {
        // Masked to 16 bits, so the conversion cannot fail.
        u16::try_from(self.0 & INDEX_MASK).unwrap_or(u16::MAX)
    }

    /// The slot generation the handle was issued for.
    #[must_use]
    pub fn generation(self) -> u8 {
        u8::try_from((self.0 >> GENERATION_SHIFT) & GENERATION_MASK).unwrap_or(u8::MAX)
    }

    /// The kind of resource the handle refers to, if the tag is a known one.
    #[must_use]
    pub fn kind(self) -> Option<HandleKind> {
        HandleKind::from_tag(self.tag()).filter(|kind| kind.is_defined())
    }

    /// Whether this is the [`RawHandle::INVALID`] sentinel.
    #[must_use]
    pub const fn is_invalid(self) -> bool {
        self.0 == Self::INVALID.0
    }

    fn tag(self) -> u8 {
        u8::try_from((self.0 >> TAG_SHIFT) & TAG_MASK).unwrap_or(u8::MAX)
    }
}

impl fmt::Display for RawHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

impl From<RawHandle> for i32 {
    fn from(handle: RawHandle) -> Self {
        handle.as_raw()
    }
}

impl From<i32> for RawHandle {
    fn from(value: i32) -> Self {
        Self::from_raw(value)
    }
}

/// A handle representation that a [`HandlePool`][crate::HandlePool] can issue.
///
/// HAL layers typically give each family of handles its own newtype so that the compiler keeps
/// them apart at API boundaries, while the bit layout stays that of [`RawHandle`]. The pool only
/// ever converts to and from [`RawHandle`].
///
/// # Examples
///
/// ```
/// use handle_pool::{Handle, RawHandle};
///
/// #[derive(Clone, Copy, Debug, Eq, PartialEq)]
/// struct DigitalHandle(RawHandle);
///
/// impl Handle for DigitalHandle {
///     fn from_raw(raw: RawHandle) -> Self {
///         Self(raw)
///     }
///
///     fn to_raw(self) -> RawHandle {
///         self.0
///     }
/// }
///
/// assert!(DigitalHandle::invalid().is_invalid());
/// ```
pub trait Handle: Copy + Eq + fmt::Debug {
    /// Wraps a raw handle produced by the codec.
    fn from_raw(raw: RawHandle) -> Self;

    /// Unwraps the raw handle for decoding.
    fn to_raw(self) -> RawHandle;

    /// The sentinel value signaling that no handle could be issued.
    #[must_use]
    fn invalid() -> Self {
        Self::from_raw(RawHandle::INVALID)
    }

    /// Whether this is the invalid-handle sentinel.
    fn is_invalid(self) -> bool {
        self.to_raw().is_invalid()
    }
}

impl Handle for RawHandle {
    fn from_raw(raw: RawHandle) -> Self {
        raw
    }

    fn to_raw(self) -> RawHandle {
        self
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn first_generation_layout() {
        let handle = RawHandle::encode(5, HandleKind::Dio, 0);
        assert_eq!(handle.as_raw(), 0x0100_0005);

        let handle = RawHandle::encode(MAX_INDEX, HandleKind::Vendor, 0);
        assert_eq!(handle.as_raw(), 0x1100_7fff);
    }

    #[test]
    fn generation_occupies_middle_byte() {
        let handle = RawHandle::encode(2, HandleKind::Pwm, 0xab);
        assert_eq!(handle.as_raw(), 0x09ab_0002);
        assert_eq!(handle.generation(), 0xab);
        assert_eq!(handle.index(), 2);
        assert_eq!(handle.kind(), Some(HandleKind::Pwm));
    }

    #[test]
    fn index_above_max_is_invalid() {
        let handle = RawHandle::encode(MAX_INDEX + 1, HandleKind::Dio, 0);
        assert!(handle.is_invalid());

        let handle = RawHandle::encode(u16::MAX, HandleKind::Dio, 0);
        assert!(handle.is_invalid());
    }

    #[test]
    fn undefined_kind_is_invalid() {
        let handle = RawHandle::encode(0, HandleKind::Undefined, 0);
        assert!(handle.is_invalid());
        assert_eq!(handle, RawHandle::INVALID);
    }

    #[test]
    fn decode_checks_tag() {
        let handle = RawHandle::encode(7, HandleKind::Counter, 3);

        assert_eq!(handle.decode(HandleKind::Counter), Some(7));
        assert_eq!(handle.decode(HandleKind::Encoder), None);
        assert_eq!(handle.decode(HandleKind::Undefined), None);
    }

    #[test]
    fn invalid_never_decodes() {
        assert_eq!(RawHandle::INVALID.decode(HandleKind::Undefined), None);
        assert_eq!(RawHandle::INVALID.decode(HandleKind::Dio), None);
        assert_eq!(RawHandle::INVALID.kind(), None);
    }

    #[test]
    fn negative_values_never_decode() {
        let handle = RawHandle::from_raw(-1);

        assert!(!handle.is_invalid());
        assert_eq!(handle.kind(), None);
        assert_eq!(handle.decode(HandleKind::Vendor), None);
    }

    #[test]
    fn handles_differ_by_any_field() {
        let base = RawHandle::encode(1, HandleKind::Relay, 0);

        assert_ne!(base, RawHandle::encode(2, HandleKind::Relay, 0));
        assert_ne!(base, RawHandle::encode(1, HandleKind::Pwm, 0));
        assert_ne!(base, RawHandle::encode(1, HandleKind::Relay, 1));
        assert_eq!(base, RawHandle::encode(1, HandleKind::Relay, 0));
    }

    #[test]
    fn display_is_hex() {
        let handle = RawHandle::encode(1, HandleKind::Dio, 0);
        assert_eq!(handle.to_string(), "0x01000001");
    }

    #[test]
    fn raw_conversions() {
        let handle = RawHandle::from(0x0200_0004);
        assert_eq!(i32::from(handle), 0x0200_0004);
        assert_eq!(<RawHandle as Handle>::invalid(), RawHandle::INVALID);
        assert!(Handle::is_invalid(RawHandle::INVALID));
    }
}
