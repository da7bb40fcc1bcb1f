use std::fmt;

/// The type tag stored in a handle, identifying which family of resources the handle belongs to.
///
/// Every [`HandlePool`][crate::HandlePool] is configured with exactly one kind and only resolves
/// handles that carry the same tag. A digital I/O handle can therefore never be used to look up
/// an encoder, even if both happen to sit at the same slot index in their respective pools.
///
/// [`HandleKind::Undefined`] exists so that a zero tag has a name. It can never be used to issue
/// handles, which is what makes the all-zero [`RawHandle::INVALID`][crate::RawHandle::INVALID]
/// distinguishable from every valid handle.
///
/// # Examples
///
/// ```
/// use handle_pool::HandleKind;
///
/// assert_eq!(HandleKind::Encoder.tag(), 13);
/// assert_eq!(HandleKind::from_tag(13), Some(HandleKind::Encoder));
/// assert!(!HandleKind::Undefined.is_defined());
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[non_exhaustive]
#[repr(u8)]
pub enum HandleKind {
    /// No kind. Pools cannot be built with this kind.
    #[default]
    Undefined = 0,
    /// Digital input/output channel.
    Dio = 1,
    /// Generic hardware port.
    Port = 2,
    /// Timed notifier.
    Notifier = 3,
    /// Interrupt source.
    Interrupt = 4,
    /// Analog output channel.
    AnalogOutput = 5,
    /// Analog input channel.
    AnalogInput = 6,
    /// Analog trigger.
    AnalogTrigger = 7,
    /// Relay channel.
    Relay = 8,
    /// PWM output.
    Pwm = 9,
    /// PWM generated on a digital output.
    DigitalPwm = 10,
    /// Pulse counter.
    Counter = 11,
    /// Encoder decoded in FPGA fabric.
    FpgaEncoder = 12,
    /// Encoder, backed either by FPGA fabric or by a counter.
    Encoder = 13,
    /// Pneumatic compressor.
    Compressor = 14,
    /// Pneumatic solenoid.
    Solenoid = 15,
    /// Analog gyroscope.
    AnalogGyro = 16,
    /// Resources defined outside of the built-in families.
    Vendor = 17,
}

const ALL_KINDS: [HandleKind; 18] = [
    HandleKind::Undefined,
    HandleKind::Dio,
    HandleKind::Port,
    HandleKind::Notifier,
    HandleKind::Interrupt,
    HandleKind::AnalogOutput,
    HandleKind::AnalogInput,
    HandleKind::AnalogTrigger,
    HandleKind::Relay,
    HandleKind::Pwm,
    HandleKind::DigitalPwm,
    HandleKind::Counter,
    HandleKind::FpgaEncoder,
    HandleKind::Encoder,
    HandleKind::Compressor,
    HandleKind::Solenoid,
    HandleKind::AnalogGyro,
    HandleKind::Vendor,
];

impl HandleKind {
    /// The tag value encoded into handles of this kind.
    #[must_use]
    pub const fn tag(self) -> u8 {
        self as u8
    }

    /// Looks up the kind with the given tag, if any.
    #[must_use]
    pub fn from_tag(tag: u8) -> Option<Self> {
        ALL_KINDS.into_iter().find(|kind| kind.tag() == tag)
    }

    /// Whether handles of this kind can be issued. Only [`HandleKind::Undefined`] cannot.
    #[must_use]
    pub const fn is_defined(self) -> bool {
        !matches!(self, Self::Undefined)
    }

    const fn name(self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Dio => "dio",
            Self::Port => "port",
            Self::Notifier => "notifier",
            Self::Interrupt => "interrupt",
            Self::AnalogOutput => "analog_output",
            Self::AnalogInput => "analog_input",
            Self::AnalogTrigger => "analog_trigger",
            Self::Relay => "relay",
            Self::Pwm => "pwm",
            Self::DigitalPwm => "digital_pwm",
            Self::Counter => "counter",
            Self::FpgaEncoder => "fpga_encoder",
            Self::Encoder => "encoder",
            Self::Compressor => "compressor",
            Self::Solenoid => "solenoid",
            Self::AnalogGyro => "analog_gyro",
            Self::Vendor => "vendor",
        }
    }
}

impl fmt::Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn tags_are_unique_and_round_trip() {
        for (expected_tag, kind) in ALL_KINDS.into_iter().enumerate() {
            assert_eq!(usize::from(kind.tag()), expected_tag);
            assert_eq!(HandleKind::from_tag(kind.tag()), Some(kind));
        }
    }

    #[test]
    fn unknown_tag_is_none() {
        assert_eq!(HandleKind::from_tag(18), None);
        assert_eq!(HandleKind::from_tag(127), None);
        assert_eq!(HandleKind::from_tag(u8::MAX), None);
    }

    #[test]
    fn only_undefined_is_undefined() {
        assert!(!HandleKind::Undefined.is_defined());
        assert!(ALL_KINDS.iter().skip(1).all(|kind| kind.is_defined()));
        assert_eq!(HandleKind::default(), HandleKind::Undefined);
    }

    #[test]
    fn display_uses_snake_case_names() {
        assert_eq!(HandleKind::AnalogInput.to_string(), "analog_input");
        assert_eq!(HandleKind::Pwm.to_string(), "pwm");
    }
}
