//! Channel I/O abstractions
//!
//! A channel is a numbered hardware signal (a pin, an ADC input, a PWM
//! output). The engine resolves what a channel can do once, when a slot is
//! attached to it, and afterwards only uses the matching read/write call.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Hardware channel number
pub type ChannelId = u8;

/// Electrical mode of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ChannelMode {
    /// Floating input
    #[default]
    Input,
    /// Input with internal pull-up enabled
    InputPullUp,
    /// Push-pull output
    Output,
}

impl ChannelMode {
    /// Check if this mode reads a signal
    pub fn is_input(&self) -> bool {
        matches!(self, ChannelMode::Input | ChannelMode::InputPullUp)
    }
}

/// What a channel supports beyond plain digital I/O
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Capabilities {
    /// Channel can be sampled through the ADC
    pub analog_input: bool,
    /// Channel can output a PWM duty cycle
    pub pwm_output: bool,
}

impl Capabilities {
    /// Digital-only channel
    pub const DIGITAL: Self = Self {
        analog_input: false,
        pwm_output: false,
    };

    /// Analog input channel
    pub const ANALOG: Self = Self {
        analog_input: true,
        pwm_output: false,
    };

    /// PWM-capable output channel
    pub const PWM: Self = Self {
        analog_input: false,
        pwm_output: true,
    };
}

/// Channel I/O provided by the board
///
/// Implementations map channel ids onto real peripherals. Reads and writes
/// on an unknown channel should be ignored (reads return low / zero).
pub trait ChannelIo {
    /// Set the electrical mode of a channel
    fn configure_channel(&mut self, id: ChannelId, mode: ChannelMode);

    /// Report what a channel supports
    fn capabilities(&self, id: ChannelId) -> Capabilities;

    /// Read the logic level of a channel
    fn read_digital(&mut self, id: ChannelId) -> bool;

    /// Sample a channel through the ADC
    ///
    /// Takes `&mut self` because ADC conversions require mutable access.
    fn read_analog(&mut self, id: ChannelId) -> u16;

    /// Drive a channel high or low
    fn write_digital(&mut self, id: ChannelId, high: bool);

    /// Set the PWM duty cycle of a channel
    fn write_pwm(&mut self, id: ChannelId, duty: u16);
}

// Allow passing `&mut board` where a `ChannelIo` is expected
impl<T: ChannelIo + ?Sized> ChannelIo for &mut T {
    fn configure_channel(&mut self, id: ChannelId, mode: ChannelMode) {
        (**self).configure_channel(id, mode)
    }

    fn capabilities(&self, id: ChannelId) -> Capabilities {
        (**self).capabilities(id)
    }

    fn read_digital(&mut self, id: ChannelId) -> bool {
        (**self).read_digital(id)
    }

    fn read_analog(&mut self, id: ChannelId) -> u16 {
        (**self).read_analog(id)
    }

    fn write_digital(&mut self, id: ChannelId, high: bool) {
        (**self).write_digital(id, high)
    }

    fn write_pwm(&mut self, id: ChannelId, duty: u16) {
        (**self).write_pwm(id, duty)
    }
}
