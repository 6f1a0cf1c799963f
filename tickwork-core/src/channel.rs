//! Capability-resolved channels
//!
//! A slot attached to a hardware channel asks the board once what the channel
//! can do and keeps the answer as one of a small closed set of variants.

use tickwork_hal::{ChannelId, ChannelIo, ChannelMode};

/// Readable channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InputChannel {
    /// Logic level, reads as 0 or 1
    Digital(ChannelId),
    /// ADC input, reads as the raw conversion
    Analog(ChannelId),
}

impl InputChannel {
    /// Configure `id` as an input and resolve its kind
    pub fn attach<IO: ChannelIo>(io: &mut IO, id: ChannelId, mode: ChannelMode) -> Self {
        io.configure_channel(id, mode);
        if io.capabilities(id).analog_input {
            InputChannel::Analog(id)
        } else {
            InputChannel::Digital(id)
        }
    }

    /// Hardware channel number
    pub fn id(&self) -> ChannelId {
        match *self {
            InputChannel::Digital(id) | InputChannel::Analog(id) => id,
        }
    }

    /// Check if reads go through the ADC
    pub fn is_analog(&self) -> bool {
        matches!(self, InputChannel::Analog(_))
    }

    /// Take a single reading
    pub fn read<IO: ChannelIo>(&self, io: &mut IO) -> i32 {
        match *self {
            InputChannel::Digital(id) => i32::from(io.read_digital(id)),
            InputChannel::Analog(id) => i32::from(io.read_analog(id)),
        }
    }
}

/// Writable channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutputChannel {
    /// Logic level output
    Digital(ChannelId),
    /// Output that can also take a PWM duty cycle
    Pwm(ChannelId),
}

impl OutputChannel {
    /// Configure `id` as an output and resolve its kind
    pub fn attach<IO: ChannelIo>(io: &mut IO, id: ChannelId) -> Self {
        io.configure_channel(id, ChannelMode::Output);
        if io.capabilities(id).pwm_output {
            OutputChannel::Pwm(id)
        } else {
            OutputChannel::Digital(id)
        }
    }

    /// Hardware channel number
    pub fn id(&self) -> ChannelId {
        match *self {
            OutputChannel::Digital(id) | OutputChannel::Pwm(id) => id,
        }
    }

    /// Check if duty cycles can be written
    pub fn has_pwm(&self) -> bool {
        matches!(self, OutputChannel::Pwm(_))
    }

    /// Drive the channel high or low
    pub fn write_level<IO: ChannelIo>(&self, io: &mut IO, high: bool) {
        io.write_digital(self.id(), high);
    }

    /// Write a duty cycle
    ///
    /// On a digital channel any non-zero duty drives the output high.
    pub fn write_duty<IO: ChannelIo>(&self, io: &mut IO, duty: u16) {
        match *self {
            OutputChannel::Pwm(id) => io.write_pwm(id, duty),
            OutputChannel::Digital(id) => io.write_digital(id, duty > 0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::SimBoard;
    use tickwork_hal::Capabilities;

    #[test]
    fn test_input_resolves_kind() {
        let mut board = SimBoard::<4>::new();
        board.set_capabilities(1, Capabilities::ANALOG);

        assert_eq!(
            InputChannel::attach(&mut board, 0, ChannelMode::InputPullUp),
            InputChannel::Digital(0)
        );
        assert_eq!(
            InputChannel::attach(&mut board, 1, ChannelMode::Input),
            InputChannel::Analog(1)
        );
        assert_eq!(board.mode(0), Some(ChannelMode::InputPullUp));
    }

    #[test]
    fn test_input_reads() {
        let mut board = SimBoard::<4>::new();
        board.set_capabilities(1, Capabilities::ANALOG);
        board.set_input(0, 1);
        board.set_input(1, 812);

        let digital = InputChannel::attach(&mut board, 0, ChannelMode::Input);
        let analog = InputChannel::attach(&mut board, 1, ChannelMode::Input);
        assert_eq!(digital.read(&mut board), 1);
        assert_eq!(analog.read(&mut board), 812);
    }

    #[test]
    fn test_output_duty_on_digital() {
        let mut board = SimBoard::<4>::new();
        let out = OutputChannel::attach(&mut board, 2);
        assert!(!out.has_pwm());

        out.write_duty(&mut board, 128);
        assert_eq!(board.output(2), 1);
        out.write_duty(&mut board, 0);
        assert_eq!(board.output(2), 0);
    }
}
