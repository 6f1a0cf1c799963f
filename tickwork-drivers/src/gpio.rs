//! `embedded-hal` digital pins as engine channels
//!
//! [`GpioChannels`] owns a set of input pins and a set of output pins and
//! numbers them as channels: inputs first (`0..I`), outputs after
//! (`I..I + O`). Pin modes are fixed by the HAL pin types, so
//! `configure_channel` only records the requested mode.
//!
//! ```ignore
//! let buttons = [btn_a.degrade(), btn_b.degrade()];
//! let leds = [led.degrade()];
//! let mut board = GpioChannels::new(buttons, leds);
//!
//! // channel 0, 1: buttons; channel 2: LED
//! waves.attach(0, &mut board, 2)?;
//! ```

use embedded_hal::digital::{InputPin, PinState, StatefulOutputPin};
use tickwork_core::{Capabilities, ChannelId, ChannelIo, ChannelMode};

/// Digital pins mapped onto channel ids
pub struct GpioChannels<IP, OP, const I: usize, const O: usize> {
    inputs: [IP; I],
    outputs: [OP; O],
    modes: [ChannelMode; I],
}

enum Pin {
    Input(usize),
    Output(usize),
}

impl<IP, OP, const I: usize, const O: usize> GpioChannels<IP, OP, I, O>
where
    IP: InputPin,
    OP: StatefulOutputPin,
{
    pub fn new(inputs: [IP; I], outputs: [OP; O]) -> Self {
        Self {
            inputs,
            outputs,
            modes: [ChannelMode::Input; I],
        }
    }

    /// Give the pins back
    pub fn release(self) -> ([IP; I], [OP; O]) {
        (self.inputs, self.outputs)
    }

    /// Mode last requested for an input channel
    pub fn mode(&self, id: ChannelId) -> Option<ChannelMode> {
        self.modes.get(usize::from(id)).copied()
    }

    pub fn input_mut(&mut self, index: usize) -> Option<&mut IP> {
        self.inputs.get_mut(index)
    }

    pub fn output_mut(&mut self, index: usize) -> Option<&mut OP> {
        self.outputs.get_mut(index)
    }

    fn pin(id: ChannelId) -> Option<Pin> {
        let id = usize::from(id);
        if id < I {
            Some(Pin::Input(id))
        } else if id - I < O {
            Some(Pin::Output(id - I))
        } else {
            None
        }
    }
}

impl<IP, OP, const I: usize, const O: usize> ChannelIo for GpioChannels<IP, OP, I, O>
where
    IP: InputPin,
    OP: StatefulOutputPin,
{
    fn configure_channel(&mut self, id: ChannelId, mode: ChannelMode) {
        if let Some(slot) = self.modes.get_mut(usize::from(id)) {
            *slot = mode;
        }
    }

    fn capabilities(&self, _id: ChannelId) -> Capabilities {
        Capabilities::DIGITAL
    }

    fn read_digital(&mut self, id: ChannelId) -> bool {
        let level = match Self::pin(id) {
            Some(Pin::Input(i)) => self.inputs.get_mut(i).and_then(|p| p.is_high().ok()),
            Some(Pin::Output(o)) => self.outputs.get_mut(o).and_then(|p| p.is_set_high().ok()),
            None => None,
        };
        // Pin errors read as low
        level.unwrap_or(false)
    }

    fn read_analog(&mut self, id: ChannelId) -> u16 {
        u16::from(self.read_digital(id))
    }

    fn write_digital(&mut self, id: ChannelId, high: bool) {
        if let Some(pin) = Self::pin(id).and_then(|p| match p {
            Pin::Output(o) => self.outputs.get_mut(o),
            Pin::Input(_) => None,
        }) {
            let _ = pin.set_state(PinState::from(high));
        }
    }

    fn write_pwm(&mut self, id: ChannelId, duty: u16) {
        self.write_digital(id, duty > 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use embedded_hal::digital::{ErrorType, OutputPin};
    use tickwork_core::waveform::WaveformGenerator;
    use tickwork_core::EngineConfig;

    #[derive(Default)]
    struct TestInput {
        high: bool,
    }

    impl ErrorType for TestInput {
        type Error = Infallible;
    }

    impl InputPin for TestInput {
        fn is_high(&mut self) -> Result<bool, Infallible> {
            Ok(self.high)
        }

        fn is_low(&mut self) -> Result<bool, Infallible> {
            Ok(!self.high)
        }
    }

    #[derive(Default)]
    struct TestOutput {
        high: bool,
        toggles: u32,
    }

    impl ErrorType for TestOutput {
        type Error = Infallible;
    }

    impl OutputPin for TestOutput {
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.toggles += u32::from(self.high);
            self.high = false;
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            self.toggles += u32::from(!self.high);
            self.high = true;
            Ok(())
        }
    }

    impl StatefulOutputPin for TestOutput {
        fn is_set_high(&mut self) -> Result<bool, Infallible> {
            Ok(self.high)
        }

        fn is_set_low(&mut self) -> Result<bool, Infallible> {
            Ok(!self.high)
        }
    }

    type Board = GpioChannels<TestInput, TestOutput, 2, 1>;

    fn board() -> Board {
        GpioChannels::new(Default::default(), Default::default())
    }

    #[test]
    fn test_channel_numbering() {
        let mut board = board();
        if let Some(pin) = board.input_mut(1) {
            pin.high = true;
        }
        assert!(!board.read_digital(0));
        assert!(board.read_digital(1));

        board.write_digital(2, true);
        assert!(board.read_digital(2));
        assert_eq!(board.read_analog(2), 1);

        // Out of range
        board.write_digital(3, true);
        assert!(!board.read_digital(3));
    }

    #[test]
    fn test_inputs_ignore_writes() {
        let mut board = board();
        board.write_digital(0, true);
        assert!(!board.read_digital(0));
    }

    #[test]
    fn test_mode_recorded() {
        let mut board = board();
        board.configure_channel(1, ChannelMode::InputPullUp);
        assert_eq!(board.mode(1), Some(ChannelMode::InputPullUp));
        assert_eq!(board.mode(2), None);
    }

    #[test]
    fn test_drives_pulse() {
        let mut board = board();
        let mut waves: WaveformGenerator<1> = WaveformGenerator::new(1, &EngineConfig::default(), ());
        waves.attach(0, &mut board, 2).unwrap();
        waves.pulse(0, 10, 10, 2, true).unwrap();

        for t in 0..=40 {
            waves.tick(t, &mut board);
        }
        let (_, [led]) = board.release();
        assert!(led.high);
        assert_eq!(led.toggles, 5);
    }
}
