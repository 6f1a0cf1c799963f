//! Debounced push buttons
//!
//! Buttons are wired active-low against the internal pull-up: pressing pulls
//! the input to ground. Each button is a digital slot of a
//! [`SignalConditioner`] with a 20 tick debounce, so a press is a falling
//! edge and a release a rising one. Holding a button can optionally re-emit
//! the press after a first delay and then at a steady rate.
//!
//! ```
//! use tickwork_core::testing::SimBoard;
//! use tickwork_core::EngineConfig;
//! use tickwork_drivers::button::{ButtonEvent, Buttons};
//!
//! let mut board = SimBoard::<2>::new();
//! board.set_input(0, 1); // released
//!
//! let mut buttons: Buttons<2> = Buttons::new(1, &EngineConfig::default(), ());
//! buttons.attach(0, &mut board, 0).unwrap();
//!
//! board.set_input(0, 0); // pressed
//! let mut presses = 0;
//! buttons.tick(20, &mut board, &mut |_: usize, event: ButtonEvent| {
//!     if event == ButtonEvent::Press {
//!         presses += 1;
//!     }
//! });
//! assert_eq!(presses, 1);
//! assert!(buttons.is_pressed(0));
//! ```

use tickwork_core::signal::{Edge, SignalConditioner};
use tickwork_core::{
    elapsed, Capabilities, ChannelId, ChannelIo, ChannelMode, Diagnostic, EngineConfig, Error, Reporter,
    Tick,
};

/// Debounce applied to newly attached buttons
pub const DEFAULT_DEBOUNCE: Tick = 20;

/// Something that happened to a button
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ButtonEvent {
    Press,
    /// Auto-repeated press while held
    Repeat,
    Release,
}

/// Receives button events
pub trait ButtonHandler {
    fn on_press(&mut self, index: usize);

    fn on_release(&mut self, index: usize);

    /// Auto-repeat while held; a plain press by default
    fn on_repeat(&mut self, index: usize) {
        self.on_press(index)
    }
}

impl<F: FnMut(usize, ButtonEvent)> ButtonHandler for F {
    fn on_press(&mut self, index: usize) {
        self(index, ButtonEvent::Press)
    }

    fn on_release(&mut self, index: usize) {
        self(index, ButtonEvent::Release)
    }

    fn on_repeat(&mut self, index: usize) {
        self(index, ButtonEvent::Repeat)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Repeat {
    first: Tick,
    following: Tick,
    /// Tick of the press or of the last repeat
    last: Tick,
}

/// Forces channels to be sampled digitally
struct DigitalOnly<'a, IO>(&'a mut IO);

impl<IO: ChannelIo> ChannelIo for DigitalOnly<'_, IO> {
    fn configure_channel(&mut self, id: ChannelId, mode: ChannelMode) {
        self.0.configure_channel(id, mode)
    }

    fn capabilities(&self, id: ChannelId) -> Capabilities {
        Capabilities {
            analog_input: false,
            ..self.0.capabilities(id)
        }
    }

    fn read_digital(&mut self, id: ChannelId) -> bool {
        self.0.read_digital(id)
    }

    fn read_analog(&mut self, id: ChannelId) -> u16 {
        self.0.read_analog(id)
    }

    fn write_digital(&mut self, id: ChannelId, high: bool) {
        self.0.write_digital(id, high)
    }

    fn write_pwm(&mut self, id: ChannelId, duty: u16) {
        self.0.write_pwm(id, duty)
    }
}

/// Bank of push buttons
pub struct Buttons<const N: usize, R = ()> {
    signals: SignalConditioner<N, 1, R>,
    repeat: [Repeat; N],
}

impl<const N: usize, R: Reporter> Buttons<N, R> {
    pub fn new(capacity: usize, config: &EngineConfig, reporter: R) -> Self {
        Self {
            signals: SignalConditioner::new(capacity, config, reporter),
            repeat: [Repeat::default(); N],
        }
    }

    pub fn capacity(&self) -> usize {
        self.signals.capacity()
    }

    /// Update the tick used as the debounce reference when attaching
    pub fn sync(&mut self, now: Tick) {
        self.signals.sync(now);
    }

    /// Attach button `index` to channel `id` with the pull-up enabled
    pub fn attach<IO: ChannelIo>(&mut self, index: usize, io: &mut IO, id: ChannelId) -> Result<(), Error> {
        self.signals
            .attach(index, &mut DigitalOnly(io), id, ChannelMode::InputPullUp)?;
        self.signals.configure(index, DEFAULT_DEBOUNCE, 1, false)
    }

    pub fn set_debounce(&mut self, index: usize, debounce: Tick) -> Result<(), Error> {
        self.signals.configure(index, debounce, 1, false)
    }

    pub fn debounce(&self, index: usize) -> Tick {
        self.signals.debounce(index)
    }

    /// Re-emit presses while held
    ///
    /// The first repeat comes `first_delay` ticks after the press, the
    /// following ones every `following_delay` ticks. Both 0 disables
    /// repeating.
    pub fn set_repeat(&mut self, index: usize, first_delay: Tick, following_delay: Tick) -> Result<(), Error> {
        let capacity = self.signals.capacity();
        match self.repeat.get_mut(index).filter(|_| index < capacity) {
            Some(repeat) => {
                repeat.first = first_delay;
                repeat.following = following_delay;
                Ok(())
            }
            None => {
                self.signals.reporter().report(
                    self.signals.now(),
                    Diagnostic::error(Error::BadIndex)
                        .with_context(i32::try_from(index).unwrap_or(i32::MAX))
                        .with_label("Buttons::set_repeat"),
                );
                Err(Error::BadIndex)
            }
        }
    }

    /// Check if button `index` is held down
    pub fn is_pressed(&self, index: usize) -> bool {
        self.signals.channel(index).is_some() && self.signals.stable_value(index) == 0
    }

    /// Sample every button at tick `now`
    pub fn tick<IO: ChannelIo, H: ButtonHandler>(&mut self, now: Tick, io: &mut IO, handler: &mut H) {
        let repeat = &mut self.repeat;
        self.signals.tick(
            now,
            io,
            &mut |_: &mut SignalConditioner<N, 1, R>, index: usize, edge: Edge, _: i32| match edge {
                Edge::Falling => {
                    if let Some(r) = repeat.get_mut(index) {
                        r.last = now;
                    }
                    handler.on_press(index);
                }
                Edge::Rising => handler.on_release(index),
            },
        );

        for index in 0..self.capacity() {
            if !self.is_pressed(index) {
                continue;
            }
            let last_change = self.signals.last_change(index);
            let Some(r) = self.repeat.get_mut(index) else {
                continue;
            };
            if r.first == 0 && r.following == 0 {
                continue;
            }
            let delay = if r.last == last_change {
                r.first
            } else {
                r.following
            };
            if elapsed(now, r.last) >= delay {
                r.last = now;
                handler.on_repeat(index);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use heapless::Vec;
    use tickwork_core::diagnostics::HistorySink;
    use tickwork_core::testing::SimBoard;
    use tickwork_core::Diagnostics;

    type Events = Vec<(usize, ButtonEvent), 16>;

    fn setup() -> (Buttons<2>, SimBoard<2>) {
        let mut board = SimBoard::new();
        board.set_input(0, 1);
        board.set_input(1, 1);
        let mut buttons = Buttons::new(2, &EngineConfig::default(), ());
        buttons.attach(0, &mut board, 0).unwrap();
        buttons.attach(1, &mut board, 1).unwrap();
        (buttons, board)
    }

    fn run(buttons: &mut Buttons<2>, board: &mut SimBoard<2>, now: Tick) -> Events {
        let mut events = Vec::new();
        buttons.tick(now, board, &mut |index: usize, event: ButtonEvent| {
            let _ = events.push((index, event));
        });
        events
    }

    #[test]
    fn test_attach_uses_pull_up() {
        let (buttons, board) = setup();
        assert_eq!(board.mode(0), Some(ChannelMode::InputPullUp));
        assert_eq!(buttons.debounce(0), DEFAULT_DEBOUNCE);
        assert!(!buttons.is_pressed(0));
    }

    #[test]
    fn test_press_and_release() {
        let (mut buttons, mut board) = setup();
        board.set_input(1, 0);

        // Still inside the debounce window from attaching
        assert!(run(&mut buttons, &mut board, 10).is_empty());
        assert_eq!(run(&mut buttons, &mut board, 20).as_slice(), &[(1, ButtonEvent::Press)]);
        assert!(buttons.is_pressed(1));

        board.set_input(1, 1);
        assert!(run(&mut buttons, &mut board, 30).is_empty());
        assert_eq!(run(&mut buttons, &mut board, 40).as_slice(), &[(1, ButtonEvent::Release)]);
        assert!(!buttons.is_pressed(1));
    }

    #[test]
    fn test_auto_repeat() {
        let (mut buttons, mut board) = setup();
        buttons.set_repeat(0, 500, 100).unwrap();
        board.set_input(0, 0);

        assert_eq!(run(&mut buttons, &mut board, 20).as_slice(), &[(0, ButtonEvent::Press)]);
        assert!(run(&mut buttons, &mut board, 519).is_empty());
        assert_eq!(run(&mut buttons, &mut board, 520).as_slice(), &[(0, ButtonEvent::Repeat)]);
        assert!(run(&mut buttons, &mut board, 619).is_empty());
        assert_eq!(run(&mut buttons, &mut board, 620).as_slice(), &[(0, ButtonEvent::Repeat)]);

        board.set_input(0, 1);
        assert_eq!(run(&mut buttons, &mut board, 720).as_slice(), &[(0, ButtonEvent::Release)]);
        assert!(run(&mut buttons, &mut board, 2000).is_empty());
    }

    #[test]
    fn test_analog_capable_pin_sampled_digitally() {
        let mut board = SimBoard::<2>::new();
        board.set_capabilities(0, Capabilities::ANALOG);
        board.set_input(0, 1);
        let mut buttons: Buttons<2> = Buttons::new(1, &EngineConfig::default(), ());
        buttons.attach(0, &mut board, 0).unwrap();

        board.set_input(0, 700);
        // Any non-zero reading is released
        assert!(run(&mut buttons, &mut board, 50).is_empty());
        assert!(!buttons.is_pressed(0));
    }

    #[test]
    fn test_repeat_bad_index() {
        let diag = Diagnostics::new(HistorySink::<4>::new());
        let mut board = SimBoard::<2>::new();
        let mut buttons: Buttons<2, _> = Buttons::new(1, &EngineConfig::default(), &diag);
        buttons.attach(0, &mut board, 0).unwrap();

        // Capacity 1 inside storage for 2
        assert_eq!(buttons.set_repeat(1, 10, 10), Err(Error::BadIndex));
        let reported = diag.with_sink(|s| s.recent().map(|d| (d.code(), d.context)));
        assert_eq!(reported, Some(Some((1, Some(1)))));
        assert!(buttons.set_repeat(0, 10, 10).is_ok());
    }

    #[test]
    fn test_default_repeat_handler_presses() {
        struct Counter(u32);
        impl ButtonHandler for Counter {
            fn on_press(&mut self, _index: usize) {
                self.0 += 1;
            }
            fn on_release(&mut self, _index: usize) {}
        }

        let (mut buttons, mut board) = setup();
        buttons.set_repeat(0, 10, 10).unwrap();
        board.set_input(0, 0);

        let mut counter = Counter(0);
        buttons.tick(20, &mut board, &mut counter);
        buttons.tick(30, &mut board, &mut counter);
        assert_eq!(counter.0, 2);
    }
}
