//! Debounced, averaged edge detection
//!
//! A [`SignalConditioner`] samples its attached input channels once per tick
//! and reports rising and falling edges of the conditioned value:
//!
//! 1. Nothing happens until the debounce interval has passed since the last
//!    accepted edge.
//! 2. A candidate value is produced from a single reading, a streaming
//!    average or a moving average (see [`Averager`]).
//! 3. The candidate must differ from the stable value by at least the
//!    threshold to count as an edge. In fixed-step mode the stable value then
//!    moves by exactly the threshold, otherwise it snaps to the candidate.
//!
//! A threshold of 0 reports a rising edge on every sample.

pub mod averaging;

pub use averaging::{Averager, MAX_SAMPLES};

use crate::channel::InputChannel;
use crate::config::{Division, EngineConfig};
use crate::diagnostics::{Diagnostic, Reporter};
use crate::error::Error;
use crate::slots::{bad_index, context, Slots};
use tickwork_hal::{elapsed, ChannelId, ChannelIo, ChannelMode, Delay, Tick};

/// Direction of an accepted change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Edge {
    Rising,
    Falling,
}

/// Conditioning state of one input
#[derive(Debug, Clone)]
pub struct SignalSlot<const S: usize> {
    input: Option<InputChannel>,
    stable: i32,
    last_change: Tick,
    debounce: Tick,
    threshold: i32,
    fixed_step: bool,
    averager: Averager<S>,
}

impl<const S: usize> Default for SignalSlot<S> {
    fn default() -> Self {
        Self {
            input: None,
            stable: 0,
            last_change: 0,
            debounce: 0,
            threshold: 1,
            fixed_step: false,
            averager: Averager::disabled(),
        }
    }
}

impl<const S: usize> SignalSlot<S> {
    /// Compare a candidate against the stable value
    fn qualify(&mut self, candidate: i32) -> Option<Edge> {
        let step = self.fixed_step && self.threshold > 0;
        if candidate >= self.stable.saturating_add(self.threshold) {
            self.stable = if step {
                self.stable + self.threshold
            } else {
                candidate
            };
            Some(Edge::Rising)
        } else if candidate <= self.stable.saturating_sub(self.threshold) {
            self.stable = if step {
                self.stable - self.threshold
            } else {
                candidate
            };
            Some(Edge::Falling)
        } else {
            None
        }
    }
}

/// Receives accepted edges
pub trait EdgeHandler<const N: usize, const S: usize, R> {
    /// Slot `index` rose to the stable value `value`
    fn on_rising(&mut self, signals: &mut SignalConditioner<N, S, R>, index: usize, value: i32);

    /// Slot `index` fell to the stable value `value`
    fn on_falling(&mut self, signals: &mut SignalConditioner<N, S, R>, index: usize, value: i32);
}

impl<F, const N: usize, const S: usize, R> EdgeHandler<N, S, R> for F
where
    F: FnMut(&mut SignalConditioner<N, S, R>, usize, Edge, i32),
{
    fn on_rising(&mut self, signals: &mut SignalConditioner<N, S, R>, index: usize, value: i32) {
        self(signals, index, Edge::Rising, value)
    }

    fn on_falling(&mut self, signals: &mut SignalConditioner<N, S, R>, index: usize, value: i32) {
        self(signals, index, Edge::Falling, value)
    }
}

/// Bank of conditioned inputs
///
/// `N` is the slot storage and `S` the per-slot ring size for buffered
/// averaging.
pub struct SignalConditioner<const N: usize, const S: usize = 16, R = ()> {
    slots: Slots<SignalSlot<S>, N>,
    division: Division,
    now: Tick,
    reporter: R,
}

impl<const N: usize, const S: usize, R: Reporter> SignalConditioner<N, S, R> {
    /// Create a conditioner with `capacity` slots
    pub fn new(capacity: usize, config: &EngineConfig, reporter: R) -> Self {
        Self {
            slots: Slots::new(capacity),
            division: config.division,
            now: 0,
            reporter,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Update the tick used as the debounce reference when attaching
    pub fn sync(&mut self, now: Tick) {
        self.now = now;
    }

    /// Tick of the last pass or [`sync`](Self::sync)
    pub fn now(&self) -> Tick {
        self.now
    }

    /// Reporter shared with components layered on top
    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    fn report(&self, error: Error, value: i32, label: &'static str) -> Error {
        self.reporter.report(
            self.now,
            Diagnostic::error(error)
                .with_context(value)
                .with_label(label),
        );
        error
    }

    fn slot(&self, index: usize, label: &'static str) -> Result<&SignalSlot<S>, Error> {
        self.slots
            .get(index)
            .ok_or_else(|| bad_index(&self.reporter, self.now, index, label))
    }

    fn arm_slot(&mut self, index: usize, label: &'static str) -> Result<&mut SignalSlot<S>, Error> {
        match self.slots.arm(index) {
            Some(slot) => Ok(slot),
            None => Err(bad_index(&self.reporter, self.now, index, label)),
        }
    }

    fn input(&self, index: usize, label: &'static str) -> Result<InputChannel, Error> {
        match self.slot(index, label)?.input {
            Some(input) => Ok(input),
            None => Err(self.report(Error::InvalidOperation, context(index), label)),
        }
    }

    /// Attach slot `index` to input channel `id`
    ///
    /// `mode` must be an input mode; anything else is reported as
    /// [`Error::BadParameter`] and the channel is still attached as a plain
    /// input. The first reading becomes the stable value.
    pub fn attach<IO: ChannelIo>(
        &mut self,
        index: usize,
        io: &mut IO,
        id: ChannelId,
        mode: ChannelMode,
    ) -> Result<(), Error> {
        let label = "SignalConditioner::attach";
        let (mode, result) = if mode.is_input() {
            (mode, Ok(()))
        } else {
            (ChannelMode::Input, Err(self.report(Error::BadParameter, i32::from(id), label)))
        };

        let now = self.now;
        let slot = self.arm_slot(index, label)?;
        let input = InputChannel::attach(io, id, mode);
        slot.input = Some(input);
        slot.stable = input.read(io);
        slot.last_change = now;
        slot.averager = Averager::disabled();
        if !input.is_analog() {
            slot.threshold = slot.threshold.min(1);
        }
        result
    }

    /// Set debounce interval, edge threshold and fixed-step mode
    ///
    /// Digital channels clamp the threshold to 1.
    pub fn configure(
        &mut self,
        index: usize,
        debounce: Tick,
        threshold: u16,
        fixed_step: bool,
    ) -> Result<(), Error> {
        let slot = self.arm_slot(index, "SignalConditioner::configure")?;
        let digital = slot.input.map_or(false, |i| !i.is_analog());
        slot.debounce = debounce;
        slot.threshold = if digital {
            i32::from(threshold.min(1))
        } else {
            i32::from(threshold)
        };
        slot.fixed_step = fixed_step;
        Ok(())
    }

    /// Enable sample averaging on slot `index`
    ///
    /// `count` must be within `2..=60` (and fit in `S` when buffered);
    /// otherwise averaging is disabled and [`Error::BadParameter`] returned.
    /// Buffered mode fills its ring with fresh readings before returning.
    pub fn set_samples<IO: ChannelIo>(
        &mut self,
        index: usize,
        io: &mut IO,
        count: u8,
        buffered: bool,
    ) -> Result<(), Error> {
        let label = "SignalConditioner::set_samples";
        let input = self.input(index, label)?;

        let limit = if buffered {
            usize::from(MAX_SAMPLES).min(S)
        } else {
            usize::from(MAX_SAMPLES)
        };
        let averager = if count < 2 || usize::from(count) > limit {
            None
        } else if buffered {
            Averager::buffered(count, || input.read(io))
        } else {
            Some(Averager::streaming(count))
        };

        let ok = averager.is_some();
        self.arm_slot(index, label)?.averager = averager.unwrap_or_default();
        if ok {
            Ok(())
        } else {
            Err(self.report(Error::BadParameter, i32::from(count), label))
        }
    }

    /// Take a single reading without touching the conditioning state
    pub fn sample<IO: ChannelIo>(&self, index: usize, io: &mut IO) -> Result<i32, Error> {
        Ok(self.input(index, "SignalConditioner::sample")?.read(io))
    }

    /// Average `count` consecutive readings
    ///
    /// Blocks: waits the slot's debounce interval before each reading when
    /// it is non-zero. Never called by [`SignalConditioner::tick`].
    pub fn read_averaged<IO: ChannelIo + Delay>(
        &self,
        index: usize,
        io: &mut IO,
        count: u8,
    ) -> Result<i32, Error> {
        let label = "SignalConditioner::read_averaged";
        let input = self.input(index, label)?;
        if count < 2 {
            return Err(self.report(Error::BadParameter, i32::from(count), label));
        }

        let debounce = self.slot(index, label)?.debounce;
        let mut sum = 0i32;
        for _ in 0..count {
            if debounce > 0 {
                io.delay(debounce);
            }
            sum = sum.saturating_add(input.read(io));
        }
        Ok(self.division.apply(sum, i32::from(count)))
    }

    /// Read back the averaging ring
    ///
    /// `position` 0 yields the current moving average, `1..=count` the
    /// stored readings in ring order.
    pub fn buffered_value(&self, index: usize, position: usize) -> Result<i32, Error> {
        let label = "SignalConditioner::buffered_value";
        let averager = &self.slot(index, label)?.averager;
        if !averager.is_buffered() {
            return Err(self.report(Error::InvalidOperation, context(index), label));
        }

        let value = match position {
            0 => averager.average(self.division),
            p => averager.get(p - 1),
        };
        value.ok_or_else(|| self.report(Error::BadParameter, context(position), label))
    }

    /// Attached channel of slot `index`
    pub fn channel(&self, index: usize) -> Option<InputChannel> {
        self.slots.get(index).and_then(|s| s.input)
    }

    /// Last accepted value of slot `index`
    pub fn stable_value(&self, index: usize) -> i32 {
        self.slots.get(index).map_or(0, |s| s.stable)
    }

    pub fn debounce(&self, index: usize) -> Tick {
        self.slots.get(index).map_or(0, |s| s.debounce)
    }

    pub fn threshold(&self, index: usize) -> u16 {
        self.slots
            .get(index)
            .map_or(0, |s| u16::try_from(s.threshold).unwrap_or(u16::MAX))
    }

    /// Samples per average (0 when averaging is off)
    pub fn samples(&self, index: usize) -> u8 {
        self.slots.get(index).map_or(0, |s| s.averager.count())
    }

    pub fn is_buffered(&self, index: usize) -> bool {
        self.slots.get(index).map_or(false, |s| s.averager.is_buffered())
    }

    /// Tick of the last accepted edge (or of attaching)
    pub fn last_change(&self, index: usize) -> Tick {
        self.slots.get(index).map_or(0, |s| s.last_change)
    }

    /// Sample every attached slot at tick `now`
    pub fn tick<IO, H>(&mut self, now: Tick, io: &mut IO, handler: &mut H)
    where
        IO: ChannelIo,
        H: EdgeHandler<N, S, R>,
    {
        self.now = now;
        self.slots
            .report_shortfall(&self.reporter, now, "SignalConditioner");

        self.slots.begin_pass();
        for index in 0..self.slots.len() {
            if self.slots.is_deferred(index) {
                continue;
            }

            let division = self.division;
            let Some(slot) = self.slots.get_mut(index) else {
                continue;
            };
            let Some(input) = slot.input else {
                continue;
            };
            if elapsed(now, slot.last_change) < slot.debounce {
                continue;
            }

            let reading = input.read(io);
            let Some(candidate) = slot.averager.push(reading, division) else {
                continue;
            };
            let Some(edge) = slot.qualify(candidate) else {
                continue;
            };
            slot.last_change = now;

            let value = slot.stable;
            match edge {
                Edge::Rising => handler.on_rising(self, index, value),
                Edge::Falling => handler.on_falling(self, index, value),
            }
        }
        self.slots.end_pass();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::SimBoard;
    use heapless::Vec;
    use tickwork_hal::Capabilities;

    type Signals = SignalConditioner<4, 8>;
    type Events = Vec<(usize, Edge, i32), 16>;

    fn setup(analog: bool) -> (Signals, SimBoard<4>) {
        let mut board = SimBoard::new();
        if analog {
            board.set_capabilities(0, Capabilities::ANALOG);
        }
        let signals = SignalConditioner::new(4, &EngineConfig::default(), ());
        (signals, board)
    }

    fn run(signals: &mut Signals, board: &mut SimBoard<4>, now: Tick) -> Events {
        let mut events = Vec::new();
        signals.tick(now, board, &mut |_: &mut Signals, index: usize, edge: Edge, value: i32| {
            let _ = events.push((index, edge, value));
        });
        events
    }

    #[test]
    fn test_digital_edges() {
        let (mut signals, mut board) = setup(false);
        signals.attach(0, &mut board, 0, ChannelMode::InputPullUp).unwrap();
        assert_eq!(signals.stable_value(0), 0);

        assert!(run(&mut signals, &mut board, 1).is_empty());
        board.set_input(0, 1);
        assert_eq!(run(&mut signals, &mut board, 2).as_slice(), &[(0, Edge::Rising, 1)]);
        assert!(run(&mut signals, &mut board, 3).is_empty());
        board.set_input(0, 0);
        assert_eq!(run(&mut signals, &mut board, 4).as_slice(), &[(0, Edge::Falling, 0)]);
    }

    #[test]
    fn test_debounce_gate() {
        let (mut signals, mut board) = setup(false);
        signals.attach(0, &mut board, 0, ChannelMode::Input).unwrap();
        signals.configure(0, 20, 1, false).unwrap();

        board.set_input(0, 1);
        // Attached at tick 0: gate opens at 20
        assert!(run(&mut signals, &mut board, 19).is_empty());
        assert_eq!(run(&mut signals, &mut board, 20).len(), 1);
        assert_eq!(signals.last_change(0), 20);

        // Bounce back inside the window is ignored
        board.set_input(0, 0);
        assert!(run(&mut signals, &mut board, 30).is_empty());
        assert_eq!(run(&mut signals, &mut board, 40).as_slice(), &[(0, Edge::Falling, 0)]);
    }

    #[test]
    fn test_debounce_across_wrap() {
        let (mut signals, mut board) = setup(false);
        signals.sync(Tick::MAX - 9);
        signals.attach(0, &mut board, 0, ChannelMode::Input).unwrap();
        signals.configure(0, 20, 1, false).unwrap();

        board.set_input(0, 1);
        assert!(run(&mut signals, &mut board, Tick::MAX).is_empty());
        assert!(run(&mut signals, &mut board, 9).is_empty());
        assert_eq!(run(&mut signals, &mut board, 10).as_slice(), &[(0, Edge::Rising, 1)]);
        assert_eq!(signals.last_change(0), 10);

        board.set_input(0, 0);
        assert!(run(&mut signals, &mut board, 29).is_empty());
        assert_eq!(run(&mut signals, &mut board, 30).as_slice(), &[(0, Edge::Falling, 0)]);
    }

    #[test]
    fn test_threshold_hysteresis() {
        let (mut signals, mut board) = setup(true);
        board.set_input(0, 500);
        signals.attach(0, &mut board, 0, ChannelMode::Input).unwrap();
        signals.configure(0, 0, 10, false).unwrap();

        board.set_input(0, 509);
        assert!(run(&mut signals, &mut board, 1).is_empty());
        board.set_input(0, 515);
        assert_eq!(run(&mut signals, &mut board, 2).as_slice(), &[(0, Edge::Rising, 515)]);
        board.set_input(0, 506);
        assert!(run(&mut signals, &mut board, 3).is_empty());
        board.set_input(0, 505);
        assert_eq!(run(&mut signals, &mut board, 4).as_slice(), &[(0, Edge::Falling, 505)]);
    }

    #[test]
    fn test_fixed_step_moves_by_threshold() {
        let (mut signals, mut board) = setup(true);
        board.set_input(0, 100);
        signals.attach(0, &mut board, 0, ChannelMode::Input).unwrap();
        signals.configure(0, 0, 10, true).unwrap();

        board.set_input(0, 137);
        let values: Vec<i32, 8> = (1..=4)
            .flat_map(|t| run(&mut signals, &mut board, t))
            .map(|(_, _, v)| v)
            .collect();
        assert_eq!(values.as_slice(), &[110, 120, 130]);
        assert_eq!(signals.stable_value(0), 130);
    }

    #[test]
    fn test_zero_threshold_rises_every_tick() {
        let (mut signals, mut board) = setup(true);
        board.set_input(0, 42);
        signals.attach(0, &mut board, 0, ChannelMode::Input).unwrap();
        signals.configure(0, 0, 0, true).unwrap();

        for t in 1..=3 {
            assert_eq!(run(&mut signals, &mut board, t).as_slice(), &[(0, Edge::Rising, 42)]);
        }
    }

    #[test]
    fn test_digital_threshold_clamped() {
        let (mut signals, mut board) = setup(false);
        signals.attach(0, &mut board, 0, ChannelMode::Input).unwrap();
        signals.configure(0, 0, 40, false).unwrap();
        assert_eq!(signals.threshold(0), 1);
    }

    #[test]
    fn test_streaming_average() {
        let (mut signals, mut board) = setup(true);
        signals.attach(0, &mut board, 0, ChannelMode::Input).unwrap();
        signals.set_samples(0, &mut board, 4, false).unwrap();

        board.script(0, &[100, 200, 300, 400]);
        assert!(run(&mut signals, &mut board, 1).is_empty());
        assert!(run(&mut signals, &mut board, 2).is_empty());
        assert!(run(&mut signals, &mut board, 3).is_empty());
        assert_eq!(run(&mut signals, &mut board, 4).as_slice(), &[(0, Edge::Rising, 250)]);
    }

    #[test]
    fn test_buffered_average() {
        let (mut signals, mut board) = setup(true);
        signals.attach(0, &mut board, 0, ChannelMode::Input).unwrap();
        board.script(0, &[10, 20, 30]);
        signals.set_samples(0, &mut board, 3, true).unwrap();

        assert_eq!(signals.buffered_value(0, 0), Ok(20));
        assert_eq!(signals.buffered_value(0, 3), Ok(30));
        assert_eq!(signals.buffered_value(0, 4), Err(Error::BadParameter));

        board.set_input(0, 40);
        // Replaces 10: (20 + 30 + 40) / 3
        assert_eq!(run(&mut signals, &mut board, 1).as_slice(), &[(0, Edge::Rising, 30)]);
        assert_eq!(signals.buffered_value(0, 1), Ok(40));
    }

    #[test]
    fn test_bad_sample_count_disables_averaging() {
        let (mut signals, mut board) = setup(true);
        signals.attach(0, &mut board, 0, ChannelMode::Input).unwrap();
        signals.set_samples(0, &mut board, 4, false).unwrap();

        assert_eq!(signals.set_samples(0, &mut board, 61, false), Err(Error::BadParameter));
        assert_eq!(signals.samples(0), 0);
        // Larger than the ring
        assert_eq!(signals.set_samples(0, &mut board, 9, true), Err(Error::BadParameter));
        assert_eq!(
            signals.buffered_value(0, 0),
            Err(Error::InvalidOperation)
        );
    }

    #[test]
    fn test_read_averaged_blocks() {
        let (mut signals, mut board) = setup(true);
        signals.attach(0, &mut board, 0, ChannelMode::Input).unwrap();
        signals.configure(0, 5, 1, false).unwrap();

        assert_eq!(signals.read_averaged(0, &mut board, 1), Err(Error::BadParameter));

        board.script(0, &[1, 2, 3, 4]);
        assert_eq!(signals.read_averaged(0, &mut board, 4), Ok(2));
        assert_eq!(board.delayed(), 20);
    }

    #[test]
    fn test_nearest_division() {
        let config = EngineConfig {
            division: Division::Nearest,
            ..Default::default()
        };
        let mut signals: Signals = SignalConditioner::new(1, &config, ());
        let mut board = SimBoard::<4>::new();
        board.set_capabilities(0, Capabilities::ANALOG);
        signals.attach(0, &mut board, 0, ChannelMode::Input).unwrap();

        board.script(0, &[1, 2, 3, 4]);
        assert_eq!(signals.read_averaged(0, &mut board, 4), Ok(3));
    }

    #[test]
    fn test_attach_rejects_output_mode() {
        let (mut signals, mut board) = setup(false);
        assert_eq!(
            signals.attach(0, &mut board, 0, ChannelMode::Output),
            Err(Error::BadParameter)
        );
        assert_eq!(board.mode(0), Some(ChannelMode::Input));
        assert!(signals.channel(0).is_some());
    }

    #[test]
    fn test_unattached_slot() {
        let (mut signals, mut board) = setup(false);
        assert_eq!(signals.sample(1, &mut board), Err(Error::InvalidOperation));
        assert_eq!(signals.sample(7, &mut board), Err(Error::BadIndex));
        assert!(run(&mut signals, &mut board, 10).is_empty());
    }

    #[test]
    fn test_handler_reconfigures_slot() {
        let (mut signals, mut board) = setup(true);
        board.set_input(0, 0);
        signals.attach(0, &mut board, 0, ChannelMode::Input).unwrap();
        board.set_input(0, 100);

        let mut events: Events = Vec::new();
        signals.tick(1, &mut board, &mut |s: &mut Signals, index: usize, edge: Edge, value: i32| {
            let _ = events.push((index, edge, value));
            s.configure(index, 50, 10, false).unwrap();
        });
        assert_eq!(events.len(), 1);
        assert_eq!(signals.debounce(0), 50);
        assert!(run(&mut signals, &mut board, 2).is_empty());
    }
}
