//! Non-blocking output waveforms
//!
//! A [`WaveformGenerator`] drives attached output channels with either a
//! square pulse train or a triangle ramp between two duty-cycle bounds. A
//! repetition is one full cycle: it is counted each time the output returns
//! to its initial level.

use crate::channel::OutputChannel;
use crate::config::{EngineConfig, TimingMode};
use crate::diagnostics::{Diagnostic, Reporter};
use crate::error::Error;
use crate::slots::{bad_index, context, Slots};
use tickwork_hal::{elapsed, ChannelId, ChannelIo, Tick};

/// What a channel is generating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Task {
    #[default]
    Idle,
    /// Square wave between logic low and high
    Pulse,
    /// Triangle ramp between two duty cycles
    Oscillate,
}

/// State of one output channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WaveSlot {
    output: Option<OutputChannel>,
    task: Task,
    /// Level being held (pulse) or ramped away from (oscillate)
    level: u16,
    initial: u16,
    low: u16,
    high: u16,
    /// Time spent at or rising from the low level
    low_interval: Tick,
    /// Time spent at or falling from the high level
    high_interval: Tick,
    last_transition: Tick,
    repeat_limit: u16,
    cycles: u16,
    /// Last value written to the channel
    written: u16,
    /// The initial level has not been written yet
    pending: bool,
}

impl WaveSlot {
    fn interval(&self) -> Tick {
        if self.level == self.low {
            self.low_interval
        } else {
            self.high_interval
        }
    }

    /// Switch to the other level, counting completed cycles
    fn flip(&mut self, now: Tick, timing: TimingMode) {
        self.last_transition = match timing {
            TimingMode::Relaxed => now,
            TimingMode::Tight => self.last_transition.wrapping_add(self.interval()),
        };
        self.level = if self.level == self.low {
            self.high
        } else {
            self.low
        };

        if self.level == self.initial {
            self.cycles = self.cycles.wrapping_add(1);
            if self.repeat_limit > 0 && self.cycles >= self.repeat_limit {
                self.task = Task::Idle;
            }
        }
    }

    /// Ramp value `elapsed` ticks into the current interval, rounded
    fn ramp(&self, elapsed: Tick, interval: Tick) -> u16 {
        let span = u128::from(self.high - self.low);
        let interval = u128::from(interval);
        let step = (span * u128::from(elapsed) + interval / 2) / interval;
        let step = u16::try_from(step).unwrap_or(u16::MAX);
        if self.level == self.low {
            self.low.saturating_add(step)
        } else {
            self.high.saturating_sub(step)
        }
    }

    /// Write `value` the way `task` drives the channel
    ///
    /// `task` is passed in because the last flip of a limited run has
    /// already set the slot idle.
    fn write<IO: ChannelIo>(&mut self, io: &mut IO, task: Task, value: u16) {
        let Some(output) = self.output else {
            return;
        };
        match task {
            Task::Oscillate => output.write_duty(io, value),
            _ => output.write_level(io, value > 0),
        }
        self.written = value;
    }
}

/// Bank of waveform outputs
pub struct WaveformGenerator<const N: usize, R = ()> {
    slots: Slots<WaveSlot, N>,
    timing: TimingMode,
    now: Tick,
    reporter: R,
}

impl<const N: usize, R: Reporter> WaveformGenerator<N, R> {
    /// Create a generator with `capacity` channels
    pub fn new(capacity: usize, config: &EngineConfig, reporter: R) -> Self {
        Self {
            slots: Slots::new(capacity),
            timing: config.timing,
            now: 0,
            reporter,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Update the arming tick without driving any output
    pub fn sync(&mut self, now: Tick) {
        self.now = now;
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

    fn arm_slot(&mut self, index: usize, label: &'static str) -> Result<&mut WaveSlot, Error> {
        match self.slots.arm(index) {
            Some(slot) => Ok(slot),
            None => Err(bad_index(&self.reporter, self.now, index, label)),
        }
    }

    fn output(&self, index: usize, label: &'static str) -> Result<OutputChannel, Error> {
        match self.slots.get(index) {
            Some(WaveSlot {
                output: Some(output),
                ..
            }) => Ok(*output),
            Some(_) => Err(self.report(Error::InvalidOperation, context(index), label)),
            None => Err(bad_index(&self.reporter, self.now, index, label)),
        }
    }

    /// Attach slot `index` to output channel `id`
    pub fn attach<IO: ChannelIo>(&mut self, index: usize, io: &mut IO, id: ChannelId) -> Result<(), Error> {
        let slot = self.arm_slot(index, "WaveformGenerator::attach")?;
        *slot = WaveSlot {
            output: Some(OutputChannel::attach(io, id)),
            ..WaveSlot::default()
        };
        Ok(())
    }

    /// Generate a square wave on slot `index`
    ///
    /// The output starts at `initial_high` on the next tick and holds each
    /// level for its interval. `repeat` of 0 pulses forever.
    pub fn pulse(
        &mut self,
        index: usize,
        low_interval: Tick,
        high_interval: Tick,
        repeat: u16,
        initial_high: bool,
    ) -> Result<(), Error> {
        let label = "WaveformGenerator::pulse";
        self.output(index, label)?;

        let now = self.now;
        let slot = self.arm_slot(index, label)?;
        let initial = u16::from(initial_high);
        *slot = WaveSlot {
            task: Task::Pulse,
            level: initial,
            initial,
            low: 0,
            high: 1,
            low_interval,
            high_interval,
            last_transition: now,
            repeat_limit: repeat,
            cycles: 0,
            pending: true,
            ..*slot
        };
        Ok(())
    }

    /// Generate a triangle ramp between `low` and `high` on slot `index`
    ///
    /// `initial` snaps to the nearer bound (ties go to `high`). Requires a
    /// PWM-capable channel. `repeat` of 0 oscillates forever.
    #[allow(clippy::too_many_arguments)]
    pub fn oscillate(
        &mut self,
        index: usize,
        rise_interval: Tick,
        fall_interval: Tick,
        repeat: u16,
        initial: u16,
        low: u16,
        high: u16,
    ) -> Result<(), Error> {
        let label = "WaveformGenerator::oscillate";
        let output = self.output(index, label)?;
        if !output.has_pwm() {
            return Err(self.report(Error::InvalidOperation, i32::from(output.id()), label));
        }
        if low > high {
            return Err(self.report(Error::BadParameter, i32::from(low), label));
        }

        let start = if initial.abs_diff(low) < initial.abs_diff(high) {
            low
        } else {
            high
        };
        let now = self.now;
        let slot = self.arm_slot(index, label)?;
        *slot = WaveSlot {
            task: Task::Oscillate,
            level: start,
            initial: start,
            low,
            high,
            low_interval: rise_interval,
            high_interval: fall_interval,
            last_transition: now,
            repeat_limit: repeat,
            cycles: 0,
            pending: false,
            ..*slot
        };
        Ok(())
    }

    /// Stop generating on slot `index`, leaving the output as it is
    pub fn stop(&mut self, index: usize) -> Result<(), Error> {
        match self.slots.get_mut(index) {
            Some(slot) => {
                slot.task = Task::Idle;
                Ok(())
            }
            None => Err(bad_index(&self.reporter, self.now, index, "WaveformGenerator::stop")),
        }
    }

    pub fn stop_all(&mut self) {
        for slot in self.slots.iter_mut() {
            slot.task = Task::Idle;
        }
    }

    /// Stop any waveform on slot `index` and hand back its output
    fn take_over(&mut self, index: usize, label: &'static str) -> Result<(OutputChannel, &mut WaveSlot), Error> {
        let output = self.output(index, label)?;
        match self.slots.get_mut(index) {
            Some(slot) => {
                slot.task = Task::Idle;
                slot.pending = false;
                Ok((output, slot))
            }
            None => Err(bad_index(&self.reporter, self.now, index, label)),
        }
    }

    /// Drive slot `index` high or low
    ///
    /// Any waveform running on the slot is stopped first.
    pub fn set_level<IO: ChannelIo>(&mut self, index: usize, io: &mut IO, high: bool) -> Result<(), Error> {
        let (output, slot) = self.take_over(index, "WaveformGenerator::set_level")?;
        output.write_level(io, high);
        slot.written = u16::from(high);
        Ok(())
    }

    /// Invert the level read back from slot `index`, returning the new level
    pub fn toggle<IO: ChannelIo>(&mut self, index: usize, io: &mut IO) -> Result<bool, Error> {
        let (output, slot) = self.take_over(index, "WaveformGenerator::toggle")?;
        let high = !io.read_digital(output.id());
        output.write_level(io, high);
        slot.written = u16::from(high);
        Ok(high)
    }

    /// Write a raw duty cycle to slot `index`
    ///
    /// Fails with [`Error::InvalidOperation`] on a channel without PWM and
    /// with [`Error::BadParameter`] when `duty` is negative or too large.
    pub fn set_duty<IO: ChannelIo>(&mut self, index: usize, io: &mut IO, duty: i32) -> Result<(), Error> {
        let label = "WaveformGenerator::set_duty";
        let output = self.output(index, label)?;
        if !output.has_pwm() {
            return Err(self.report(Error::InvalidOperation, i32::from(output.id()), label));
        }
        let Ok(value) = u16::try_from(duty) else {
            return Err(self.report(Error::BadParameter, duty, label));
        };
        let (output, slot) = self.take_over(index, label)?;
        output.write_duty(io, value);
        slot.written = value;
        Ok(())
    }

    /// Logic level read back from the channel of slot `index`
    pub fn state<IO: ChannelIo>(&self, index: usize, io: &mut IO) -> Result<bool, Error> {
        let output = self.output(index, "WaveformGenerator::state")?;
        Ok(io.read_digital(output.id()))
    }

    pub fn is_active(&self, index: usize) -> bool {
        self.task(index) != Task::Idle
    }

    pub fn task(&self, index: usize) -> Task {
        self.slots.get(index).map_or(Task::Idle, |s| s.task)
    }

    /// Last value written to slot `index` (0/1 for pulses, duty otherwise)
    pub fn level(&self, index: usize) -> u16 {
        self.slots.get(index).map_or(0, |s| s.written)
    }

    /// Full cycles completed since arming
    pub fn cycles(&self, index: usize) -> u16 {
        self.slots.get(index).map_or(0, |s| s.cycles)
    }

    pub fn channel(&self, index: usize) -> Option<OutputChannel> {
        self.slots.get(index).and_then(|s| s.output)
    }

    /// Drive every active output at tick `now`
    pub fn tick<IO: ChannelIo>(&mut self, now: Tick, io: &mut IO) {
        self.now = now;
        self.slots
            .report_shortfall(&self.reporter, now, "WaveformGenerator");

        let timing = self.timing;
        for slot in self.slots.iter_mut() {
            let task = slot.task;
            match task {
                Task::Idle => {}
                Task::Pulse => {
                    if slot.pending {
                        slot.pending = false;
                        let level = slot.level;
                        slot.write(io, task, level);
                    } else if elapsed(now, slot.last_transition) >= slot.interval() {
                        slot.flip(now, timing);
                        let level = slot.level;
                        slot.write(io, task, level);
                    }
                }
                Task::Oscillate => {
                    let e = elapsed(now, slot.last_transition);
                    let interval = slot.interval();
                    if e >= interval {
                        slot.flip(now, timing);
                        let level = slot.level;
                        slot.write(io, task, level);
                    } else {
                        let value = slot.ramp(e, interval);
                        slot.write(io, task, value);
                    }
                }
            }
        }
    }
}
