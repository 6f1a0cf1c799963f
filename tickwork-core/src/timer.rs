//! Interval timers
//!
//! A [`TimerBank`] holds a fixed number of independent timer slots. Each slot
//! fires its handler with the slot index whenever its interval elapses, either
//! forever or for a bounded number of repetitions.
//!
//! ```
//! use tickwork_core::timer::TimerBank;
//! use tickwork_core::EngineConfig;
//!
//! let mut timers = TimerBank::<2>::new(2, &EngineConfig::default(), ());
//! timers.set(0, 500, 0).unwrap(); // every 500 ticks, forever
//! timers.set(1, 1000, 3).unwrap(); // three times
//!
//! let mut fired = 0;
//! timers.tick(1000, &mut |_: &mut TimerBank<2>, _index: usize| fired += 1);
//! assert_eq!(fired, 2);
//! ```

use crate::config::{EngineConfig, TimingMode};
use crate::diagnostics::{Diagnostic, Reporter};
use crate::error::{Error, Warning};
use crate::slots::{bad_index, context, Slots};
use tickwork_hal::{elapsed, Tick};

/// State of one timer slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimerSlot {
    /// Ticks between fires
    pub interval: Tick,
    /// Tick of the last fire (or of arming)
    pub last_fire: Tick,
    /// Maximum number of fires (0 = unlimited)
    pub repeat_limit: u16,
    /// Fires since arming
    ///
    /// Wraps at 65535 for unlimited timers.
    pub fire_count: u16,
    /// Whether the slot is counting
    pub active: bool,
}

impl TimerSlot {
    fn is_exhausted(&self) -> bool {
        self.repeat_limit > 0 && self.fire_count >= self.repeat_limit
    }

    fn rearm(&mut self, now: Tick) {
        self.last_fire = now;
        self.fire_count = 0;
        self.active = true;
    }
}

/// Receives timer fires
///
/// The handler gets mutable access to the bank, so it may reconfigure any
/// slot. A slot armed during a pass is not evaluated until the next tick.
pub trait TimerHandler<const N: usize, R> {
    /// Called when slot `index` fires
    fn on_timer(&mut self, timers: &mut TimerBank<N, R>, index: usize);
}

impl<F, const N: usize, R> TimerHandler<N, R> for F
where
    F: FnMut(&mut TimerBank<N, R>, usize),
{
    fn on_timer(&mut self, timers: &mut TimerBank<N, R>, index: usize) {
        self(timers, index)
    }
}

/// Bank of interval timers
///
/// `N` is the storage size; the capacity requested at construction may be
/// smaller.
pub struct TimerBank<const N: usize, R = ()> {
    slots: Slots<TimerSlot, N>,
    timing: TimingMode,
    /// Tick of the most recent pass, used when arming
    now: Tick,
    reporter: R,
}

impl<const N: usize, R: Reporter> TimerBank<N, R> {
    /// Create a bank with `capacity` slots
    ///
    /// A capacity larger than `N` degrades to a single slot and is reported
    /// as [`Error::NotEnoughMemory`] on the first tick.
    pub fn new(capacity: usize, config: &EngineConfig, reporter: R) -> Self {
        Self {
            slots: Slots::new(capacity),
            timing: config.timing,
            now: 0,
            reporter,
        }
    }

    /// Number of slots
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Tick used when arming slots outside a pass
    pub fn now(&self) -> Tick {
        self.now
    }

    /// Update the arming tick without evaluating any slot
    pub fn sync(&mut self, now: Tick) {
        self.now = now;
    }

    /// Read a slot
    pub fn slot(&self, index: usize) -> Option<&TimerSlot> {
        self.slots.get(index)
    }

    fn slot_mut(&mut self, index: usize, label: &'static str) -> Result<&mut TimerSlot, Error> {
        match self.slots.get_mut(index) {
            Some(slot) => Ok(slot),
            None => Err(bad_index(&self.reporter, self.now, index, label)),
        }
    }

    fn arm_slot(&mut self, index: usize, label: &'static str) -> Result<&mut TimerSlot, Error> {
        match self.slots.arm(index) {
            Some(slot) => Ok(slot),
            None => Err(bad_index(&self.reporter, self.now, index, label)),
        }
    }

    fn warn_active(&self, index: usize, label: &'static str) {
        self.reporter.report(
            self.now,
            Diagnostic::warning(Warning::ResumeActive)
                .with_context(context(index))
                .with_label(label),
        );
    }

    /// Arm slot `index`
    ///
    /// The first fire happens `interval` ticks after the current tick.
    /// `repeat_limit` of 0 repeats forever.
    pub fn set(&mut self, index: usize, interval: Tick, repeat_limit: u16) -> Result<(), Error> {
        let now = self.now;
        let slot = self.arm_slot(index, "TimerBank::set")?;
        slot.interval = interval;
        slot.repeat_limit = repeat_limit;
        slot.rearm(now);
        Ok(())
    }

    /// Stop slot `index`, keeping its progress
    pub fn stop(&mut self, index: usize) -> Result<(), Error> {
        self.slot_mut(index, "TimerBank::stop")?.active = false;
        Ok(())
    }

    /// Resume slot `index` from where it was stopped
    ///
    /// Time spent stopped counts toward the next fire. A slot that already
    /// used up its repetitions stays inactive until [`TimerBank::restart`].
    pub fn resume(&mut self, index: usize) -> Result<(), Error> {
        let label = "TimerBank::resume";
        let slot = *self.slot_mut(index, label)?;

        if slot.active {
            self.warn_active(index, label);
        }
        if slot.is_exhausted() {
            self.reporter.report(
                self.now,
                Diagnostic::error(Error::InvalidOperation)
                    .with_context(context(index))
                    .with_label(label),
            );
            return Err(Error::InvalidOperation);
        }

        self.arm_slot(index, label)?.active = true;
        Ok(())
    }

    /// Restart slot `index` with its configured interval and limit
    pub fn restart(&mut self, index: usize) -> Result<(), Error> {
        let label = "TimerBank::restart";
        if self.slot_mut(index, label)?.active {
            self.warn_active(index, label);
        }

        let now = self.now;
        self.arm_slot(index, label)?.rearm(now);
        Ok(())
    }

    /// Stop every slot
    pub fn stop_all(&mut self) {
        for slot in self.slots.iter_mut() {
            slot.active = false;
        }
    }

    /// Resume every slot that still has repetitions left
    pub fn resume_all(&mut self) {
        for index in 0..self.capacity() {
            if self.slots.get(index).map_or(false, |s| !s.active && !s.is_exhausted()) {
                let _ = self.resume(index);
            }
        }
    }

    /// Restart every slot
    pub fn restart_all(&mut self) {
        for index in 0..self.capacity() {
            let _ = self.restart(index);
        }
    }

    /// Check if slot `index` is counting
    pub fn is_active(&self, index: usize) -> bool {
        self.slots.get(index).map_or(false, |s| s.active)
    }

    /// Number of fires of slot `index` since it was armed
    pub fn counter(&self, index: usize) -> u16 {
        self.slots.get(index).map_or(0, |s| s.fire_count)
    }

    /// Interval of slot `index`
    pub fn interval(&self, index: usize) -> Tick {
        self.slots.get(index).map_or(0, |s| s.interval)
    }

    /// Index of the first active slot
    pub fn first_active(&self) -> Option<usize> {
        self.slots.iter().position(|s| s.active)
    }

    /// Index of the first inactive slot
    pub fn first_inactive(&self) -> Option<usize> {
        self.slots.iter().position(|s| !s.active)
    }

    /// Evaluate all slots at tick `now`
    ///
    /// Slots are visited in index order. Each due slot fires at most once
    /// per pass.
    pub fn tick<H: TimerHandler<N, R>>(&mut self, now: Tick, handler: &mut H) {
        self.now = now;
        self.slots
            .report_shortfall(&self.reporter, now, "TimerBank");

        self.slots.begin_pass();
        for index in 0..self.slots.len() {
            if self.slots.is_deferred(index) {
                continue;
            }

            let timing = self.timing;
            let Some(slot) = self.slots.get_mut(index) else {
                continue;
            };
            if !slot.active || elapsed(now, slot.last_fire) < slot.interval {
                continue;
            }

            slot.last_fire = match timing {
                TimingMode::Relaxed => now,
                TimingMode::Tight => slot.last_fire.wrapping_add(slot.interval),
            };
            slot.fire_count = slot.fire_count.wrapping_add(1);
            if slot.is_exhausted() {
                slot.active = false;
            }

            handler.on_timer(self, index);
        }
        self.slots.end_pass();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{Diagnostics, HistorySink};
    use heapless::Vec;

    type Bank = TimerBank<4>;

    fn bank() -> Bank {
        TimerBank::new(4, &EngineConfig::default(), ())
    }

    fn run(timers: &mut Bank, now: Tick) -> Vec<usize, 8> {
        let mut fired = Vec::new();
        timers.tick(now, &mut |_: &mut Bank, index: usize| {
            let _ = fired.push(index);
        });
        fired
    }

    #[test]
    fn test_repeat_limit_scenario() {
        let mut timers = bank();
        timers.set(0, 100, 3).unwrap();

        assert_eq!(run(&mut timers, 100).as_slice(), &[0]);
        assert_eq!(run(&mut timers, 200).as_slice(), &[0]);
        assert_eq!(run(&mut timers, 300).as_slice(), &[0]);
        assert!(run(&mut timers, 301).is_empty());

        assert!(!timers.is_active(0));
        assert_eq!(timers.counter(0), 3);
    }

    #[test]
    fn test_not_due_yet() {
        let mut timers = bank();
        timers.set(1, 100, 0).unwrap();
        assert!(run(&mut timers, 99).is_empty());
        assert_eq!(run(&mut timers, 100).as_slice(), &[1]);
    }

    #[test]
    fn test_unlimited_keeps_firing() {
        let mut timers = bank();
        timers.set(0, 10, 0).unwrap();
        for t in 1..=20 {
            run(&mut timers, t * 10);
        }
        assert_eq!(timers.counter(0), 20);
        assert!(timers.is_active(0));
    }

    #[test]
    fn test_relaxed_timing_restarts_from_now() {
        let mut timers = bank();
        timers.set(0, 100, 0).unwrap();

        // Late by 50 ticks
        assert_eq!(run(&mut timers, 150).len(), 1);
        assert!(run(&mut timers, 200).is_empty());
        assert_eq!(run(&mut timers, 250).len(), 1);
    }

    #[test]
    fn test_tight_timing_catches_up() {
        let config = EngineConfig {
            timing: TimingMode::Tight,
            ..Default::default()
        };
        let mut timers: Bank = TimerBank::new(4, &config, ());
        timers.set(0, 100, 0).unwrap();

        // Stalled for three intervals: fires on consecutive ticks
        assert_eq!(run(&mut timers, 350).len(), 1);
        assert_eq!(run(&mut timers, 351).len(), 1);
        assert_eq!(run(&mut timers, 352).len(), 1);
        assert!(run(&mut timers, 353).is_empty());
        assert_eq!(run(&mut timers, 400).len(), 1);
    }

    #[test]
    fn test_stop_resume_keeps_progress() {
        let mut timers = bank();
        timers.set(0, 100, 0).unwrap();
        run(&mut timers, 60);
        timers.stop(0).unwrap();
        assert!(run(&mut timers, 120).is_empty());

        timers.resume(0).unwrap();
        // Elapsed is still measured from the arming tick
        assert_eq!(run(&mut timers, 121).as_slice(), &[0]);
    }

    #[test]
    fn test_restart_resets_counter() {
        let mut timers = bank();
        timers.set(0, 10, 2).unwrap();
        run(&mut timers, 10);
        run(&mut timers, 20);
        assert!(!timers.is_active(0));

        timers.sync(25);
        timers.restart(0).unwrap();
        assert_eq!(timers.counter(0), 0);
        assert!(run(&mut timers, 34).is_empty());
        assert_eq!(run(&mut timers, 35).as_slice(), &[0]);
    }

    #[test]
    fn test_resume_exhausted_is_rejected() {
        let mut timers = bank();
        timers.set(0, 10, 1).unwrap();
        run(&mut timers, 10);

        assert_eq!(timers.resume(0), Err(Error::InvalidOperation));
        assert!(run(&mut timers, 100).is_empty());
        assert_eq!(timers.counter(0), 1);
    }

    #[test]
    fn test_bad_index_reported() {
        let diag = Diagnostics::new(HistorySink::<4>::new());
        let mut timers: TimerBank<4, _> = TimerBank::new(2, &EngineConfig::default(), &diag);

        assert_eq!(timers.set(2, 10, 0), Err(Error::BadIndex));
        let code = diag.with_sink(|s| s.recent().map(|d| (d.code(), d.context)));
        assert_eq!(code, Some(Some((1, Some(2)))));
    }

    #[test]
    fn test_oversized_bank_degrades() {
        let diag = Diagnostics::new(HistorySink::<4>::new());
        let mut timers: TimerBank<4, _> = TimerBank::new(10, &EngineConfig::default(), &diag);
        assert_eq!(timers.capacity(), 1);

        timers.tick(0, &mut |_: &mut TimerBank<4, &Diagnostics<HistorySink<4>>>, _: usize| {});
        let code = diag.with_sink(|s| s.recent().map(|d| d.code()));
        assert_eq!(code, Some(Some(7)));
    }

    #[test]
    fn test_resume_active_warns() {
        let diag = Diagnostics::new(HistorySink::<4>::new());
        let mut timers: TimerBank<4, _> = TimerBank::new(1, &EngineConfig::default(), &diag);
        timers.set(0, 10, 0).unwrap();
        timers.resume(0).unwrap();

        let code = diag.with_sink(|s| s.recent().map(|d| d.code()));
        assert_eq!(code, Some(Some(101)));
    }

    #[test]
    fn test_handler_reconfigures_own_slot() {
        let mut timers = bank();
        timers.set(0, 10, 0).unwrap();

        let mut fired = 0;
        timers.tick(10, &mut |t: &mut Bank, index: usize| {
            fired += 1;
            t.set(index, 50, 1).unwrap();
        });
        assert_eq!(fired, 1);
        assert_eq!(timers.interval(0), 50);
        assert!(run(&mut timers, 59).is_empty());
        assert_eq!(run(&mut timers, 60).as_slice(), &[0]);
    }

    #[test]
    fn test_slot_armed_in_pass_waits_for_next_tick() {
        let mut timers = bank();
        timers.set(0, 10, 0).unwrap();

        let mut seen: Vec<usize, 8> = Vec::new();
        timers.tick(10, &mut |t: &mut Bank, index: usize| {
            let _ = seen.push(index);
            if index == 0 {
                // Due immediately, but must not fire in this pass
                t.set(2, 0, 1).unwrap();
            }
        });
        assert_eq!(seen.as_slice(), &[0]);
        assert_eq!(run(&mut timers, 11).as_slice(), &[2]);
    }

    #[test]
    fn test_first_active_inactive() {
        let mut timers = bank();
        assert_eq!(timers.first_active(), None);
        assert_eq!(timers.first_inactive(), Some(0));

        timers.set(0, 10, 0).unwrap();
        timers.set(2, 10, 0).unwrap();
        assert_eq!(timers.first_active(), Some(0));
        assert_eq!(timers.first_inactive(), Some(1));

        timers.stop_all();
        assert_eq!(timers.first_active(), None);
        timers.resume_all();
        assert_eq!(timers.first_inactive(), None);
    }

    #[test]
    fn test_elapsed_across_wrap() {
        let mut timers = bank();
        timers.sync(Tick::MAX - 49);
        timers.set(0, 100, 0).unwrap();

        assert!(run(&mut timers, 49).is_empty());
        assert_eq!(run(&mut timers, 50).as_slice(), &[0]);
    }
}
