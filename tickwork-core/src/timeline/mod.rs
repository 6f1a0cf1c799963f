//! Postponable progress windows
//!
//! Each [`Timeline`] slot waits out an optional postponement, then stays
//! active for a fixed duration and reports its progress to the handler on
//! every tick. The final call always carries the end value, exactly once.
//!
//! ```text
//!   set()          postpone elapsed             duration elapsed
//!     │                  │                             │
//!     ▼                  ▼                             ▼
//! Inactive ──► Postponed ──────────► Active ─────────────► Inactive
//!     │                              ▲
//!     └──────── (postpone == 0) ─────┘
//! ```

mod overlap;
pub mod progress;

pub use overlap::{Overlap, OverlapError};
pub use progress::{map_to_f32, map_to_i32, map_to_u32, Fraction, MapValue, Mapped, Progress};

use crate::config::{EngineConfig, OverlapPolicy, TimingMode};
use crate::diagnostics::{Diagnostic, Reporter};
use crate::error::{Error, Warning};
use crate::slots::{bad_index, context, Slots};
use tickwork_hal::{elapsed, Tick};

/// Phase of a timeline slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SlotState {
    #[default]
    Inactive,
    /// Waiting for the postponement to elapse
    Postponed,
    /// Reporting progress
    Active,
}

/// State of one timeline slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimelineSlot {
    /// Delay before the window opens
    pub postpone: Tick,
    /// Length of the active window
    pub duration: Tick,
    /// Tick at which the current phase began
    pub window_start: Tick,
    pub state: SlotState,
}

impl TimelineSlot {
    fn arm(&mut self, now: Tick) {
        self.window_start = now;
        self.state = if self.postpone == 0 {
            SlotState::Active
        } else {
            SlotState::Postponed
        };
    }
}

/// Receives timeline progress
pub trait TimelineHandler<P: Progress, const N: usize, R> {
    /// Called with the progress of slot `index`
    fn on_progress(&mut self, timeline: &mut Timeline<P, N, R>, index: usize, value: P::Value);
}

impl<F, P: Progress, const N: usize, R> TimelineHandler<P, N, R> for F
where
    F: FnMut(&mut Timeline<P, N, R>, usize, P::Value),
{
    fn on_progress(&mut self, timeline: &mut Timeline<P, N, R>, index: usize, value: P::Value) {
        self(timeline, index, value)
    }
}

/// Bank of progress windows
pub struct Timeline<P, const N: usize, R = ()> {
    slots: Slots<TimelineSlot, N>,
    progress: P,
    timing: TimingMode,
    policy: OverlapPolicy,
    now: Tick,
    reporter: R,
}

/// Timeline reporting `0.0..=1.0`
pub type FractionTimeline<const N: usize, R = ()> = Timeline<Fraction, N, R>;

/// Timeline reporting values mapped between integer bounds
pub type MappedTimeline<T, const N: usize, R = ()> = Timeline<Mapped<T>, N, R>;

impl<P: Progress + Default, const N: usize, R: Reporter> Timeline<P, N, R> {
    /// Create a timeline with `capacity` slots and default progress mapping
    pub fn new(capacity: usize, config: &EngineConfig, reporter: R) -> Self {
        Self::with_progress(capacity, config, P::default(), reporter)
    }
}

impl<T: MapValue, const N: usize, R> Timeline<Mapped<T>, N, R> {
    /// Change the range progress is mapped onto
    pub fn set_bounds(&mut self, min: T, max: T) {
        self.progress.set_bounds(min, max);
    }
}

impl<P: Progress, const N: usize, R: Reporter> Timeline<P, N, R> {
    /// Create a timeline with `capacity` slots
    ///
    /// A capacity larger than `N` degrades to a single slot and is reported
    /// on the first tick.
    pub fn with_progress(capacity: usize, config: &EngineConfig, progress: P, reporter: R) -> Self {
        Self {
            slots: Slots::new(capacity),
            progress,
            timing: config.timing,
            policy: config.overlap,
            now: 0,
            reporter,
        }
    }

    /// Progress mapping in use
    pub fn progress(&self) -> &P {
        &self.progress
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Update the arming tick without evaluating any slot
    pub fn sync(&mut self, now: Tick) {
        self.now = now;
    }

    pub fn slot(&self, index: usize) -> Option<&TimelineSlot> {
        self.slots.get(index)
    }

    fn arm_slot(&mut self, index: usize, label: &'static str) -> Result<&mut TimelineSlot, Error> {
        match self.slots.arm(index) {
            Some(slot) => Ok(slot),
            None => Err(bad_index(&self.reporter, self.now, index, label)),
        }
    }

    /// Arm slot `index`
    ///
    /// With `postpone` of 0 the window opens immediately; otherwise it opens
    /// `postpone` ticks from now.
    pub fn set(&mut self, index: usize, duration: Tick, postpone: Tick) -> Result<(), Error> {
        let now = self.now;
        let slot = self.arm_slot(index, "Timeline::set")?;
        slot.duration = duration;
        slot.postpone = postpone;
        slot.arm(now);
        Ok(())
    }

    /// Re-arm slot `index` with its stored duration and postponement
    pub fn restart(&mut self, index: usize) -> Result<(), Error> {
        let label = "Timeline::restart";
        let now = self.now;
        let slot = self.arm_slot(index, label)?;
        let was_running = slot.state != SlotState::Inactive;
        slot.arm(now);

        if was_running {
            self.reporter.report(
                now,
                Diagnostic::warning(Warning::ResumeActive)
                    .with_context(context(index))
                    .with_label(label),
            );
        }
        Ok(())
    }

    /// Deactivate slot `index` without a final progress call
    pub fn stop(&mut self, index: usize) -> Result<(), Error> {
        match self.slots.get_mut(index) {
            Some(slot) => {
                slot.state = SlotState::Inactive;
                Ok(())
            }
            None => Err(bad_index(&self.reporter, self.now, index, "Timeline::stop")),
        }
    }

    pub fn stop_all(&mut self) {
        for slot in self.slots.iter_mut() {
            slot.state = SlotState::Inactive;
        }
    }

    pub fn restart_all(&mut self) {
        for index in 0..self.capacity() {
            let _ = self.restart(index);
        }
    }

    /// Phase of slot `index` (inactive when out of range)
    pub fn state(&self, index: usize) -> SlotState {
        self.slots.get(index).map_or(SlotState::Inactive, |s| s.state)
    }

    /// Check if slot `index` is postponed or active
    pub fn is_active(&self, index: usize) -> bool {
        self.state(index) != SlotState::Inactive
    }

    /// Check if the window of slot `index` has opened
    pub fn is_started(&self, index: usize) -> bool {
        self.state(index) == SlotState::Active
    }

    pub fn first_active(&self) -> Option<usize> {
        self.slots.iter().position(|s| s.state != SlotState::Inactive)
    }

    pub fn first_inactive(&self) -> Option<usize> {
        self.slots.iter().position(|s| s.state == SlotState::Inactive)
    }

    /// Evaluate all slots at tick `now`
    pub fn tick<H: TimelineHandler<P, N, R>>(&mut self, now: Tick, handler: &mut H) {
        self.now = now;
        self.slots
            .report_shortfall(&self.reporter, now, "Timeline");

        self.slots.begin_pass();
        for index in 0..self.slots.len() {
            if self.slots.is_deferred(index) {
                continue;
            }

            let timing = self.timing;
            let Some(slot) = self.slots.get_mut(index) else {
                continue;
            };

            let value = match slot.state {
                SlotState::Inactive => None,
                SlotState::Active => {
                    let e = elapsed(now, slot.window_start);
                    if e >= slot.duration {
                        slot.state = SlotState::Inactive;
                        Some(self.progress.end())
                    } else {
                        Some(self.progress.at(e, slot.duration))
                    }
                }
                SlotState::Postponed => {
                    if elapsed(now, slot.window_start) < slot.postpone {
                        None
                    } else {
                        slot.window_start = match timing {
                            TimingMode::Relaxed => now,
                            TimingMode::Tight => slot.window_start.wrapping_add(slot.postpone),
                        };
                        slot.state = SlotState::Active;
                        // A zero-length window reports its end on the next tick
                        (slot.duration > 0).then(|| self.progress.start())
                    }
                }
            };

            if let Some(value) = value {
                handler.on_progress(self, index, value);
            }
        }
        self.slots.end_pass();
    }
}
