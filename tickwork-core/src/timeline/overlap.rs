//! Window overlap detection and resolution
//!
//! Two running slots overlap when their effective windows (start plus any
//! pending postponement, for the configured duration) intersect. Conflicts
//! are resolved by postponing the losing slot until the other window ends;
//! windows are never shortened or cancelled.

use super::{Progress, SlotState, Timeline, TimelineSlot};
use crate::config::TieBreak;
use crate::diagnostics::{Diagnostic, Reporter};
use crate::error::Error;
use crate::slots::{bad_index, context};
use tickwork_hal::{elapsed, Tick};

/// Which of two compared slots overlaps the other
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Overlap {
    /// Windows are disjoint
    None,
    /// The first slot must be postponed
    First,
    /// The second slot must be postponed
    Second,
}

impl Overlap {
    /// Numeric result code (0, 1 or 2)
    pub const fn code(self) -> u8 {
        match self {
            Overlap::None => 0,
            Overlap::First => 1,
            Overlap::Second => 2,
        }
    }

    /// Result with the roles of the two slots swapped
    pub const fn swapped(self) -> Self {
        match self {
            Overlap::None => Overlap::None,
            Overlap::First => Overlap::Second,
            Overlap::Second => Overlap::First,
        }
    }
}

/// Overlap comparison failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OverlapError {
    /// A slot index is out of range
    BadIndex,
    /// The first slot's window cannot be represented in the tick width
    FirstRollover,
    /// The second slot's window cannot be represented in the tick width
    SecondRollover,
}

impl From<OverlapError> for Error {
    fn from(e: OverlapError) -> Self {
        match e {
            OverlapError::BadIndex => Error::BadIndex,
            OverlapError::FirstRollover | OverlapError::SecondRollover => Error::Rollover,
        }
    }
}

/// A slot's window on the comparison axis
#[derive(Debug, Clone, Copy)]
struct Window {
    /// Start of the current phase
    base: Tick,
    /// Start of the active window
    start: Tick,
    end: Tick,
    duration: Tick,
}

impl Window {
    fn new(slot: &TimelineSlot, base: Tick, checked: bool) -> Option<Self> {
        let pending = match slot.state {
            SlotState::Postponed => slot.postpone,
            _ => 0,
        };
        let (start, end) = if checked {
            let start = base.checked_add(pending)?;
            (start, start.checked_add(slot.duration)?)
        } else {
            let start = base.wrapping_add(pending);
            (start, start.wrapping_add(slot.duration))
        };
        Some(Self {
            base,
            start,
            end,
            duration: slot.duration,
        })
    }
}

impl<P: Progress, const N: usize, R: Reporter> Timeline<P, N, R> {
    /// Check whether the windows of two slots overlap
    ///
    /// Returns which slot has to be postponed. With `resolve`, the losing
    /// slot is postponed until the other window ends, after which the pair
    /// no longer overlaps. Inactive and zero-length windows never overlap.
    ///
    /// ```
    /// use tickwork_core::timeline::{FractionTimeline, Overlap, Timeline};
    /// use tickwork_core::EngineConfig;
    ///
    /// let mut line: FractionTimeline<2> = Timeline::new(2, &EngineConfig::default(), ());
    /// line.set(0, 1000, 0).unwrap();
    /// line.set(1, 500, 200).unwrap();
    ///
    /// assert_eq!(line.has_overlap(0, 1, true), Ok(Overlap::Second));
    /// assert_eq!(line.slot(1).unwrap().postpone, 1000);
    /// assert_eq!(line.has_overlap(0, 1, false), Ok(Overlap::None));
    /// ```
    pub fn has_overlap(
        &mut self,
        first: usize,
        second: usize,
        resolve: bool,
    ) -> Result<Overlap, OverlapError> {
        let label = "Timeline::has_overlap";
        let (a, b) = match (self.slots.get(first), self.slots.get(second)) {
            (Some(a), Some(b)) => (*a, *b),
            (None, _) => {
                bad_index(&self.reporter, self.now, first, label);
                return Err(OverlapError::BadIndex);
            }
            (_, None) => {
                bad_index(&self.reporter, self.now, second, label);
                return Err(OverlapError::BadIndex);
            }
        };

        if first == second
            || a.state == SlotState::Inactive
            || b.state == SlotState::Inactive
            || a.duration == 0
            || b.duration == 0
        {
            return Ok(Overlap::None);
        }

        let checked = self.policy.rollover_checks && !cfg!(feature = "tick64");
        let (base_a, base_b, now) = if checked {
            // Both phases started in the past: measure them as ages back
            // from now, then place the older one at zero
            let age_a = elapsed(self.now, a.window_start);
            let age_b = elapsed(self.now, b.window_start);
            let oldest = age_a.max(age_b);
            (oldest - age_a, oldest - age_b, oldest)
        } else {
            (a.window_start, b.window_start, self.now)
        };

        let wa = Window::new(&a, base_a, checked).ok_or_else(|| self.rollover(first, OverlapError::FirstRollover))?;
        let wb = Window::new(&b, base_b, checked).ok_or_else(|| self.rollover(second, OverlapError::SecondRollover))?;

        let result = if wa.start == wb.start {
            self.tie_loser(first, &wa, second, &wb)
        } else if wa.start < wb.start {
            if wa.end <= wb.start {
                Overlap::None
            } else {
                Overlap::Second
            }
        } else if wb.end <= wa.start {
            Overlap::None
        } else {
            Overlap::First
        };

        if resolve {
            match result {
                Overlap::First => self.postpone_until(first, &wa, now, wb.end, OverlapError::FirstRollover)?,
                Overlap::Second => self.postpone_until(second, &wb, now, wa.end, OverlapError::SecondRollover)?,
                Overlap::None => {}
            }
        }
        Ok(result)
    }

    /// Loser of two windows opening on the same tick
    fn tie_loser(&self, first: usize, wa: &Window, second: usize, wb: &Window) -> Overlap {
        let first_loses = if wa.duration == wb.duration {
            first > second
        } else {
            match self.policy.tie_break {
                TieBreak::ShorterLoses => wa.duration < wb.duration,
                TieBreak::LongerLoses => wa.duration > wb.duration,
            }
        };
        if first_loses {
            Overlap::First
        } else {
            Overlap::Second
        }
    }

    /// Rewrite the postponement of `index` so its window opens at `until`
    ///
    /// `now` is the current tick on the comparison axis. An active slot
    /// starts a new postponed phase at `now`; a postponed one keeps its
    /// phase start.
    fn postpone_until(
        &mut self,
        index: usize,
        window: &Window,
        now: Tick,
        until: Tick,
        on_rollover: OverlapError,
    ) -> Result<(), OverlapError> {
        let was_active = self.slots.get(index).map(|s| s.state) == Some(SlotState::Active);
        let postpone = if was_active {
            until.saturating_sub(now)
        } else {
            match until.checked_sub(window.base) {
                Some(postpone) => postpone,
                None => return Err(self.rollover(index, on_rollover)),
            }
        };
        let phase_start = self.now;
        if let Some(slot) = self.slots.get_mut(index) {
            if was_active {
                slot.window_start = phase_start;
            }
            slot.postpone = postpone;
            slot.state = SlotState::Postponed;
        }
        Ok(())
    }

    fn rollover(&self, index: usize, error: OverlapError) -> OverlapError {
        self.reporter.report(
            self.now,
            Diagnostic::error(Error::Rollover)
                .with_context(context(index))
                .with_label("Timeline::has_overlap"),
        );
        error
    }
}
