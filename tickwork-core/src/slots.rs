//! Fixed-capacity slot storage shared by all components
//!
//! Storage is sized at compile time by `N`; the runtime capacity is chosen at
//! construction and never changes. Slots armed from inside a tick pass are
//! deferred until the next pass.

use heapless::Vec;

use crate::diagnostics::{Diagnostic, Reporter};
use crate::error::Error;
use tickwork_hal::Tick;

struct Entry<T> {
    slot: T,
    /// Armed during the current pass; skip until the next one
    deferred: bool,
}

pub(crate) struct Slots<T, const N: usize> {
    entries: Vec<Entry<T>, N>,
    in_pass: bool,
    /// Capacity that was requested but could not be provided
    shortfall: Option<usize>,
}

impl<T: Default, const N: usize> Slots<T, N> {
    /// Allocate `requested` slots, or a single slot if that exceeds `N`
    pub fn new(requested: usize) -> Self {
        let (capacity, shortfall) = match requested {
            0 => (1, None),
            n if n > N => (1, Some(n)),
            n => (n, None),
        };

        let mut entries = Vec::new();
        for _ in 0..capacity {
            // Only fails when N is zero
            if entries
                .push(Entry {
                    slot: T::default(),
                    deferred: false,
                })
                .is_err()
            {
                break;
            }
        }

        Self {
            entries,
            in_pass: false,
            shortfall,
        }
    }
}

impl<T, const N: usize> Slots<T, N> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.entries.get(index).map(|e| &e.slot)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.entries.get_mut(index).map(|e| &mut e.slot)
    }

    /// Mutable access for (re)arming a slot
    pub fn arm(&mut self, index: usize) -> Option<&mut T> {
        let in_pass = self.in_pass;
        self.entries.get_mut(index).map(|e| {
            e.deferred |= in_pass;
            &mut e.slot
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|e| &e.slot)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.entries.iter_mut().map(|e| &mut e.slot)
    }

    pub fn begin_pass(&mut self) {
        self.in_pass = true;
    }

    /// Check if the slot was armed earlier in this pass
    pub fn is_deferred(&self, index: usize) -> bool {
        self.entries.get(index).map_or(false, |e| e.deferred)
    }

    pub fn end_pass(&mut self) {
        self.in_pass = false;
        for entry in self.entries.iter_mut() {
            entry.deferred = false;
        }
    }

    /// Report a capacity shortfall once
    pub fn report_shortfall<R: Reporter>(&mut self, reporter: &R, now: Tick, label: &'static str) {
        if let Some(requested) = self.shortfall.take() {
            reporter.report(
                now,
                Diagnostic::error(Error::NotEnoughMemory)
                    .with_context(context(requested))
                    .with_label(label),
            );
        }
    }
}

/// Report and return a bad index error
pub(crate) fn bad_index<R: Reporter>(
    reporter: &R,
    now: Tick,
    index: usize,
    label: &'static str,
) -> Error {
    reporter.report(
        now,
        Diagnostic::error(Error::BadIndex)
            .with_context(context(index))
            .with_label(label),
    );
    Error::BadIndex
}

/// Clamp a count or index into a diagnostic context value
pub(crate) fn context(value: usize) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requested_capacity() {
        let slots: Slots<u8, 4> = Slots::new(3);
        assert_eq!(slots.len(), 3);
    }

    #[test]
    fn test_zero_capacity_becomes_one() {
        let slots: Slots<u8, 4> = Slots::new(0);
        assert_eq!(slots.len(), 1);
    }

    #[test]
    fn test_oversized_degrades_to_one() {
        let mut slots: Slots<u8, 4> = Slots::new(9);
        assert_eq!(slots.len(), 1);
        assert_eq!(slots.shortfall.take(), Some(9));
    }

    #[test]
    fn test_arm_in_pass_defers() {
        let mut slots: Slots<u8, 4> = Slots::new(4);
        slots.arm(1);
        assert!(!slots.is_deferred(1));

        slots.begin_pass();
        slots.arm(2);
        assert!(slots.is_deferred(2));
        assert!(!slots.is_deferred(3));
        slots.end_pass();

        assert!(!slots.is_deferred(2));
    }
}
