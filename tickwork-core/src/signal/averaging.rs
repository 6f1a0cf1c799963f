//! Sample averaging
//!
//! Streaming mode accumulates `count` readings and resolves one average per
//! `count` samples. Buffered mode keeps the last `count` readings in a ring
//! and resolves a moving average on every sample; the running sum is updated
//! by removing the oldest reading and adding the newest.

use heapless::Vec;

use crate::config::Division;

/// Upper bound on the number of averaged samples
pub const MAX_SAMPLES: u8 = 60;

/// Averaging state of one channel
#[derive(Debug, Clone, Default)]
pub struct Averager<const S: usize> {
    /// Samples per average (0 = averaging off)
    count: u8,
    ring: Vec<i32, S>,
    /// Ring slot the next reading replaces, or readings taken so far
    next: usize,
    sum: i32,
}

impl<const S: usize> Averager<S> {
    /// Pass readings through unchanged
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Average every `count` readings
    pub fn streaming(count: u8) -> Self {
        Self {
            count,
            ..Self::default()
        }
    }

    /// Moving average over the last `count` readings
    ///
    /// The ring is filled up front by calling `read` `count` times. Returns
    /// `None` if `count` readings do not fit in `S`.
    pub fn buffered(count: u8, mut read: impl FnMut() -> i32) -> Option<Self> {
        let mut ring = Vec::new();
        let mut sum = 0i32;
        for _ in 0..count {
            let reading = read();
            ring.push(reading).ok()?;
            sum = sum.saturating_add(reading);
        }
        Some(Self {
            count,
            ring,
            next: 0,
            sum,
        })
    }

    pub fn count(&self) -> u8 {
        self.count
    }

    pub fn is_buffered(&self) -> bool {
        !self.ring.is_empty()
    }

    /// Feed one reading, returning a candidate value once one resolves
    pub fn push(&mut self, reading: i32, division: Division) -> Option<i32> {
        if self.count == 0 {
            return Some(reading);
        }
        let count = i32::from(self.count);

        if let Some(oldest) = self.ring.get_mut(self.next) {
            self.sum = self.sum - *oldest + reading;
            *oldest = reading;
            self.next = (self.next + 1) % self.ring.len();
            return Some(division.apply(self.sum, count));
        }

        self.sum = self.sum.saturating_add(reading);
        self.next += 1;
        if self.next < usize::from(self.count) {
            return None;
        }
        let average = division.apply(self.sum, count);
        self.sum = 0;
        self.next = 0;
        Some(average)
    }

    /// Current moving average (buffered mode only)
    pub fn average(&self, division: Division) -> Option<i32> {
        self.is_buffered()
            .then(|| division.apply(self.sum, i32::from(self.count)))
    }

    /// Reading stored in ring position `position` (0-based)
    pub fn get(&self, position: usize) -> Option<i32> {
        self.ring.get(position).copied()
    }

    /// Sum of the readings currently held
    pub fn sum(&self) -> i32 {
        self.sum
    }
}
