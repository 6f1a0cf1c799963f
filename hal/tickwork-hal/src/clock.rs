//! Clock abstractions
//!
//! The tick counter is a fixed-width unsigned integer that wraps. All
//! elapsed-time math is done modulo the counter width, which is correct
//! across a single wraparound.

/// Monotonic tick value (32-bit)
#[cfg(not(feature = "tick64"))]
pub type Tick = u32;

/// Monotonic tick value (64-bit)
#[cfg(feature = "tick64")]
pub type Tick = u64;

/// Ticks elapsed from `since` to `now`, modulo the counter width
#[inline]
pub const fn elapsed(now: Tick, since: Tick) -> Tick {
    now.wrapping_sub(since)
}

/// Monotonic tick source
///
/// Implementations typically wrap a hardware timer or the system tick.
/// The unit of a tick is chosen by the board (milliseconds on most targets).
pub trait Clock {
    /// Current value of the tick counter
    fn now(&self) -> Tick;
}

/// Blocking delay
///
/// The engine never calls this from a `tick()`; it is only used by
/// operations documented as blocking.
pub trait Delay {
    /// Block for at least `ticks` ticks
    fn delay(&mut self, ticks: Tick);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elapsed_simple() {
        assert_eq!(elapsed(150, 100), 50);
        assert_eq!(elapsed(100, 100), 0);
    }

    #[test]
    fn test_elapsed_across_wrap() {
        let before_wrap = Tick::MAX - 9;
        assert_eq!(elapsed(5, before_wrap), 15);
    }
}
