//! Progress representations
//!
//! A [`Progress`] turns the elapsed part of an active window into the value
//! handed to the timeline handler. [`Fraction`] reports `0.0..=1.0`;
//! [`Mapped`] interpolates directly between two integer bounds without
//! floating point.

use tickwork_hal::Tick;

/// Maps elapsed window time to a progress value
pub trait Progress {
    /// Value delivered to the handler
    type Value: Copy;

    /// Value delivered when a postponed window becomes active
    fn start(&self) -> Self::Value;

    /// Value delivered exactly once when a window completes
    fn end(&self) -> Self::Value;

    /// Value for `elapsed` ticks into a window of `duration` ticks
    ///
    /// Only called with `elapsed < duration`.
    fn at(&self, elapsed: Tick, duration: Tick) -> Self::Value;
}

/// Largest `f32` below 1.0
const BELOW_ONE: f32 = 1.0 - f32::EPSILON / 2.0;

/// Fractional progress from 0.0 to 1.0
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Fraction;

impl Progress for Fraction {
    type Value = f32;

    fn start(&self) -> f32 {
        0.0
    }

    fn end(&self) -> f32 {
        1.0
    }

    fn at(&self, elapsed: Tick, duration: Tick) -> f32 {
        let p = elapsed as f32 / duration as f32;
        // Long windows can round up to 1.0 before they end
        if p < BELOW_ONE {
            p
        } else {
            BELOW_ONE
        }
    }
}

/// Integer type a [`Mapped`] progress can produce
pub trait MapValue: Copy {
    /// Lower bound used until [`Mapped::set_bounds`] is called
    const DEFAULT_MIN: Self;
    /// Upper bound used until [`Mapped::set_bounds`] is called
    const DEFAULT_MAX: Self;

    fn to_wide(self) -> i128;

    /// Narrow an interpolated value, saturating at the type bounds
    fn from_wide(value: i128) -> Self;
}

macro_rules! map_value {
    ($($ty:ty => $max:expr),* $(,)?) => {
        $(
            impl MapValue for $ty {
                const DEFAULT_MIN: Self = 0;
                const DEFAULT_MAX: Self = $max;

                fn to_wide(self) -> i128 {
                    i128::from(self)
                }

                fn from_wide(value: i128) -> Self {
                    <$ty>::try_from(value).unwrap_or(if value < 0 { <$ty>::MIN } else { <$ty>::MAX })
                }
            }
        )*
    };
}

map_value! {
    u8 => 255,
    i8 => 127,
    u16 => 1023,
    i16 => 1023,
    u32 => 1023,
    i32 => 1023,
    u64 => 1023,
    i64 => 1023,
}

/// Progress linearly mapped between `min` and `max`
///
/// Defaults to `0..=255` for single-byte types (`0..=127` for `i8`) and
/// `0..=1023` otherwise. `min > max` produces a falling ramp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mapped<T> {
    min: T,
    max: T,
}

impl<T: MapValue> Mapped<T> {
    pub fn new(min: T, max: T) -> Self {
        Self { min, max }
    }

    /// Change the mapping range
    pub fn set_bounds(&mut self, min: T, max: T) {
        self.min = min;
        self.max = max;
    }

    pub fn min(&self) -> T {
        self.min
    }

    pub fn max(&self) -> T {
        self.max
    }
}

impl<T: MapValue> Default for Mapped<T> {
    fn default() -> Self {
        Self::new(T::DEFAULT_MIN, T::DEFAULT_MAX)
    }
}

impl<T: MapValue> Progress for Mapped<T> {
    type Value = T;

    fn start(&self) -> T {
        self.min
    }

    fn end(&self) -> T {
        self.max
    }

    fn at(&self, elapsed: Tick, duration: Tick) -> T {
        // elapsed spans 0..=duration-1 onto min..=max
        let last = i128::from(duration.saturating_sub(1));
        if last == 0 {
            return self.min;
        }
        let min = self.min.to_wide();
        let span = self.max.to_wide() - min;
        T::from_wide(min + i128::from(elapsed) * span / last)
    }
}

/// Round half away from zero
fn round(value: f64) -> f64 {
    if value >= 0.0 {
        (value + 0.5) as i64 as f64
    } else {
        (value - 0.5) as i64 as f64
    }
}

/// Map a fractional progress onto `low..=high`, rounded
pub fn map_to_i32(progress: f32, low: i32, high: i32) -> i32 {
    let span = f64::from(high) - f64::from(low);
    (round(span * f64::from(progress)) + f64::from(low)) as i32
}

/// Map a fractional progress onto `low..=high`, rounded
pub fn map_to_u32(progress: f32, low: u32, high: u32) -> u32 {
    let span = f64::from(high) - f64::from(low);
    (round(span * f64::from(progress)) + f64::from(low)) as u32
}

/// Map a fractional progress onto `low..=high`
pub fn map_to_f32(progress: f32, low: f32, high: f32) -> f32 {
    (high - low) * progress + low
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraction_stays_below_one() {
        assert_eq!(Fraction.at(0, 1000), 0.0);
        assert_eq!(Fraction.at(500, 1000), 0.5);
        assert!(Fraction.at(Tick::MAX - 1, Tick::MAX) < 1.0);
    }

    #[test]
    fn test_mapped_defaults() {
        assert_eq!(Mapped::<u8>::default().max(), 255);
        assert_eq!(Mapped::<i8>::default().max(), 127);
        assert_eq!(Mapped::<u16>::default().max(), 1023);
        assert_eq!(Mapped::<i32>::default().min(), 0);
    }

    #[test]
    fn test_mapped_spans_bounds() {
        let m = Mapped::<u8>::default();
        assert_eq!(m.at(0, 256), 0);
        assert_eq!(m.at(255, 256), 255);
        assert_eq!(m.at(128, 256), 128);
    }

    #[test]
    fn test_mapped_single_tick_window() {
        let m = Mapped::<u16>::new(10, 20);
        assert_eq!(m.at(0, 1), 10);
    }

    #[test]
    fn test_mapped_falling_ramp() {
        let m = Mapped::<i16>::new(100, -100);
        assert_eq!(m.at(0, 11), 100);
        assert_eq!(m.at(5, 11), 0);
        assert_eq!(m.at(10, 11), -100);
    }

    #[test]
    fn test_map_helpers() {
        assert_eq!(map_to_i32(0.5, 0, 255), 128);
        assert_eq!(map_to_i32(0.5, -10, 10), 0);
        assert_eq!(map_to_i32(1.0, -10, 10), 10);
        assert_eq!(map_to_u32(0.25, 100, 200), 125);
        assert_eq!(map_to_f32(0.5, 1.0, 3.0), 2.0);
    }
}
