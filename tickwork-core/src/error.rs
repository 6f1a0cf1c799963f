//! Error and warning taxonomy
//!
//! All errors are recovered locally: the component that detects one degrades
//! to a safe behavior, reports it through the diagnostics reporter and hands
//! it back to the caller.

/// Errors raised by engine operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Slot index is outside the component's capacity
    BadIndex,
    /// Argument outside its accepted range
    BadParameter,
    /// Operation not supported by the channel or slot in its current state
    InvalidOperation,
    /// Requested capacity exceeds the available storage
    NotEnoughMemory,
    /// Tick arithmetic would wrap past the counter width
    Rollover,
}

impl Error {
    /// Numeric code used in diagnostic reports
    pub const fn code(self) -> u8 {
        match self {
            Error::BadIndex => 1,
            Error::BadParameter => 5,
            Error::InvalidOperation => 6,
            Error::NotEnoughMemory => 7,
            Error::Rollover => 9,
        }
    }
}

/// Non-fatal conditions worth reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Warning {
    /// Resumed or restarted a slot that was still running
    ResumeActive,
}

impl Warning {
    /// Numeric code used in diagnostic reports
    pub const fn code(self) -> u8 {
        match self {
            Warning::ResumeActive => 101,
        }
    }
}
