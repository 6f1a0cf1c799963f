//! Components built on the tickwork engine
//!
//! - [`button::Buttons`] - debounced push buttons with auto-repeat
//! - [`gpio::GpioChannels`] - `embedded-hal` digital pins as engine channels

#![no_std]
#![deny(unsafe_code)]

pub mod button;
pub mod gpio;

pub use button::{ButtonEvent, ButtonHandler, Buttons};
pub use gpio::GpioChannels;
