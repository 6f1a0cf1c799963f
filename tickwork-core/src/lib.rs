//! Board-agnostic scheduling and signal-conditioning engine
//!
//! This crate lets a single polling loop multiplex many timed behaviors
//! without blocking delays or an RTOS:
//!
//! - [`timer::TimerBank`] - repeating and one-shot interval timers
//! - [`timeline::Timeline`] - postponable windows reporting progress
//! - [`signal::SignalConditioner`] - debounced, averaged edge detection
//! - [`waveform::WaveformGenerator`] - square pulses and triangle ramps
//!
//! Every component owns a fixed-capacity slot array and is driven by calling
//! its `tick()` once per loop iteration with the current [`Tick`]. Components
//! never call each other; they report to the application through handlers
//! passed to `tick()` and to the [`diagnostics`] reporter injected at
//! construction.

#![no_std]
#![deny(unsafe_code)]

pub mod channel;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod signal;
mod slots;
pub mod testing;
pub mod timeline;
pub mod timer;
pub mod waveform;

pub use config::{Division, EngineConfig, OverlapPolicy, TieBreak, TimingMode};
pub use diagnostics::{Diagnostic, Diagnostics, Reporter, Severity};
pub use error::{Error, Warning};
pub use tickwork_hal::{elapsed, Capabilities, ChannelId, ChannelIo, ChannelMode, Clock, Delay, Tick};
