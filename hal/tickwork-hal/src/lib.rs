//! Tickwork Hardware Abstraction Layer
//!
//! This crate defines the contracts the scheduling engine consumes from the
//! board: a monotonic tick counter, a blocking delay, and per-channel I/O.
//! Board support crates implement these traits; `tickwork-core` only ever
//! talks to hardware through them.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Application polling loop               │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  tickwork-core (timers, timelines, ...) │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  tickwork-hal (this crate - traits)     │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │ embedded-hal  │       │  board glue / │
//! │ pin adapters  │       │  simulators   │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`clock::Clock`] - Monotonic, wrapping tick source
//! - [`clock::Delay`] - Blocking delay (only used by explicit blocking reads)
//! - [`channel::ChannelIo`] - Digital/analog channel I/O

#![no_std]
#![deny(unsafe_code)]

pub mod channel;
pub mod clock;

pub use channel::{Capabilities, ChannelId, ChannelIo, ChannelMode};
pub use clock::{elapsed, Clock, Delay, Tick};
