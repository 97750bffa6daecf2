// src/schedule/mod.rs

//! Recurring schedule bookkeeping.
//!
//! - [`cadence`] parses schedule expressions into a fixed [`Cadence`].
//! - [`interval`] defines the half-open logical [`Interval`] a run covers.
//! - [`clock`] decides which intervals are due, with or without catchup.

pub mod cadence;
pub mod clock;
pub mod interval;

pub use cadence::{parse_duration, Cadence};
pub use clock::{DueIntervals, ScheduleClock};
pub use interval::Interval;
