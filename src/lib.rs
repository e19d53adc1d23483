//! Narrative Constraints: interactive fiction driven by bounded pressures.
//!
//! Each story is a deterministic state machine over constraints,
//! one-shot transformation rules and latched hysteresis flags. Time advances
//! through `Story::advance`, reader input through `Story::apply`, and the
//! `core::scheduler` drives either on a real-time cadence.

pub mod core;
pub mod schema;
pub mod stories;
