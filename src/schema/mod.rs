//! Data model shared by every story engine.

pub mod constraint;
pub mod hysteresis;
pub mod route;
pub mod transformation;
