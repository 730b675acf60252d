#![allow(clippy::field_reassign_with_default)]

//! Crate containing models for coupled thermal simulation of an electric
//! vehicle: powertrain heat, cabin heat load, a liquid coolant loop with a
//! refrigerant chiller and a multi-level radiator, integrated with explicit
//! Euler steps over five lumped thermal nodes.
//! # Features:
//! - logging: emit warnings and progress through the `log` facade (default)

#[macro_use]
pub mod macros;

pub mod air;
pub mod cabin;
pub mod data_manager;
pub mod engine;
pub mod imports;
pub mod params;
pub mod prelude;
pub mod refrigeration;
pub mod results;
pub mod tms;
pub mod traits;
pub mod utils;
pub mod vehicle_motion;
