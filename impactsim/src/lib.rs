//! Asteroid impact simulation engine: slider parameters, a local physics
//! estimate, an optional prediction backend, and the orbit animation feed.

pub mod config;
pub mod controller;
pub mod error;
pub mod kinematics;
pub mod normalize;
pub mod params;
pub mod physics;
pub mod prediction;
pub mod scheduler;
pub mod session;
pub mod telemetry;
