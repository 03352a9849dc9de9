//! Orbit pose of the asteroid as a pure function of simulated time.
//!
//! The speed slider scales the angular rate directly (`speed / 10` rad/s);
//! nothing here is a physical orbital velocity.

use serde::Serialize;
use std::f64::consts::PI;

use crate::params::{SimulationParameters, DIAMETER};

/// Orbit ring radius in scene units.
pub const ORBIT_RADIUS: f64 = 3.0;

/// Earth sphere radius in scene units.
pub const EARTH_RADIUS: f64 = 1.5;

/// Smallest visual scale; a 10 m body still shows up.
pub const SCALE_FLOOR: f64 = 0.05;

/// Largest visual scale.
pub const SCALE_CEILING: f64 = 2.5;

/// Amplitude of the cosmetic wobble, radians.
const SPIN_AMPLITUDE: f64 = 0.1;

/// Wobble rate, rad per wall-clock second.
const SPIN_RATE: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn norm(self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Pose {
    pub position: Vec3,
    pub spin: Vec3,
}

pub fn deg_to_rad(deg: f64) -> f64 {
    deg * PI / 180.0
}

/// Orbital phase for a given simulated time.
pub fn phase(sim_time_s: f64, speed_factor: f64) -> f64 {
    sim_time_s * (speed_factor / 10.0)
}

/// Period of one revolution in simulated seconds. Infinite for a stopped body.
pub fn period(speed_factor: f64) -> f64 {
    if speed_factor == 0.0 {
        return f64::INFINITY;
    }
    2.0 * PI * 10.0 / speed_factor.abs()
}

/// Position and spin at `sim_time_s`. Any time value is valid, including
/// negative or out-of-order ones.
pub fn position_at(sim_time_s: f64, speed_factor: f64, inclination_deg: f64, radius: f64) -> Pose {
    let t = phase(sim_time_s, speed_factor);
    let inc = deg_to_rad(inclination_deg);
    let position = Vec3 {
        x: t.cos() * radius,
        y: t.sin() * inc.sin() * radius,
        z: t.sin() * inc.cos() * radius,
    };
    Pose {
        position,
        spin: spin_at(sim_time_s),
    }
}

pub fn spin_at(time_s: f64) -> Vec3 {
    let a = time_s * SPIN_RATE;
    Vec3 {
        x: a.sin() * SPIN_AMPLITUDE,
        y: a.cos() * SPIN_AMPLITUDE,
        z: 0.0,
    }
}

/// Uniform visual scale for a body of `diameter_m`. Monotonic, clamped to
/// [`SCALE_FLOOR`, `SCALE_CEILING`].
pub fn body_scale(diameter_m: f64) -> f64 {
    if diameter_m.is_nan() {
        return SCALE_FLOOR;
    }
    (diameter_m / 200.0).clamp(SCALE_FLOOR, SCALE_CEILING)
}

/// Closed polyline tracing one full revolution, for drawing the orbit ring.
pub fn orbit_path(inclination_deg: f64, radius: f64, samples: usize) -> Vec<Vec3> {
    let n = samples.max(3);
    (0..=n)
        .map(|i| {
            // speed_factor 10 makes phase == time
            let t = (i as f64 / n as f64) * 2.0 * PI;
            position_at(t, 10.0, inclination_deg, radius).position
        })
        .collect()
}

/// Everything the rendering surface needs for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OrbitFrame {
    pub time_offset_s: f64,
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: f64,
    /// Tilt of the orbit plane, radians.
    pub orbit_tilt: f64,
}

pub fn frame_at(params: &SimulationParameters, time_offset_s: f64) -> OrbitFrame {
    let pose = position_at(
        time_offset_s,
        params.speed_km_s,
        params.inclination_deg,
        ORBIT_RADIUS,
    );
    OrbitFrame {
        time_offset_s,
        position: pose.position,
        rotation: pose.spin,
        scale: body_scale(params.diameter_m),
        orbit_tilt: deg_to_rad(params.inclination_deg),
    }
}

/// Visual scale of the smallest and largest body the sliders allow.
pub fn scale_bounds() -> (f64, f64) {
    (body_scale(DIAMETER.min), body_scale(DIAMETER.max))
}
