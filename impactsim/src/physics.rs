//! Order-of-magnitude impact energetics for a stony sphere.

use serde::Serialize;
use std::f64::consts::PI;

use crate::error::ParamError;

/// Bulk density of the impactor (kg/m³).
pub const DENSITY_KG_M3: f64 = 3000.0;

/// Divisor from joules to the displayed TNT-equivalent yield.
pub const JOULES_PER_TON_TNT: f64 = 4.184e9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PhysicsEstimate {
    pub mass_kg: f64,
    pub energy_joules: f64,
    /// `energy_joules / 4.184e9`, rounded to 2 decimals. Shown with an
    /// "MT" suffix.
    pub tnt_equivalent: f64,
}

impl PhysicsEstimate {
    /// Display form, e.g. `"75085866.48 MT"`.
    pub fn energy_label(&self) -> String {
        format_yield(self.tnt_equivalent)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Energy {
    pub joules: f64,
    pub tnt_equivalent: f64,
}

fn check(name: &'static str, value: f64) -> Result<f64, ParamError> {
    if value.is_nan() || value < 0.0 {
        return Err(ParamError::InvalidParameter { name, value });
    }
    Ok(value)
}

/// Mass of a sphere of diameter `diameter_m` at [`DENSITY_KG_M3`].
pub fn compute_mass(diameter_m: f64) -> Result<f64, ParamError> {
    let d = check("diameter", diameter_m)?;
    let r = d / 2.0;
    let volume = (4.0 / 3.0) * PI * r.powi(3);
    Ok(DENSITY_KG_M3 * volume)
}

pub fn compute_energy(diameter_m: f64, speed_km_s: f64) -> Result<Energy, ParamError> {
    let mass = compute_mass(diameter_m)?;
    let v = check("speed", speed_km_s)? * 1000.0;
    let joules = 0.5 * mass * v * v;
    Ok(Energy {
        joules,
        tnt_equivalent: round2(joules / JOULES_PER_TON_TNT),
    })
}

/// Total version used by a run: bad input is coerced to 0 and logged.
pub fn estimate(diameter_m: f64, speed_km_s: f64) -> PhysicsEstimate {
    let d = coerce("diameter", diameter_m);
    let v = coerce("speed", speed_km_s);
    // both inputs are finite and non-negative after coercion
    let mass_kg = compute_mass(d).unwrap_or(0.0);
    let energy = compute_energy(d, v).unwrap_or(Energy {
        joules: 0.0,
        tnt_equivalent: 0.0,
    });
    PhysicsEstimate {
        mass_kg,
        energy_joules: energy.joules,
        tnt_equivalent: energy.tnt_equivalent,
    }
}

fn coerce(name: &'static str, value: f64) -> f64 {
    match check(name, value) {
        Ok(v) if v.is_finite() => v,
        _ => {
            tracing::warn!(parameter = name, value, "invalid physics input coerced to 0");
            0.0
        }
    }
}

pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

pub fn format_yield(tnt: f64) -> String {
    format!("{tnt:.2} MT")
}
