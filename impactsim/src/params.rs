//! Tunable asteroid parameters and their UI bounds.

use serde::{Deserialize, Serialize};

/// Parameter specification with bounds and step size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    /// Human-readable label.
    pub label: &'static str,
    /// Minimum value.
    pub min: f64,
    /// Maximum value.
    pub max: f64,
    /// Step size for one key press.
    pub step: f64,
}

impl ParamSpec {
    pub const fn new(label: &'static str, min: f64, max: f64, step: f64) -> Self {
        Self {
            label,
            min,
            max,
            step,
        }
    }

    pub fn clamp(&self, v: f64) -> f64 {
        if v.is_nan() {
            return self.min;
        }
        v.clamp(self.min, self.max)
    }

    /// Position of `v` inside the range, 0..=1.
    pub fn fraction(&self, v: f64) -> f64 {
        ((self.clamp(v) - self.min) / (self.max - self.min)).clamp(0.0, 1.0)
    }
}

pub const DIAMETER: ParamSpec = ParamSpec::new("SIZE (m)", 10.0, 500.0, 10.0);
pub const SPEED: ParamSpec = ParamSpec::new("SPEED (km/s)", 5.0, 50.0, 1.0);
pub const INCLINATION: ParamSpec = ParamSpec::new("INCLINATION (°)", 0.0, 90.0, 1.0);
pub const YEAR: ParamSpec = ParamSpec::new("YEAR", 1600.0, 2000.0, 10.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Field {
    Diameter,
    Speed,
    Inclination,
    Year,
}

impl Field {
    pub fn all() -> &'static [Field] {
        &[Field::Diameter, Field::Speed, Field::Inclination, Field::Year]
    }

    pub fn spec(self) -> ParamSpec {
        match self {
            Field::Diameter => DIAMETER,
            Field::Speed => SPEED,
            Field::Inclination => INCLINATION,
            Field::Year => YEAR,
        }
    }
}

/// One snapshot of the user's slider values.
///
/// The UI layer is the only writer; the run controller and the animation
/// scheduler each take a copy at the moment they need one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationParameters {
    pub diameter_m: f64,
    pub speed_km_s: f64,
    pub inclination_deg: f64,
    pub impact_year: i32,
}

impl Default for SimulationParameters {
    fn default() -> Self {
        Self {
            diameter_m: 100.0,
            speed_km_s: 20.0,
            inclination_deg: 45.0,
            impact_year: 1950,
        }
    }
}

impl SimulationParameters {
    pub fn get(&self, field: Field) -> f64 {
        match field {
            Field::Diameter => self.diameter_m,
            Field::Speed => self.speed_km_s,
            Field::Inclination => self.inclination_deg,
            Field::Year => self.impact_year as f64,
        }
    }

    pub fn set(&mut self, field: Field, v: f64) {
        let v = field.spec().clamp(v);
        match field {
            Field::Diameter => self.diameter_m = v,
            Field::Speed => self.speed_km_s = v,
            Field::Inclination => self.inclination_deg = v,
            Field::Year => self.impact_year = v.round() as i32,
        }
    }

    /// Move `field` by `steps` slider steps, staying inside its bounds.
    pub fn adjust(&mut self, field: Field, steps: i32) {
        let spec = field.spec();
        let next = self.get(field) + spec.step * steps as f64;
        self.set(field, next);
    }

    /// Copy with every field snapped into its UI range.
    pub fn clamped(&self) -> Self {
        let mut out = *self;
        for f in Field::all() {
            out.set(*f, self.get(*f));
        }
        out
    }
}
