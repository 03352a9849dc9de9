//! Run state machine.
//!
//! Each trigger bumps a generation counter. The local estimate is published
//! synchronously; the backend answer, when it arrives, is applied only if its
//! generation is still current. Late answers from superseded runs are dropped.

use chrono::{DateTime, Local};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Serialize;

use crate::error::{ErrorDetail, PredictError};
use crate::normalize::{ImpactCoordinate, PredictionResult, Reading};
use crate::params::SimulationParameters;
use crate::physics::{self, round2, PhysicsEstimate};
use crate::prediction::PredictRequest;

/// Placeholder shown for values that do not exist yet.
pub const PLACEHOLDER: &str = "--";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    LocalEstimate,
    Backend,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DisplayedCoordinate {
    pub coordinate: ImpactCoordinate,
    pub provenance: Provenance,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunState {
    Idle,
    Running {
        generation: u64,
        params: SimulationParameters,
    },
    Succeeded {
        estimate: PhysicsEstimate,
        prediction: Option<PredictionResult>,
    },
    Failed(ErrorDetail),
}

impl RunState {
    pub fn label(&self) -> &'static str {
        match self {
            RunState::Idle => "Idle",
            RunState::Running { .. } => "Running",
            RunState::Succeeded { .. } => "Succeeded",
            RunState::Failed(_) => "Failed",
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, RunState::Running { .. })
    }
}

/// Work handed out by [`RunController::trigger`] for the async side.
#[derive(Debug, Clone, PartialEq)]
pub struct RunTicket {
    pub generation: u64,
    pub request: PredictRequest,
}

#[derive(Debug)]
pub struct RunOutcome {
    pub generation: u64,
    pub result: Result<PredictionResult, PredictError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Applied,
    Stale,
}

/// What the UI renders. Everything is preformatted text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayState {
    pub generation: u64,
    pub state: &'static str,
    pub loading: bool,
    pub error: Option<String>,
    pub energy: String,
    pub latitude: String,
    pub longitude: String,
    pub coordinate_source: Option<Provenance>,
    pub impact_probability: Option<String>,
    pub crater_diameter: Option<String>,
    pub historical_context: Option<String>,
    pub population_impact: Option<String>,
    pub completed_at: Option<DateTime<Local>>,
}

#[derive(Debug)]
pub struct RunController {
    generation: u64,
    state: RunState,
    estimate: Option<PhysicsEstimate>,
    coordinate: Option<DisplayedCoordinate>,
    prediction: Option<PredictionResult>,
    completed_at: Option<DateTime<Local>>,
    meteor_type: String,
    use_backend: bool,
    rng: StdRng,
}

impl RunController {
    pub fn new(meteor_type: impl Into<String>, use_backend: bool, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Self {
            generation: 0,
            state: RunState::Idle,
            estimate: None,
            coordinate: None,
            prediction: None,
            completed_at: None,
            meteor_type: meteor_type.into(),
            use_backend,
            rng,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn estimate(&self) -> Option<&PhysicsEstimate> {
        self.estimate.as_ref()
    }

    pub fn coordinate(&self) -> Option<&DisplayedCoordinate> {
        self.coordinate.as_ref()
    }

    /// Start a run from `params`. A run already in flight is superseded.
    ///
    /// Returns the backend work to perform, or `None` when the backend is
    /// disabled and the run finished locally.
    pub fn trigger(&mut self, params: SimulationParameters) -> Option<RunTicket> {
        if let RunState::Running { generation, .. } = self.state {
            tracing::info!(superseded = generation, "run triggered while another is in flight");
        }
        self.generation += 1;
        let generation = self.generation;

        let estimate = physics::estimate(params.diameter_m, params.speed_km_s);
        let coordinate = self.local_estimate();
        self.estimate = Some(estimate);
        self.coordinate = Some(DisplayedCoordinate {
            coordinate,
            provenance: Provenance::LocalEstimate,
        });
        self.prediction = None;
        self.completed_at = None;

        tracing::info!(
            generation,
            diameter_m = params.diameter_m,
            speed_km_s = params.speed_km_s,
            energy = %estimate.energy_label(),
            lat = coordinate.latitude,
            lon = coordinate.longitude,
            "local estimate published"
        );

        if !self.use_backend {
            self.state = RunState::Succeeded {
                estimate,
                prediction: None,
            };
            self.completed_at = Some(Local::now());
            return None;
        }

        self.state = RunState::Running { generation, params };
        Some(RunTicket {
            generation,
            request: PredictRequest::new(
                params.speed_km_s,
                estimate.mass_kg,
                Some(self.meteor_type.as_str()),
                params.impact_year,
            ),
        })
    }

    /// Apply a backend answer. Anything from an older generation is ignored.
    pub fn resolve(&mut self, outcome: RunOutcome) -> Resolution {
        if outcome.generation != self.generation || !self.state.is_running() {
            tracing::debug!(
                stale = outcome.generation,
                current = self.generation,
                "discarding stale prediction outcome"
            );
            return Resolution::Stale;
        }
        // only a running state has a matching generation, so an estimate exists
        let Some(estimate) = self.estimate else {
            return Resolution::Stale;
        };

        match outcome.result {
            Ok(prediction) => {
                if let Reading::Available(c) = prediction.coordinates {
                    self.coordinate = Some(DisplayedCoordinate {
                        coordinate: c,
                        provenance: Provenance::Backend,
                    });
                }
                tracing::info!(
                    generation = outcome.generation,
                    shape = ?prediction.shape,
                    "prediction merged"
                );
                self.prediction = Some(prediction.clone());
                self.state = RunState::Succeeded {
                    estimate,
                    prediction: Some(prediction),
                };
            }
            Err(err) => {
                tracing::warn!(generation = outcome.generation, error = %err, "prediction failed");
                self.state = RunState::Failed(ErrorDetail::from(&err));
            }
        }
        self.completed_at = Some(Local::now());
        Resolution::Applied
    }

    fn local_estimate(&mut self) -> ImpactCoordinate {
        ImpactCoordinate {
            latitude: round2(self.rng.gen_range(-90.0..=90.0)),
            longitude: round2(self.rng.gen_range(-180.0..=180.0)),
        }
    }

    pub fn display(&self) -> DisplayState {
        let (latitude, longitude) = match &self.coordinate {
            Some(c) => (
                format!("{:.2}", c.coordinate.latitude),
                format!("{:.2}", c.coordinate.longitude),
            ),
            None => (PLACEHOLDER.to_string(), PLACEHOLDER.to_string()),
        };
        let p = self.prediction.as_ref();
        DisplayState {
            generation: self.generation,
            state: self.state.label(),
            loading: self.state.is_running(),
            error: match &self.state {
                RunState::Failed(e) => Some(e.message.clone()),
                _ => None,
            },
            energy: self
                .estimate
                .map(|e| e.energy_label())
                .unwrap_or_else(|| PLACEHOLDER.to_string()),
            latitude,
            longitude,
            coordinate_source: self.coordinate.map(|c| c.provenance),
            impact_probability: p.map(|p| p.impact_probability.label(|v| format!("{:.1}%", v * 100.0))),
            crater_diameter: p.map(|p| p.crater_diameter_km.label(|v| format!("{v:.2} km"))),
            historical_context: p.map(|p| p.historical_context.label(String::clone)),
            population_impact: p.map(|p| p.population_impact.label(String::clone)),
            completed_at: self.completed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use serde_json::json;

    fn controller() -> RunController {
        RunController::new("generic", true, Some(7))
    }

    fn ok(generation: u64, body: serde_json::Value) -> RunOutcome {
        RunOutcome {
            generation,
            result: Ok(normalize(body)),
        }
    }

    #[test]
    fn test_idle_display_uses_placeholders() {
        let c = controller();
        let d = c.display();
        assert_eq!(c.state(), &RunState::Idle);
        assert!(!d.loading);
        assert_eq!(d.energy, PLACEHOLDER);
        assert_eq!(d.latitude, PLACEHOLDER);
        assert_eq!(d.longitude, PLACEHOLDER);
        assert!(d.coordinate_source.is_none());
    }

    #[test]
    fn test_local_estimate_published_before_backend() {
        let mut c = controller();
        let ticket = c.trigger(SimulationParameters::default()).unwrap();
        assert_eq!(ticket.generation, 1);
        assert_eq!(ticket.request.meteor_type, "generic");
        assert_eq!(ticket.request.year, 1950);

        let d = c.display();
        assert!(d.loading);
        assert_eq!(d.energy, "75085866.48 MT");
        assert_eq!(d.coordinate_source, Some(Provenance::LocalEstimate));
        let coord = c.coordinate().unwrap().coordinate;
        assert!((-90.0..=90.0).contains(&coord.latitude));
        assert!((-180.0..=180.0).contains(&coord.longitude));
    }

    #[test]
    fn test_backend_coordinates_supersede_local() {
        let mut c = controller();
        let t = c.trigger(SimulationParameters::default()).unwrap();
        let r = c.resolve(ok(
            t.generation,
            json!({"impact_coordinates": {"lat": 12.5, "lon": -45.2}, "population_impact": "High"}),
        ));
        assert_eq!(r, Resolution::Applied);
        let d = c.display();
        assert_eq!(d.state, "Succeeded");
        assert_eq!(d.latitude, "12.50");
        assert_eq!(d.longitude, "-45.20");
        assert_eq!(d.coordinate_source, Some(Provenance::Backend));
        assert_eq!(d.population_impact.as_deref(), Some("High"));
        assert_eq!(d.crater_diameter.as_deref(), Some("unavailable"));
        let coord = c.coordinate().unwrap().coordinate;
        assert_eq!(coord.latitude, 12.5);
        assert_eq!(coord.longitude, -45.2);
    }

    #[test]
    fn test_missing_backend_coordinates_keep_local() {
        let mut c = controller();
        let t = c.trigger(SimulationParameters::default()).unwrap();
        let local = *c.coordinate().unwrap();
        c.resolve(ok(t.generation, json!({"impact_probability": 0.25})));
        assert_eq!(c.coordinate(), Some(&local));
        assert_eq!(c.display().impact_probability.as_deref(), Some("25.0%"));
    }

    #[test]
    fn test_stale_generation_discarded() {
        let mut c = controller();
        let g1 = c.trigger(SimulationParameters::default()).unwrap();
        let params2 = SimulationParameters {
            diameter_m: 200.0,
            ..SimulationParameters::default()
        };
        let g2 = c.trigger(params2).unwrap();
        assert_eq!(g2.generation, 2);

        // G1 answers late, after G2 started
        let r = c.resolve(ok(g1.generation, json!({"lat": 1.0, "lon": 1.0})));
        assert_eq!(r, Resolution::Stale);
        assert!(c.state().is_running());
        assert_eq!(c.coordinate().unwrap().provenance, Provenance::LocalEstimate);

        c.resolve(ok(g2.generation, json!({"lat": 3.0, "lon": 4.0})));
        let coord = c.coordinate().unwrap().coordinate;
        assert_eq!((coord.latitude, coord.longitude), (3.0, 4.0));
        assert_eq!(c.display().energy, physics::estimate(200.0, 20.0).energy_label());

        // and G1 arriving even later changes nothing
        let before = c.display();
        assert_eq!(c.resolve(ok(g1.generation, json!({"lat": 9.0, "lon": 9.0}))), Resolution::Stale);
        assert_eq!(c.display(), before);
    }

    #[test]
    fn test_stale_failure_discarded() {
        let mut c = controller();
        let g1 = c.trigger(SimulationParameters::default()).unwrap();
        let g2 = c.trigger(SimulationParameters::default()).unwrap();
        let before = c.display();

        let r = c.resolve(RunOutcome {
            generation: g1.generation,
            result: Err(PredictError::Protocol {
                status: 500,
                body: "server overloaded".into(),
            }),
        });
        assert_eq!(r, Resolution::Stale);
        assert!(matches!(
            c.state(),
            RunState::Running { generation, .. } if *generation == g2.generation
        ));
        let d = c.display();
        assert!(d.error.is_none());
        assert!(d.loading);
        assert_eq!(d, before);
    }

    #[test]
    fn test_failure_keeps_local_estimate() {
        let mut c = controller();
        let t = c.trigger(SimulationParameters::default()).unwrap();
        let estimate = *c.estimate().unwrap();
        let coord = *c.coordinate().unwrap();

        c.resolve(RunOutcome {
            generation: t.generation,
            result: Err(PredictError::Protocol {
                status: 500,
                body: "server overloaded".into(),
            }),
        });

        match c.state() {
            RunState::Failed(e) => {
                assert!(e.message.contains("500"));
                assert!(e.message.contains("server overloaded"));
            }
            other => panic!("expected Failed, got {other:?}"),
        }
        assert_eq!(c.estimate(), Some(&estimate));
        assert_eq!(c.coordinate(), Some(&coord));
        let d = c.display();
        assert!(!d.loading);
        assert_eq!(d.energy, "75085866.48 MT");
        assert!(d.error.is_some());
    }

    #[test]
    fn test_offline_run_completes_synchronously() {
        let mut c = RunController::new("generic", false, Some(1));
        assert!(c.trigger(SimulationParameters::default()).is_none());
        match c.state() {
            RunState::Succeeded { prediction, .. } => assert!(prediction.is_none()),
            other => panic!("expected Succeeded, got {other:?}"),
        }
        assert!(c.display().completed_at.is_some());
    }

    #[test]
    fn test_new_run_clears_previous_terminal_state() {
        let mut c = controller();
        let t = c.trigger(SimulationParameters::default()).unwrap();
        c.resolve(RunOutcome {
            generation: t.generation,
            result: Err(PredictError::Network("refused".into())),
        });
        assert!(c.display().error.is_some());
        c.trigger(SimulationParameters::default());
        let d = c.display();
        assert!(d.error.is_none());
        assert!(d.loading);
        assert!(d.impact_probability.is_none());
    }

    #[test]
    fn test_seeded_estimates_repeat() {
        let mut a = RunController::new("generic", false, Some(99));
        let mut b = RunController::new("generic", false, Some(99));
        a.trigger(SimulationParameters::default());
        b.trigger(SimulationParameters::default());
        assert_eq!(a.coordinate(), b.coordinate());
    }
}
