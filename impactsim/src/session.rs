//! One simulation session: parameters, the run controller, and the channel
//! carrying backend answers back to it.

use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use crate::controller::{DisplayState, Resolution, RunController, RunOutcome, RunTicket};
use crate::error::PredictError;
use crate::params::SimulationParameters;
use crate::prediction::PredictionBackend;

pub struct Session<B> {
    params: watch::Sender<SimulationParameters>,
    controller: RunController,
    backend: Option<Arc<B>>,
    outcome_tx: mpsc::UnboundedSender<RunOutcome>,
    outcome_rx: mpsc::UnboundedReceiver<RunOutcome>,
}

impl<B: PredictionBackend> Session<B> {
    /// `backend: None` runs fully offline.
    pub fn new(
        backend: Option<B>,
        meteor_type: impl Into<String>,
        seed: Option<u64>,
    ) -> Self {
        let (params, _) = watch::channel(SimulationParameters::default());
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        let controller = RunController::new(meteor_type, backend.is_some(), seed);
        Self {
            params,
            controller,
            backend: backend.map(Arc::new),
            outcome_tx,
            outcome_rx,
        }
    }

    pub fn params(&self) -> SimulationParameters {
        *self.params.borrow()
    }

    pub fn subscribe_params(&self) -> watch::Receiver<SimulationParameters> {
        self.params.subscribe()
    }

    pub fn update_params(&self, f: impl FnOnce(&mut SimulationParameters)) {
        self.params.send_modify(|p| {
            f(p);
            *p = p.clamped();
        });
    }

    pub fn controller(&self) -> &RunController {
        &self.controller
    }

    pub fn display(&self) -> DisplayState {
        self.controller.display()
    }

    /// Start a run from the current parameters. The backend call runs on its
    /// own task; its answer comes back through [`Session::pump`] or
    /// [`Session::wait_outcome`].
    pub fn run(&mut self) -> u64 {
        let snapshot = self.params();
        if let Some(ticket) = self.controller.trigger(snapshot) {
            if let Some(backend) = &self.backend {
                dispatch(backend.clone(), ticket, self.outcome_tx.clone());
            }
        }
        self.controller.generation()
    }

    /// Apply every answer that has already arrived. Returns how many were
    /// applied (stale ones are not counted).
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(outcome) = self.outcome_rx.try_recv() {
            if self.controller.resolve(outcome) == Resolution::Applied {
                applied += 1;
            }
        }
        applied
    }

    /// Wait for the next answer and apply it.
    pub async fn wait_outcome(&mut self) -> Option<Resolution> {
        let outcome = self.outcome_rx.recv().await?;
        Some(self.controller.resolve(outcome))
    }

    /// Wait until the current run has left `Running`.
    pub async fn settle(&mut self) {
        while self.controller.state().is_running() {
            if self.wait_outcome().await.is_none() {
                break;
            }
        }
    }
}

/// Run one backend call and report back, whatever happens to it.
fn dispatch<B: PredictionBackend>(
    backend: Arc<B>,
    ticket: RunTicket,
    tx: mpsc::UnboundedSender<RunOutcome>,
) {
    let RunTicket {
        generation,
        request,
    } = ticket;
    tokio::spawn(async move {
        let call = tokio::spawn(async move { backend.predict(request).await });
        let result = match call.await {
            Ok(r) => r,
            Err(e) => Err(PredictError::Internal(e.to_string())),
        };
        if tx.send(RunOutcome { generation, result }).is_err() {
            tracing::debug!(generation, "session gone before prediction finished");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{Provenance, RunState};
    use crate::normalize::{normalize, PredictionResult};
    use crate::prediction::PredictRequest;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Sleeps `year - 1600` ms before answering, so tests can order responses.
    #[derive(Default)]
    struct FakeBackend {
        seen: Mutex<Vec<PredictRequest>>,
    }

    impl PredictionBackend for FakeBackend {
        async fn predict(&self, req: PredictRequest) -> Result<PredictionResult, PredictError> {
            self.seen.lock().unwrap().push(req.clone());
            let delay = (req.year - 1600).max(0) as u64;
            tokio::time::sleep(Duration::from_millis(delay)).await;
            match req.year {
                1666 => Err(PredictError::Protocol {
                    status: 500,
                    body: "server overloaded".into(),
                }),
                1777 => panic!("backend blew up"),
                y => Ok(normalize(json!({"lat": (y - 1900) as f64, "lon": 4.0}))),
            }
        }
    }

    fn session() -> Session<FakeBackend> {
        Session::new(Some(FakeBackend::default()), "generic", Some(3))
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_merges_backend_result() {
        let mut s = session();
        s.update_params(|p| p.impact_year = 1950);
        s.run();
        assert!(s.display().loading);
        assert_eq!(s.display().coordinate_source, Some(Provenance::LocalEstimate));

        s.settle().await;
        let d = s.display();
        assert_eq!(d.state, "Succeeded");
        assert_eq!(d.latitude, "50.00");
        assert_eq!(d.longitude, "4.00");
        assert_eq!(d.coordinate_source, Some(Provenance::Backend));
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_answer_from_older_run_is_ignored() {
        let mut s = session();
        // first run answers slowly (350 ms), second quickly (300 ms)
        s.update_params(|p| p.impact_year = 1950);
        let g1 = s.run();
        s.update_params(|p| p.impact_year = 1900);
        let g2 = s.run();
        assert!(g2 > g1);

        assert_eq!(s.wait_outcome().await, Some(Resolution::Applied));
        assert_eq!(s.display().latitude, "0.00");

        assert_eq!(s.wait_outcome().await, Some(Resolution::Stale));
        let d = s.display();
        assert_eq!(d.generation, g2);
        assert_eq!(d.latitude, "0.00");
    }

    #[tokio::test(start_paused = true)]
    async fn test_protocol_failure_degrades_to_local() {
        let mut s = session();
        s.update_params(|p| p.impact_year = 1666);
        s.run();
        let local = s.display();
        s.settle().await;
        let d = s.display();
        assert_eq!(d.state, "Failed");
        let msg = d.error.unwrap();
        assert!(msg.contains("500"));
        assert!(msg.contains("server overloaded"));
        assert_eq!(d.energy, local.energy);
        assert_eq!(d.latitude, local.latitude);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_backend_becomes_failed() {
        let mut s = session();
        s.update_params(|p| p.impact_year = 1777);
        s.run();
        s.settle().await;
        match s.controller().state() {
            RunState::Failed(e) => assert_eq!(e.message, "server error"),
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_offline_session_never_dispatches() {
        let mut s: Session<FakeBackend> = Session::new(None, "generic", Some(3));
        s.run();
        assert_eq!(s.display().state, "Succeeded");
        assert_eq!(s.pump(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_carries_snapshot() {
        let mut s = session();
        s.update_params(|p| {
            p.speed_km_s = 30.0;
            p.impact_year = 1910;
        });
        s.run();
        // later edits do not leak into the in-flight request
        s.update_params(|p| p.speed_km_s = 45.0);
        s.settle().await;
        let seen = s.backend.as_ref().unwrap().seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].velocity, 30.0);
        assert_eq!(seen[0].year, 1910);
        assert_eq!(seen[0].meteor_type, "generic");
    }

    #[test]
    fn test_update_params_clamps() {
        let s = session();
        s.update_params(|p| p.inclination_deg = 400.0);
        assert_eq!(s.params().inclination_deg, 90.0);
        let rx = s.subscribe_params();
        s.update_params(|p| p.diameter_m = 250.0);
        assert_eq!(rx.borrow().diameter_m, 250.0);
    }
}
