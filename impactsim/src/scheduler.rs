//! Animation scheduler: one tick per display refresh, never blocked by a run.
//!
//! The render target is owned by the scheduler task for its whole life and
//! handed back by [`SchedulerHandle::stop`], so no tick can reach a target
//! after teardown.

use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::error::SchedulerError;
use crate::kinematics::{frame_at, OrbitFrame};
use crate::params::SimulationParameters;

/// The surface that consumes one [`OrbitFrame`] per tick.
pub trait RenderTarget: Send + 'static {
    /// Whether the surface exists yet. Polled before the first tick.
    fn is_ready(&self) -> bool;
    fn apply(&mut self, frame: &OrbitFrame);
}

/// Bounded wait for the render target to appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MountPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for MountPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 20,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(1),
        }
    }
}

impl MountPolicy {
    /// Delay before poll number `attempt` (0-based), doubling up to the cap.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.min(16)).unwrap_or(u32::MAX);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

pub fn cadence_for_fps(fps: u32) -> Duration {
    Duration::from_secs_f64(1.0 / fps.clamp(1, 240) as f64)
}

pub struct SchedulerHandle<T> {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<T, SchedulerError>>,
}

impl<T> SchedulerHandle<T> {
    /// Stop ticking and take the target back.
    pub async fn stop(mut self) -> Result<T, SchedulerError> {
        if let Some(tx) = self.stop.take() {
            let _ = tx.send(());
        }
        match (&mut self.task).await {
            Ok(res) => res,
            Err(e) => {
                tracing::error!(error = %e, "animation task ended abnormally");
                Err(SchedulerError::Stopped)
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

enum Mount {
    Ready,
    Cancelled,
}

// targets are only `Send`, so no shared borrow may live across an await
async fn wait_until_ready<T: RenderTarget>(
    target: &mut T,
    policy: &MountPolicy,
    stop: &mut oneshot::Receiver<()>,
) -> Result<Mount, SchedulerError> {
    for attempt in 0..policy.max_attempts {
        if target.is_ready() {
            if attempt > 0 {
                tracing::debug!(attempt, "render target ready");
            }
            return Ok(Mount::Ready);
        }
        tokio::select! {
            biased;
            _ = &mut *stop => return Ok(Mount::Cancelled),
            _ = time::sleep(policy.backoff(attempt)) => {}
        }
    }
    if target.is_ready() {
        return Ok(Mount::Ready);
    }
    tracing::error!(attempts = policy.max_attempts, "render target never became ready");
    Err(SchedulerError::TargetNeverReady {
        attempts: policy.max_attempts,
    })
}

/// Spawn the tick loop. Parameters are read as a fresh copy on every tick.
pub fn spawn<T: RenderTarget>(
    mut target: T,
    params: watch::Receiver<SimulationParameters>,
    cadence: Duration,
    mount: MountPolicy,
) -> SchedulerHandle<T> {
    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        if let Mount::Cancelled = wait_until_ready(&mut target, &mount, &mut stop_rx).await? {
            return Ok(target);
        }

        let started = Instant::now();
        let mut ticker = time::interval(cadence);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(cadence_ms = cadence.as_millis() as u64, "animation scheduler started");

        loop {
            tokio::select! {
                biased;
                // a dropped handle counts as a stop request too
                _ = &mut stop_rx => break,
                _ = ticker.tick() => {
                    let snapshot = *params.borrow();
                    let frame = frame_at(&snapshot, started.elapsed().as_secs_f64());
                    target.apply(&frame);
                }
            }
        }

        tracing::info!("animation scheduler stopped");
        Ok::<T, SchedulerError>(target)
    });

    SchedulerHandle {
        stop: Some(stop_tx),
        task,
    }
}

/// Render target that publishes the latest frame on a watch channel.
/// Ready while at least one receiver is alive.
pub struct FrameSink {
    tx: watch::Sender<Option<OrbitFrame>>,
}

impl FrameSink {
    pub fn channel() -> (Self, watch::Receiver<Option<OrbitFrame>>) {
        let (tx, rx) = watch::channel(None);
        (Self { tx }, rx)
    }
}

impl RenderTarget for FrameSink {
    fn is_ready(&self) -> bool {
        !self.tx.is_closed()
    }

    fn apply(&mut self, frame: &OrbitFrame) {
        self.tx.send_replace(Some(*frame));
    }
}
