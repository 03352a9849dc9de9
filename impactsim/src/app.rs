use std::time::Instant;

use anyhow::Result;
use crossterm::event::{self, Event, KeyEventKind};
use tokio::sync::watch;

use impactsim::config::{save_settings_atomic, Paths, Settings};
use impactsim::kinematics::OrbitFrame;
use impactsim::params::Field;
use impactsim::prediction::HttpPredictionClient;
use impactsim::scheduler::{self, cadence_for_fps, FrameSink, MountPolicy, SchedulerHandle};
use impactsim::session::Session;

use crate::input::{map_key, Action, Screen};
use crate::intro::IntroState;
use crate::render::{draw_frame, restore_terminal, setup_terminal, Camera, Term, View};

pub(crate) struct App {
    /// What goes back to disk. Command-line overrides never land here.
    stored: Settings,
    settings: Settings,
    paths: Paths,
    session: Session<HttpPredictionClient>,
    backend_label: String,
    screen: Screen,
    intro: IntroState,
    selected: Field,
    camera: Camera,
    mono: bool,
    frames: watch::Receiver<Option<OrbitFrame>>,
    scheduler: Option<SchedulerHandle<FrameSink>>,
    should_quit: bool,
}

impl App {
    pub(crate) fn new(stored: Settings, settings: Settings, paths: Paths, mono: bool) -> Result<Self> {
        let (backend, backend_label) = if settings.use_backend {
            let client = HttpPredictionClient::new(&settings.client_config())?;
            let label = format!("backend {}", client.endpoint());
            (Some(client), label)
        } else {
            (None, "offline".to_string())
        };
        let session = Session::new(backend, settings.meteor_type.clone(), settings.seed);

        let (sink, frames) = FrameSink::channel();
        let scheduler = scheduler::spawn(
            sink,
            session.subscribe_params(),
            cadence_for_fps(settings.fps()),
            MountPolicy::default(),
        );

        let intro = IntroState::start(settings.intro_seen);
        let screen = if intro.is_done() { Screen::Main } else { Screen::Intro };
        tracing::info!(backend = %backend_label, fps = settings.fps(), "starting ui");

        Ok(Self {
            stored,
            settings,
            paths,
            session,
            backend_label,
            screen,
            intro,
            selected: Field::Diameter,
            camera: Camera::default(),
            mono,
            frames,
            scheduler: Some(scheduler),
            should_quit: false,
        })
    }

    pub(crate) async fn run(mut self) -> Result<()> {
        let mut term = setup_terminal()?;
        let res = self.event_loop(&mut term);
        restore_terminal(&mut term)?;
        self.shutdown().await;
        res
    }

    fn event_loop(&mut self, term: &mut Term) -> Result<()> {
        let frame_dt = cadence_for_fps(self.settings.fps());

        while !self.should_quit {
            // backend answers that arrived since the last frame
            self.session.pump();
            if self.intro.tick(Instant::now()) {
                self.finish_intro();
            }

            let display = self.session.display();
            let frame = *self.frames.borrow();
            let view = View {
                screen: self.screen,
                intro: &self.intro,
                params: self.session.params(),
                selected: self.selected,
                display: &display,
                frame,
                camera: self.camera,
                mono: self.mono,
                backend: &self.backend_label,
            };
            draw_frame(term, &view)?;

            if event::poll(frame_dt)? {
                if let Event::Key(k) = event::read()? {
                    if k.kind == KeyEventKind::Press || k.kind == KeyEventKind::Repeat {
                        if let Some(action) = map_key(self.screen, k) {
                            self.apply(action);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn apply(&mut self, action: Action) {
        match action {
            Action::Quit => self.should_quit = true,
            Action::IntroNext => {
                if self.intro.advance(Instant::now()) {
                    self.finish_intro();
                }
            }
            Action::IntroBack => self.intro.back(),
            Action::IntroSkip => {
                self.intro.skip();
                self.finish_intro();
            }
            Action::ReplayIntro => {
                self.intro = IntroState::start(false);
                self.screen = Screen::Intro;
            }
            Action::HelpToggle => {
                self.screen = match self.screen {
                    Screen::Help => Screen::Main,
                    _ => Screen::Help,
                };
            }
            Action::SelectField(delta) => self.selected = cycle_field(self.selected, delta),
            Action::Adjust(steps) => {
                let field = self.selected;
                self.session.update_params(|p| p.adjust(field, steps));
            }
            Action::Run => {
                let generation = self.session.run();
                tracing::debug!(generation, "run requested");
            }
            Action::Orbit(dx, dy) => self.camera.orbit(dx, dy),
            Action::Zoom(delta) => self.camera.zoom(delta),
            Action::ResetCamera => self.camera = Camera::default(),
            Action::ToggleColor => {
                self.mono = !self.mono;
                self.stored.enable_color = !self.mono;
            }
        }
    }

    fn finish_intro(&mut self) {
        self.screen = Screen::Main;
        if !self.stored.intro_seen {
            self.stored.intro_seen = true;
            self.settings.intro_seen = true;
            self.persist();
        }
    }

    fn persist(&self) {
        if let Err(e) = save_settings_atomic(&self.paths.settings_path, &self.stored) {
            tracing::warn!(error = %e, "could not save settings");
        }
    }

    async fn shutdown(&mut self) {
        if let Some(handle) = self.scheduler.take() {
            if let Err(e) = handle.stop().await {
                tracing::warn!(error = %e, "animation scheduler did not stop cleanly");
            }
        }
        self.persist();
        tracing::info!("ui closed");
    }
}

fn cycle_field(current: Field, delta: i32) -> Field {
    let fields = Field::all();
    let n = fields.len() as i32;
    let i = fields.iter().position(|f| *f == current).unwrap_or(0) as i32;
    fields[(i + delta).rem_euclid(n) as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_field_wraps() {
        assert_eq!(cycle_field(Field::Diameter, -1), Field::Year);
        assert_eq!(cycle_field(Field::Year, 1), Field::Diameter);
        assert_eq!(cycle_field(Field::Speed, 2), Field::Year);
    }
}
