mod app;
mod input;
mod intro;
mod render;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use impactsim::config::{load_settings, project_paths, save_settings_atomic, Settings};
use impactsim::controller::RunState;
use impactsim::params::SimulationParameters;
use impactsim::prediction::HttpPredictionClient;
use impactsim::session::Session;
use impactsim::telemetry::{self, LogSink};

#[derive(Parser, Debug, Clone)]
#[command(name = "impactsim")]
#[command(about = "Asteroid impact simulator (local physics + optional prediction backend)")]
struct Cli {
    /// Prediction backend base URL. Example: http://127.0.0.1:5000
    #[arg(long)]
    backend_url: Option<String>,

    /// Never contact the backend; local estimates only
    #[arg(long, default_value_t = false)]
    offline: bool,

    /// Per-request timeout for the backend (milliseconds)
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Retry a backend call once after a connect or timeout failure
    #[arg(long, default_value_t = false)]
    retry: bool,

    /// Animation frame rate cap
    #[arg(long)]
    fps: Option<u32>,

    /// Force monochrome (no colors)
    #[arg(long, default_value_t = false)]
    mono: bool,

    /// Go straight to the simulator this time
    #[arg(long, default_value_t = false)]
    skip_intro: bool,

    /// Forget that the intro was seen
    #[arg(long, default_value_t = false)]
    reset_intro: bool,

    /// Seed for the local impact estimate
    #[arg(long)]
    seed: Option<u64>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Run once without the UI and print the result as JSON
    #[arg(long, default_value_t = false)]
    once: bool,

    /// Asteroid diameter in meters (--once)
    #[arg(long, default_value_t = 100.0)]
    diameter: f64,

    /// Speed in km/s (--once)
    #[arg(long, default_value_t = 20.0)]
    speed: f64,

    /// Orbit inclination in degrees (--once)
    #[arg(long, default_value_t = 45.0, allow_negative_numbers = true)]
    inclination: f64,

    /// Impact year (--once)
    #[arg(long, default_value_t = 1950)]
    year: i32,
}

impl Cli {
    /// Settings for this session only.
    fn overlay(&self, stored: &Settings) -> Settings {
        let mut s = stored.clone();
        if let Some(url) = &self.backend_url {
            s.backend_url = url.clone();
        }
        if self.offline {
            s.use_backend = false;
        }
        if self.timeout_ms.is_some() {
            s.request_timeout_ms = self.timeout_ms;
        }
        if self.retry {
            s.retry_transient = true;
        }
        if let Some(fps) = self.fps {
            s.fps_cap = fps;
        }
        if self.mono {
            s.enable_color = false;
        }
        if self.skip_intro {
            s.intro_seen = true;
        }
        if self.seed.is_some() {
            s.seed = self.seed;
        }
        s
    }

    fn params(&self) -> SimulationParameters {
        SimulationParameters {
            diameter_m: self.diameter,
            speed_km_s: self.speed,
            inclination_deg: self.inclination,
            impact_year: self.year,
        }
        .clamped()
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let paths = project_paths()?;

    let sink = if cli.once {
        LogSink::Stderr
    } else {
        LogSink::File(paths.log_path.clone())
    };
    telemetry::init(sink, &cli.log_level)?;

    let mut stored = load_settings(&paths.settings_path);
    if cli.reset_intro && stored.intro_seen {
        stored.intro_seen = false;
        save_settings_atomic(&paths.settings_path, &stored)?;
    }
    let settings = cli.overlay(&stored);

    if cli.once {
        return run_once(&settings, cli.params()).await;
    }

    let mono = !settings.enable_color;
    app::App::new(stored, settings, paths, mono)?.run().await?;
    Ok(ExitCode::SUCCESS)
}

/* ----------------------------
   Headless
---------------------------- */

async fn run_once(settings: &Settings, params: SimulationParameters) -> Result<ExitCode> {
    let backend = if settings.use_backend {
        Some(HttpPredictionClient::new(&settings.client_config())?)
    } else {
        None
    };
    let mut session = Session::new(backend, settings.meteor_type.clone(), settings.seed);
    session.update_params(|p| *p = params);
    session.run();
    session.settle().await;

    let display = session.display();
    println!("{}", serde_json::to_string_pretty(&display)?);

    Ok(match session.controller().state() {
        RunState::Failed(_) => ExitCode::from(1),
        _ => ExitCode::SUCCESS,
    })
}
