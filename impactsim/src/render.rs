use std::io::{self, Stdout};

use anyhow::Result;
use crossterm::{
    cursor, execute,
    terminal::{
        self, BeginSynchronizedUpdate, DisableLineWrap, EnableLineWrap, EndSynchronizedUpdate,
        EnterAlternateScreen, LeaveAlternateScreen,
    },
};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    prelude::*,
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::canvas::{Canvas, Circle, Context, Line as Segment, Points},
    widgets::*,
};

use impactsim::controller::{DisplayState, Provenance};
use impactsim::kinematics::{orbit_path, OrbitFrame, Vec3, EARTH_RADIUS, ORBIT_RADIUS};
use impactsim::params::{Field, SimulationParameters};

use crate::input::Screen;
use crate::intro::{IntroState, PANELS};

pub(crate) type Term = Terminal<CrosstermBackend<Stdout>>;

/* ----------------------------
   Camera
---------------------------- */

const ROTATE_SPEED: f64 = 0.01;
const ZOOM_MIN: f64 = 3.0;
const ZOOM_MAX: f64 = 15.0;
const ZOOM_DEFAULT: f64 = 6.0;
const FOV_DEG: f64 = 75.0;

/// Orbiting camera looking at the origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Camera {
    pub(crate) yaw: f64,
    pub(crate) pitch: f64,
    pub(crate) distance: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            yaw: 0.0,
            pitch: 0.0,
            distance: ZOOM_DEFAULT,
        }
    }
}

impl Camera {
    pub(crate) fn orbit(&mut self, dx: f64, dy: f64) {
        let half_pi = std::f64::consts::FRAC_PI_2;
        self.yaw += dx * ROTATE_SPEED;
        self.pitch = (self.pitch + dy * ROTATE_SPEED).clamp(-half_pi, half_pi);
    }

    pub(crate) fn zoom(&mut self, delta: f64) {
        self.distance = (self.distance + delta).clamp(ZOOM_MIN, ZOOM_MAX);
    }

    /// Point in camera space: x right, y up, `depth` along the view axis.
    fn view(&self, p: Vec3) -> (f64, f64, f64) {
        let (sy, cy) = self.yaw.sin_cos();
        let x = cy * p.x - sy * p.z;
        let z = sy * p.x + cy * p.z;
        let (sp, cp) = self.pitch.sin_cos();
        let y = cp * p.y - sp * z;
        let z = sp * p.y + cp * z;
        (x, y, self.distance - z)
    }

    /// Perspective projection to normalized screen coordinates, `None` when
    /// the point sits behind the camera.
    pub(crate) fn project(&self, p: Vec3) -> Option<(f64, f64, f64)> {
        let (x, y, depth) = self.view(p);
        if depth <= 0.1 {
            return None;
        }
        let f = 1.0 / (FOV_DEG.to_radians() / 2.0).tan();
        Some((x * f / depth, y * f / depth, depth))
    }

    /// Apparent radius of a sphere at the origin.
    fn projected_radius(&self, radius: f64) -> f64 {
        let f = 1.0 / (FOV_DEG.to_radians() / 2.0).tan();
        radius * f / self.distance
    }

    /// Whether a projected point lies behind the Earth disk.
    fn hidden_by_earth(&self, sx: f64, sy: f64, depth: f64) -> bool {
        let r = self.projected_radius(EARTH_RADIUS);
        depth > self.distance && sx * sx + sy * sy < r * r
    }
}

/* ----------------------------
   Terminal
---------------------------- */

pub(crate) fn setup_terminal() -> Result<Term> {
    terminal::enable_raw_mode()?;
    let mut out = io::stdout();
    execute!(out, EnterAlternateScreen, DisableLineWrap, cursor::Hide)?;
    let backend = CrosstermBackend::new(out);
    let mut term = Terminal::new(backend)?;
    term.clear()?;
    Ok(term)
}

pub(crate) fn restore_terminal(term: &mut Term) -> Result<()> {
    let mut out = io::stdout();
    execute!(
        out,
        BeginSynchronizedUpdate,
        cursor::Show,
        EnableLineWrap,
        LeaveAlternateScreen,
        EndSynchronizedUpdate
    )?;
    terminal::disable_raw_mode()?;
    term.show_cursor()?;
    Ok(())
}

/* ----------------------------
   Frame
---------------------------- */

pub(crate) struct View<'a> {
    pub(crate) screen: Screen,
    pub(crate) intro: &'a IntroState,
    pub(crate) params: SimulationParameters,
    pub(crate) selected: Field,
    pub(crate) display: &'a DisplayState,
    pub(crate) frame: Option<OrbitFrame>,
    pub(crate) camera: Camera,
    pub(crate) mono: bool,
    pub(crate) backend: &'a str,
}

fn tint(mono: bool, c: Color) -> Color {
    if mono {
        Color::White
    } else {
        c
    }
}

pub(crate) fn draw_frame(term: &mut Term, v: &View) -> Result<()> {
    term.draw(|f| {
        let _ = execute!(io::stdout(), BeginSynchronizedUpdate);

        let area = f.size();
        let outer = Block::default()
            .borders(Borders::ALL)
            .title(Line::from(vec![
                Span::styled(" impactsim ", Style::default().add_modifier(Modifier::BOLD)),
                Span::raw(" "),
                Span::styled(v.backend.to_string(), Style::default().fg(tint(v.mono, Color::Cyan))),
            ]))
            .border_style(Style::default().fg(if v.mono { Color::Gray } else { Color::DarkGray }));
        f.render_widget(outer, area);
        let inner = area.inner(Margin {
            horizontal: 1,
            vertical: 1,
        });

        match v.screen {
            Screen::Intro => render_intro(f, inner, v),
            Screen::Help => render_help(f, inner, v),
            Screen::Main => render_main(f, inner, v),
        }

        let _ = execute!(io::stdout(), EndSynchronizedUpdate);
    })?;
    Ok(())
}

fn render_main(f: &mut Frame, area: Rect, v: &View) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(3)])
        .split(area);
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(40), Constraint::Min(0)])
        .split(rows[0]);
    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(14), Constraint::Min(0)])
        .split(cols[0]);

    render_params(f, left[0], v);
    render_results(f, left[1], v);
    render_orbit(f, cols[1], v);
    render_footer(f, rows[1], v);
}

fn render_params(f: &mut Frame, area: Rect, v: &View) {
    let block = Block::default().borders(Borders::ALL).title("Asteroid");
    let inner = block.inner(area);
    f.render_widget(block, area);

    let slots = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3); 4])
        .split(inner);

    for (field, slot) in Field::all().iter().zip(slots.iter()) {
        let spec = field.spec();
        let value = v.params.get(*field);
        let selected = *field == v.selected;
        let label = match field {
            Field::Year => format!("{}", value as i32),
            _ => format!("{value:.0}"),
        };
        let title = if selected {
            format!("> {}", spec.label)
        } else {
            format!("  {}", spec.label)
        };
        let color = if selected { Color::Yellow } else { Color::Blue };
        let gauge = Gauge::default()
            .block(Block::default().title(title))
            .gauge_style(Style::default().fg(tint(v.mono, color)))
            .ratio(spec.fraction(value))
            .label(label);
        f.render_widget(gauge, *slot);
    }
}

fn render_results(f: &mut Frame, area: Rect, v: &View) {
    let d = v.display;
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!("Results (run {})", d.generation));

    let dim = Style::default().fg(tint(v.mono, Color::Gray));
    let strong = Style::default().add_modifier(Modifier::BOLD);

    let status = if d.loading {
        Span::styled("Running...", Style::default().fg(tint(v.mono, Color::Yellow)))
    } else {
        Span::styled(d.state, strong)
    };
    let source = match d.coordinate_source {
        Some(Provenance::Backend) => " (backend)",
        Some(Provenance::LocalEstimate) => " (estimate)",
        None => "",
    };

    let mut lines = vec![
        Line::from(vec![Span::styled("Status:  ", dim), status]),
        Line::from(vec![
            Span::styled("Energy:  ", dim),
            Span::styled(d.energy.clone(), strong),
        ]),
        Line::from(vec![
            Span::styled("Impact:  ", dim),
            Span::raw(format!("{}, {}", d.latitude, d.longitude)),
            Span::styled(source, dim),
        ]),
    ];
    let optional = [
        ("Chance:  ", &d.impact_probability),
        ("Crater:  ", &d.crater_diameter),
        ("Context: ", &d.historical_context),
        ("People:  ", &d.population_impact),
    ];
    for (label, value) in optional {
        if let Some(text) = value {
            lines.push(Line::from(vec![
                Span::styled(label, dim),
                Span::raw(text.clone()),
            ]));
        }
    }
    if let Some(err) = &d.error {
        lines.push(Line::from(Span::styled(
            err.clone(),
            Style::default().fg(tint(v.mono, Color::Red)),
        )));
    }
    if let Some(at) = d.completed_at {
        lines.push(Line::from(Span::styled(
            format!("Finished: {}", at.format("%H:%M:%S")),
            dim,
        )));
    }

    f.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: true }),
        area,
    );
}

fn render_orbit(f: &mut Frame, area: Rect, v: &View) {
    let block = Block::default().borders(Borders::ALL).title("Orbit");
    let inner = block.inner(area);
    // terminal cells are roughly twice as tall as wide
    let aspect = if inner.height == 0 {
        1.0
    } else {
        inner.width as f64 / (2.0 * inner.height as f64)
    };

    let cam = v.camera;
    let mono = v.mono;
    let inclination = v.params.inclination_deg;
    let frame = v.frame;

    let canvas = Canvas::default()
        .block(block)
        .marker(Marker::Braille)
        .x_bounds([-aspect, aspect])
        .y_bounds([-1.0, 1.0])
        .paint(move |ctx| {
            paint_scene(ctx, &cam, inclination, frame.as_ref(), mono);
        });
    f.render_widget(canvas, area);
}

fn paint_scene(
    ctx: &mut Context,
    cam: &Camera,
    inclination_deg: f64,
    frame: Option<&OrbitFrame>,
    mono: bool,
) {
    ctx.draw(&Circle {
        x: 0.0,
        y: 0.0,
        radius: cam.projected_radius(EARTH_RADIUS),
        color: tint(mono, Color::Blue),
    });
    ctx.layer();

    let ring: Vec<_> = orbit_path(inclination_deg, ORBIT_RADIUS, 96)
        .into_iter()
        .map(|p| cam.project(p))
        .collect();
    for pair in ring.windows(2) {
        if let [Some((x1, y1, d1)), Some((x2, y2, d2))] = pair {
            if cam.hidden_by_earth(*x1, *y1, *d1) && cam.hidden_by_earth(*x2, *y2, *d2) {
                continue;
            }
            ctx.draw(&Segment {
                x1: *x1,
                y1: *y1,
                x2: *x2,
                y2: *y2,
                color: tint(mono, Color::DarkGray),
            });
        }
    }
    ctx.layer();

    let Some(frame) = frame else {
        return;
    };
    let Some((x, y, depth)) = cam.project(frame.position) else {
        return;
    };
    if cam.hidden_by_earth(x, y, depth) {
        return;
    }
    // the body is drawn with radius 0.1 scene units at scale 1
    let f = 1.0 / (FOV_DEG.to_radians() / 2.0).tan();
    let r = 0.1 * frame.scale * f / depth;
    if r < 0.02 {
        ctx.draw(&Points {
            coords: &[(x, y)],
            color: tint(mono, Color::LightRed),
        });
    } else {
        ctx.draw(&Circle {
            x,
            y,
            radius: r,
            color: tint(mono, Color::LightRed),
        });
    }
}

fn render_footer(f: &mut Frame, area: Rect, v: &View) {
    let text = "Up/Down select | Left/Right adjust (Shift x10) | Enter run | WASD orbit | +/- zoom | H help | Q quit";
    f.render_widget(
        Paragraph::new(text)
            .style(Style::default().fg(tint(v.mono, Color::Gray)))
            .block(Block::default().borders(Borders::ALL)),
        area,
    );
}

fn centered(area: Rect, w: u16, h: u16) -> Rect {
    let w = w.min(area.width);
    let h = h.min(area.height);
    Rect {
        x: area.x + (area.width - w) / 2,
        y: area.y + (area.height - h) / 2,
        width: w,
        height: h,
    }
}

fn render_intro(f: &mut Frame, area: Rect, v: &View) {
    let (IntroState::Showing { panel: index, .. }, Some(panel)) = (v.intro, v.intro.panel()) else {
        return;
    };
    let boxed = centered(area, 64, 12);
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" {}/{} ", index + 1, PANELS.len()))
        .border_style(Style::default().fg(tint(v.mono, Color::Cyan)));

    let mut lines = vec![
        Line::from(Span::styled(
            panel.title,
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];
    lines.extend(panel.body.lines().map(Line::from));
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Enter next | Left back | S skip",
        Style::default().fg(tint(v.mono, Color::Gray)),
    )));

    f.render_widget(Clear, boxed);
    f.render_widget(
        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .block(block)
            .wrap(Wrap { trim: true }),
        boxed,
    );
}

fn render_help(f: &mut Frame, area: Rect, v: &View) {
    let lines = vec![
        Line::from(Span::styled("Controls", Style::default().add_modifier(Modifier::BOLD))),
        Line::from(""),
        Line::from("Up/Down, Tab     pick a slider"),
        Line::from("Left/Right       adjust one step (Shift or PgUp/PgDn: ten)"),
        Line::from("Enter, R         run the simulation"),
        Line::from("W/A/S/D          orbit the camera"),
        Line::from("+/-              zoom"),
        Line::from("C                reset camera"),
        Line::from("M                toggle color"),
        Line::from("I                replay intro"),
        Line::from("Q                quit"),
        Line::from(""),
        Line::from("Energy and a rough impact point are computed locally."),
        Line::from("The backend, when reachable, refines the impact point."),
        Line::from(""),
        Line::from(Span::styled(
            "Esc or H to close",
            Style::default().fg(tint(v.mono, Color::Gray)),
        )),
    ];
    f.render_widget(
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Help")),
        area,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pitch_clamped() {
        let mut cam = Camera::default();
        cam.orbit(0.0, 1000.0);
        assert_eq!(cam.pitch, std::f64::consts::FRAC_PI_2);
        cam.orbit(0.0, -5000.0);
        assert_eq!(cam.pitch, -std::f64::consts::FRAC_PI_2);
    }

    #[test]
    fn test_zoom_bounds() {
        let mut cam = Camera::default();
        assert_eq!(cam.distance, 6.0);
        cam.zoom(100.0);
        assert_eq!(cam.distance, 15.0);
        cam.zoom(-100.0);
        assert_eq!(cam.distance, 3.0);
    }

    #[test]
    fn test_origin_projects_to_center() {
        let cam = Camera::default();
        let (x, y, depth) = cam.project(Vec3::new(0.0, 0.0, 0.0)).unwrap();
        assert_eq!((x, y), (0.0, 0.0));
        assert_eq!(depth, 6.0);
    }

    #[test]
    fn test_point_behind_camera_is_dropped() {
        let cam = Camera::default();
        assert!(cam.project(Vec3::new(0.0, 0.0, 10.0)).is_none());
        let (x, _, _) = cam.project(Vec3::new(1.0, 0.0, 0.0)).unwrap();
        assert!(x > 0.0);
    }

    #[test]
    fn test_far_side_hidden_by_earth() {
        let cam = Camera::default();
        let (x, y, d) = cam.project(Vec3::new(0.0, 0.0, -3.0)).unwrap();
        assert!(cam.hidden_by_earth(x, y, d));
        let (x, y, d) = cam.project(Vec3::new(0.0, 0.0, 3.0)).unwrap();
        assert!(!cam.hidden_by_earth(x, y, d));
    }
}
