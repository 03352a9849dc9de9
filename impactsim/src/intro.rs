use std::time::{Duration, Instant};

pub(crate) struct Panel {
    pub(crate) title: &'static str,
    pub(crate) body: &'static str,
}

pub(crate) static PANELS: [Panel; 5] = [
    Panel {
        title: "Somewhere out there",
        body: "Millions of rocks cross Earth's orbit.\nMost are smaller than a house.",
    },
    Panel {
        title: "Size matters",
        body: "Kinetic energy grows with the cube of the diameter.\nDouble the size, eight times the mass.",
    },
    Panel {
        title: "So does speed",
        body: "Energy grows with the square of the speed.\nTypical impacts arrive at 11 to 72 km/s.",
    },
    Panel {
        title: "Angles and eras",
        body: "Inclination tilts the approach.\nThe year picks the world it lands in.",
    },
    Panel {
        title: "Your turn",
        body: "Tune the asteroid, press Enter, and see where it lands.",
    },
];

/// Time the last panel stays up before the intro finishes on its own.
pub(crate) const FINAL_PANEL_HOLD: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IntroState {
    Showing {
        panel: usize,
        /// When the final panel came up.
        last_since: Option<Instant>,
    },
    Done,
}

impl IntroState {
    pub(crate) fn start(seen: bool) -> Self {
        if seen {
            IntroState::Done
        } else {
            IntroState::Showing {
                panel: 0,
                last_since: None,
            }
        }
    }

    pub(crate) fn is_done(&self) -> bool {
        matches!(self, IntroState::Done)
    }

    pub(crate) fn panel(&self) -> Option<&'static Panel> {
        match self {
            IntroState::Showing { panel, .. } => PANELS.get(*panel),
            IntroState::Done => None,
        }
    }

    /// Move to the next panel. Returns true when this finished the intro.
    pub(crate) fn advance(&mut self, now: Instant) -> bool {
        let IntroState::Showing { panel, .. } = *self else {
            return false;
        };
        let next = panel + 1;
        if next >= PANELS.len() {
            *self = IntroState::Done;
            return true;
        }
        let last_since = (next == PANELS.len() - 1).then_some(now);
        *self = IntroState::Showing {
            panel: next,
            last_since,
        };
        false
    }

    pub(crate) fn back(&mut self) {
        if let IntroState::Showing { panel, .. } = *self {
            *self = IntroState::Showing {
                panel: panel.saturating_sub(1),
                last_since: None,
            };
        }
    }

    pub(crate) fn skip(&mut self) -> bool {
        let was_showing = !self.is_done();
        *self = IntroState::Done;
        was_showing
    }

    /// Finish once the final panel has been up long enough.
    pub(crate) fn tick(&mut self, now: Instant) -> bool {
        if let IntroState::Showing {
            last_since: Some(since),
            ..
        } = *self
        {
            if now.saturating_duration_since(since) >= FINAL_PANEL_HOLD {
                *self = IntroState::Done;
                return true;
            }
        }
        false
    }
}
