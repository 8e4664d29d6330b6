//! Pointer interaction over a waveform: hover preview, click and drag seeking.

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PointerKind {
    Mouse,
    Touch,
    Pen,
}

impl PointerKind {
    /// Only mice report movement without a pressed button.
    pub fn can_hover(self) -> bool {
        matches!(self, PointerKind::Mouse)
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum PointerState {
    Idle,
    Hovering { ratio: f64 },
    Seeking { ratio: f64, kind: PointerKind },
}

/// What the controller should do after a transition.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum PointerEffect {
    None,
    /// Move playback to the ratio and highlight it.
    Seek(f64),
    /// Highlight the ratio without touching playback.
    Hover(f64),
    /// Drop the highlight and show the real position again.
    Clear,
}

#[derive(Debug, Clone)]
pub struct PointerMachine {
    state: PointerState,
}

impl Default for PointerMachine {
    fn default() -> Self {
        Self {
            state: PointerState::Idle,
        }
    }
}

impl PointerMachine {
    pub fn state(&self) -> PointerState {
        self.state
    }

    pub fn is_seeking(&self) -> bool {
        matches!(self.state, PointerState::Seeking { .. })
    }

    pub fn down(&mut self, ratio: f64, kind: PointerKind) -> PointerEffect {
        self.state = PointerState::Seeking { ratio, kind };
        PointerEffect::Seek(ratio)
    }

    pub fn moved(&mut self, ratio: f64, kind: PointerKind) -> PointerEffect {
        match self.state {
            PointerState::Seeking { kind: held, .. } => {
                self.state = PointerState::Seeking { ratio, kind: held };
                PointerEffect::Seek(ratio)
            }
            PointerState::Idle | PointerState::Hovering { .. } if kind.can_hover() => {
                self.state = PointerState::Hovering { ratio };
                PointerEffect::Hover(ratio)
            }
            _ => PointerEffect::None,
        }
    }

    pub fn up(&mut self, ratio: f64) -> PointerEffect {
        let PointerState::Seeking { kind, .. } = self.state else {
            return PointerEffect::None;
        };
        if kind.can_hover() {
            self.state = PointerState::Hovering { ratio };
            PointerEffect::Hover(ratio)
        } else {
            self.state = PointerState::Idle;
            PointerEffect::Clear
        }
    }

    /// A drag keeps the pointer captured, so leaving only matters otherwise.
    pub fn leave(&mut self) -> PointerEffect {
        match self.state {
            PointerState::Seeking { .. } => PointerEffect::None,
            PointerState::Hovering { .. } => {
                self.state = PointerState::Idle;
                PointerEffect::Clear
            }
            PointerState::Idle => PointerEffect::None,
        }
    }

    pub fn cancel(&mut self) -> PointerEffect {
        let was_idle = self.state == PointerState::Idle;
        self.state = PointerState::Idle;
        if was_idle {
            PointerEffect::None
        } else {
            PointerEffect::Clear
        }
    }
}

/// `clamp01((x - left) / width)`; zero for an empty surface.
pub fn pointer_ratio(x: f64, left: f64, width: f64) -> f64 {
    if !(width > 0.0) || !x.is_finite() {
        return 0.0;
    }
    ((x - left) / width).clamp(0.0, 1.0)
}

/// Bar under `ratio`, clamped to the last bar.
pub fn hover_index(ratio: f64, bar_count: usize) -> Option<usize> {
    if bar_count == 0 {
        return None;
    }
    let i = (ratio.clamp(0.0, 1.0) * bar_count as f64).floor() as usize;
    Some(i.min(bar_count - 1))
}
