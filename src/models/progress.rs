use serde::{Deserialize, Serialize};

/// Animation style of the progress bar on the wait surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BarStyle {
    /// Filled proportionally to the bar value
    Determinate,
    /// Value is ignored; the bar pulses in place
    Indeterminate,
    /// Value is ignored; a segment scrolls continuously
    #[default]
    Marquee,
}

impl BarStyle {
    /// Whether the bar value is meaningful for this style
    pub fn shows_value(&self) -> bool {
        matches!(self, BarStyle::Determinate)
    }
}

/// A single write to the wait surface's progress display
///
/// This is the unit that crosses from background threads to the UI thread:
/// writes travel as data, and the surface applies them on its own thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressChange {
    Message(String),
    BarVisible(bool),
    BarStyle(BarStyle),
    BarValue(i32),
    BarStep(i32),
    BarMinimum(i32),
    BarMaximum(i32),
    /// Advance the value by the current step
    PerformStep,
    CancelControlVisible(bool),
}

/// Everything the wait surface displays about the running task
///
/// Range handling follows classic progress-bar rules: the value is always
/// kept inside `[bar_minimum, bar_maximum]`, and moving one bound past the
/// other drags the other bound along.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressState {
    pub message: String,
    pub bar_visible: bool,
    pub bar_style: BarStyle,
    pub bar_value: i32,
    pub bar_step: i32,
    pub bar_minimum: i32,
    pub bar_maximum: i32,
    pub cancel_control_visible: bool,
}

impl Default for ProgressState {
    fn default() -> Self {
        Self {
            message: String::new(),
            bar_visible: true,
            bar_style: BarStyle::Marquee,
            bar_value: 0,
            bar_step: 10,
            bar_minimum: 0,
            bar_maximum: 100,
            cancel_control_visible: false,
        }
    }
}

impl ProgressState {
    /// Apply one change, keeping the range invariants
    ///
    /// Returns `true` if anything visible changed.
    pub fn apply(&mut self, change: ProgressChange) -> bool {
        let before = self.clone();

        match change {
            ProgressChange::Message(message) => self.message = message,
            ProgressChange::BarVisible(visible) => self.bar_visible = visible,
            ProgressChange::BarStyle(style) => self.bar_style = style,
            ProgressChange::BarValue(value) => self.bar_value = self.clamp(value),
            ProgressChange::BarStep(step) => self.bar_step = step,
            ProgressChange::BarMinimum(minimum) => {
                self.bar_minimum = minimum;
                if self.bar_maximum < minimum {
                    self.bar_maximum = minimum;
                }
                self.bar_value = self.clamp(self.bar_value);
            }
            ProgressChange::BarMaximum(maximum) => {
                self.bar_maximum = maximum;
                if self.bar_minimum > maximum {
                    self.bar_minimum = maximum;
                }
                self.bar_value = self.clamp(self.bar_value);
            }
            ProgressChange::PerformStep => {
                self.bar_value = self.clamp(self.bar_value.saturating_add(self.bar_step));
            }
            ProgressChange::CancelControlVisible(visible) => self.cancel_control_visible = visible,
        }

        before != *self
    }

    /// Completed fraction of the range in percent (0 for an empty range)
    pub fn percent(&self) -> u8 {
        let span = i64::from(self.bar_maximum) - i64::from(self.bar_minimum);
        if span <= 0 {
            return 0;
        }
        let done = i64::from(self.bar_value) - i64::from(self.bar_minimum);
        ((done * 100) / span).clamp(0, 100) as u8
    }

    /// One-line textual rendering, e.g. `[#####-----]  50% Copying files`
    pub fn render_line(&self, width: usize) -> String {
        let mut line = String::new();

        if self.bar_visible {
            if self.bar_style.shows_value() {
                let filled = width * usize::from(self.percent()) / 100;
                line.push('[');
                line.push_str(&"#".repeat(filled));
                line.push_str(&"-".repeat(width - filled));
                line.push_str(&format!("] {:>3}%", self.percent()));
            } else {
                line.push_str(&format!("[{:^width$}]", "working", width = width));
            }
        }

        if !self.message.is_empty() {
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(&self.message);
        }

        if self.cancel_control_visible {
            line.push_str(" (Ctrl-C to cancel)");
        }

        line
    }

    fn clamp(&self, value: i32) -> i32 {
        value.clamp(self.bar_minimum, self.bar_maximum)
    }
}
