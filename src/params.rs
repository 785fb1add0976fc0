//! Host-automatable parameters
//!
//! Each parameter keeps its plain value (natural units) and converts to and
//! from the normalized 0.0-1.0 range the plugin host automates. Discrete
//! parameters snap to the nearest choice.

/// Value range of a parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParameterKind {
    /// Continuous value in `min..=max`
    Float {
        min: f32,
        max: f32,
        unit: &'static str,
    },
    /// One of a fixed list of labelled choices, plain value is the index
    Choice { choices: &'static [&'static str] },
}

/// Notification queued for the plugin host
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HostEvent {
    /// Touch-automation gesture starts on a parameter
    BeginGesture(usize),
    /// Parameter changed outside the host's own automation
    ValueChanged { index: usize, normalized: f32 },
    /// Touch-automation gesture ends
    EndGesture(usize),
}

/// A single automatable parameter
#[derive(Debug, Clone)]
pub struct AutomationParameter {
    id: &'static str,
    name: &'static str,
    kind: ParameterKind,
    default: f32,
    value: f32,
    gesture_open: bool,
}

impl AutomationParameter {
    /// Continuous parameter; `default` is clamped into range
    pub fn float(
        id: &'static str,
        name: &'static str,
        min: f32,
        max: f32,
        default: f32,
        unit: &'static str,
    ) -> Self {
        let default = default.clamp(min, max);
        Self {
            id,
            name,
            kind: ParameterKind::Float { min, max, unit },
            default,
            value: default,
            gesture_open: false,
        }
    }

    /// Discrete parameter; `default` is a choice index
    pub fn choice(
        id: &'static str,
        name: &'static str,
        choices: &'static [&'static str],
        default: usize,
    ) -> Self {
        let default = default.min(choices.len().saturating_sub(1)) as f32;
        Self {
            id,
            name,
            kind: ParameterKind::Choice { choices },
            default,
            value: default,
            gesture_open: false,
        }
    }

    pub fn id(&self) -> &'static str {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> ParameterKind {
        self.kind
    }

    pub fn default_value(&self) -> f32 {
        self.default
    }

    /// Current plain value
    pub fn value(&self) -> f32 {
        self.value
    }

    /// Number of discrete steps (0 = continuous)
    pub fn step_count(&self) -> usize {
        match self.kind {
            ParameterKind::Float { .. } => 0,
            ParameterKind::Choice { choices } => choices.len().saturating_sub(1),
        }
    }

    /// Clamp a plain value into range (choices snap to an index)
    pub fn clamp_plain(&self, plain: f32) -> f32 {
        match self.kind {
            ParameterKind::Float { min, max, .. } => {
                if plain.is_nan() {
                    self.default
                } else {
                    plain.clamp(min, max)
                }
            }
            ParameterKind::Choice { choices } => {
                let last = choices.len().saturating_sub(1) as f32;
                if plain.is_nan() {
                    self.default
                } else {
                    plain.round().clamp(0.0, last)
                }
            }
        }
    }

    /// Set the plain value, returning whether it changed
    pub fn set_plain(&mut self, plain: f32) -> bool {
        let clamped = self.clamp_plain(plain);
        if clamped == self.value {
            return false;
        }
        self.value = clamped;
        true
    }

    /// Current value in 0.0-1.0
    pub fn normalized(&self) -> f32 {
        self.plain_to_normalized(self.value)
    }

    /// Set from a normalized value, returning whether it changed
    pub fn set_normalized(&mut self, normalized: f32) -> bool {
        let plain = self.normalized_to_plain(normalized);
        self.set_plain(plain)
    }

    pub fn plain_to_normalized(&self, plain: f32) -> f32 {
        let plain = self.clamp_plain(plain);
        match self.kind {
            ParameterKind::Float { min, max, .. } => {
                if max > min {
                    (plain - min) / (max - min)
                } else {
                    0.0
                }
            }
            ParameterKind::Choice { .. } => {
                let steps = self.step_count();
                if steps == 0 {
                    0.0
                } else {
                    plain / steps as f32
                }
            }
        }
    }

    pub fn normalized_to_plain(&self, normalized: f32) -> f32 {
        let normalized = if normalized.is_nan() {
            self.plain_to_normalized(self.default)
        } else {
            normalized.clamp(0.0, 1.0)
        };
        match self.kind {
            ParameterKind::Float { min, max, .. } => min + normalized * (max - min),
            ParameterKind::Choice { .. } => (normalized * self.step_count() as f32).round(),
        }
    }

    /// Format the current value for display
    pub fn display(&self) -> String {
        match self.kind {
            ParameterKind::Float { unit, .. } if unit.is_empty() => format!("{:.2}", self.value),
            ParameterKind::Float { unit, .. } => format!("{:.1} {}", self.value, unit),
            ParameterKind::Choice { choices } => choices
                .get(self.value as usize)
                .copied()
                .unwrap_or("?")
                .to_string(),
        }
    }

    pub fn is_gesture_open(&self) -> bool {
        self.gesture_open
    }

    /// Open a gesture, returning false if one was already open
    pub(crate) fn open_gesture(&mut self) -> bool {
        !std::mem::replace(&mut self.gesture_open, true)
    }

    /// Close a gesture, returning false if none was open
    pub(crate) fn close_gesture(&mut self) -> bool {
        std::mem::replace(&mut self.gesture_open, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODES: &[&str] = &["Off", "Tight", "Full"];

    #[test]
    fn test_float_normalized_mapping() {
        let mut gain = AutomationParameter::float("gain", "Gain", -120.0, 24.0, 0.0, "dB");

        assert!((gain.normalized() - 120.0 / 144.0).abs() < 1e-6);

        assert!(gain.set_normalized(1.0));
        assert_eq!(gain.value(), 24.0);

        assert!(gain.set_normalized(0.0));
        assert_eq!(gain.value(), -120.0);
    }

    #[test]
    fn test_float_clamps_plain() {
        let mut x = AutomationParameter::float("x", "X", 0.0, 1.0, 0.5, "");
        assert!(x.set_plain(3.0));
        assert_eq!(x.value(), 1.0);
        assert!(!x.set_plain(1.5)); // still clamped to 1.0, no change
    }

    #[test]
    fn test_nan_falls_back_to_default() {
        let mut x = AutomationParameter::float("x", "X", 0.0, 1.0, 0.25, "");
        x.set_plain(0.9);
        x.set_plain(f32::NAN);
        assert_eq!(x.value(), 0.25);
    }

    #[test]
    fn test_choice_snaps_to_index() {
        let mut mode = AutomationParameter::choice("mode", "Mode", MODES, 1);
        assert_eq!(mode.normalized(), 0.5);
        assert_eq!(mode.step_count(), 2);

        mode.set_normalized(0.9);
        assert_eq!(mode.value(), 2.0);
        assert_eq!(mode.display(), "Full");

        mode.set_plain(0.4);
        assert_eq!(mode.value(), 0.0);
        assert_eq!(mode.display(), "Off");
    }

    #[test]
    fn test_display_units() {
        let gain = AutomationParameter::float("gain", "Gain", -120.0, 24.0, -12.0, "dB");
        assert_eq!(gain.display(), "-12.0 dB");

        let spread = AutomationParameter::float("spread", "Spread", 0.0, 1.0, 0.5, "");
        assert_eq!(spread.display(), "0.50");
    }

    #[test]
    fn test_gesture_open_close() {
        let mut x = AutomationParameter::float("x", "X", 0.0, 1.0, 0.5, "");
        assert!(x.open_gesture());
        assert!(!x.open_gesture());
        assert!(x.is_gesture_open());
        assert!(x.close_gesture());
        assert!(!x.close_gesture());
    }
}
