//! Easing curves applied to tween positions

use std::fmt;
use std::str::FromStr;

/// How a tween position maps to an interpolation factor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterpolationType {
    #[default]
    Linear,
    EaseIn,
    EaseOut,
    EaseInOut,
    Exponential,
    /// Use whatever the owning stop uses
    DefaultV,
}

impl InterpolationType {
    /// Maps `t` in [0,1] onto [0,1]. Every curve fixes both endpoints.
    pub fn ease(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            InterpolationType::Linear | InterpolationType::DefaultV => t,
            InterpolationType::EaseIn => t * t,
            InterpolationType::EaseOut => 1.0 - (1.0 - t) * (1.0 - t),
            InterpolationType::EaseInOut => t * t * (3.0 - 2.0 * t),
            InterpolationType::Exponential => ((10.0 * t).exp2() - 1.0) / 1023.0,
        }
    }

    /// Replaces `DefaultV` with the given fallback
    pub fn resolve(self, fallback: InterpolationType) -> InterpolationType {
        match self {
            InterpolationType::DefaultV => fallback,
            other => other,
        }
    }
}

impl fmt::Display for InterpolationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InterpolationType::Linear => "Linear",
            InterpolationType::EaseIn => "EaseIn",
            InterpolationType::EaseOut => "EaseOut",
            InterpolationType::EaseInOut => "EaseInOut",
            InterpolationType::Exponential => "Exponential",
            InterpolationType::DefaultV => "DefaultV",
        };
        f.write_str(s)
    }
}

impl FromStr for InterpolationType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Linear" => Ok(InterpolationType::Linear),
            "EaseIn" => Ok(InterpolationType::EaseIn),
            "EaseOut" => Ok(InterpolationType::EaseOut),
            "EaseInOut" => Ok(InterpolationType::EaseInOut),
            "Exponential" => Ok(InterpolationType::Exponential),
            "DefaultV" | "Default" => Ok(InterpolationType::DefaultV),
            _ => Err(()),
        }
    }
}
