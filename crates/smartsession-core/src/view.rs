//! Pure state → styling mapping shared by both views.

/// Colour family used for borders, card fills and badges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTone {
    /// Green.
    Positive,
    /// Yellow.
    Caution,
    /// Red.
    Alert,
    /// Default grey.
    Neutral,
}

impl StatusTone {
    /// `Happy` is green, `Looking Away` yellow, `Distracted` / `No Face` /
    /// `Multiple Faces` red, everything else grey.
    pub fn for_state(state: &str) -> Self {
        match state {
            "Happy" => Self::Positive,
            "Looking Away" => Self::Caution,
            "Distracted" | "No Face" | "Multiple Faces" => Self::Alert,
            _ => Self::Neutral,
        }
    }

    /// RGB triple for the stroke / accent of this tone.
    pub fn rgb(&self) -> [u8; 3] {
        match self {
            Self::Positive => [34, 197, 94],
            Self::Caution  => [234, 179, 8],
            Self::Alert    => [220, 38, 38],
            Self::Neutral  => [55, 65, 81],
        }
    }
}

/// Fill fraction of an engagement bar. Scores outside 0..1 (the server sends
/// -1 for "looking away") are clamped.
pub fn engagement_fraction(score: f64) -> f32 {
    if score.is_nan() {
        return 0.0;
    }
    score.clamp(0.0, 1.0) as f32
}

/// Rounded percentage shown next to the engagement bar.
pub fn engagement_percent(score: f64) -> u8 {
    (engagement_fraction(score) * 100.0).round() as u8
}

/// Bars below half engagement are drawn as an alert.
pub fn engagement_is_low(score: f64) -> bool {
    score < 0.5
}

/// First character of a display name, for the card avatar.
pub fn initial(name: &str) -> String {
    name.chars().next().map(|c| c.to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tone_mapping() {
        assert_eq!(StatusTone::for_state("Happy"), StatusTone::Positive);
        assert_eq!(StatusTone::for_state("Looking Away"), StatusTone::Caution);
        for s in ["Distracted", "No Face", "Multiple Faces"] {
            assert_eq!(StatusTone::for_state(s), StatusTone::Alert);
        }
        for s in ["Focused", "NEUTRAL", "Confused", "ENGAGED", ""] {
            assert_eq!(StatusTone::for_state(s), StatusTone::Neutral);
        }
    }

    #[test]
    fn engagement_bar_is_clamped() {
        assert_eq!(engagement_fraction(0.8), 0.8);
        assert_eq!(engagement_fraction(-1.0), 0.0);
        assert_eq!(engagement_fraction(3.0), 1.0);
        assert_eq!(engagement_percent(0.456), 46);
        assert_eq!(engagement_percent(-1.0), 0);
        assert!(engagement_is_low(0.49));
        assert!(!engagement_is_low(0.5));
    }

    #[test]
    fn initial_of_name() {
        assert_eq!(initial("Student 7"), "S");
        assert_eq!(initial(""), "");
    }
}
