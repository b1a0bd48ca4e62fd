//! HEXACO personality traits and PAD affect state.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// HEXACO
// ---------------------------------------------------------------------------

/// One of the six HEXACO personality dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "snake_case")]
pub enum TraitDimension {
    /// Sincerity, fairness, modesty.
    HonestyHumility,
    /// Anxiety, sentimentality, sensitivity.
    Emotionality,
    /// Sociability, liveliness, social boldness.
    Extraversion,
    /// Patience, forgiveness, gentleness.
    Agreeableness,
    /// Organization, diligence, prudence.
    Conscientiousness,
    /// Curiosity, creativity, unconventionality.
    Openness,
}

impl TraitDimension {
    /// Every dimension, in HEXACO order.
    pub const ALL: [Self; 6] = [
        Self::HonestyHumility,
        Self::Emotionality,
        Self::Extraversion,
        Self::Agreeableness,
        Self::Conscientiousness,
        Self::Openness,
    ];

    /// Lowercase display name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::HonestyHumility => "honesty-humility",
            Self::Emotionality => "emotionality",
            Self::Extraversion => "extraversion",
            Self::Agreeableness => "agreeableness",
            Self::Conscientiousness => "conscientiousness",
            Self::Openness => "openness",
        }
    }
}

/// A HEXACO personality profile. Every dimension lies in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct HexacoTraits {
    /// Honesty-humility.
    pub honesty_humility: f64,
    /// Emotionality.
    pub emotionality: f64,
    /// Extraversion.
    pub extraversion: f64,
    /// Agreeableness.
    pub agreeableness: f64,
    /// Conscientiousness.
    pub conscientiousness: f64,
    /// Openness to experience.
    pub openness: f64,
}

/// Value a non-finite trait falls back to.
const TRAIT_MIDPOINT: f64 = 0.5;

/// `value` clamped to `[0, 1]`, or `None` if it is NaN or infinite.
fn unit(value: f64) -> Option<f64> {
    value.is_finite().then(|| value.clamp(0.0, 1.0))
}

impl HexacoTraits {
    /// A profile with every dimension at the same value (clamped to `[0, 1]`).
    /// A non-finite value yields the midpoint.
    pub fn uniform(value: f64) -> Self {
        let v = unit(value).unwrap_or(TRAIT_MIDPOINT);
        Self {
            honesty_humility: v,
            emotionality: v,
            extraversion: v,
            agreeableness: v,
            conscientiousness: v,
            openness: v,
        }
    }

    /// Read one dimension.
    pub const fn get(&self, dimension: TraitDimension) -> f64 {
        match dimension {
            TraitDimension::HonestyHumility => self.honesty_humility,
            TraitDimension::Emotionality => self.emotionality,
            TraitDimension::Extraversion => self.extraversion,
            TraitDimension::Agreeableness => self.agreeableness,
            TraitDimension::Conscientiousness => self.conscientiousness,
            TraitDimension::Openness => self.openness,
        }
    }

    /// Write one dimension, clamped to `[0, 1]`. Non-finite values are
    /// ignored.
    pub fn set(&mut self, dimension: TraitDimension, value: f64) {
        let Some(v) = unit(value) else {
            return;
        };
        match dimension {
            TraitDimension::HonestyHumility => self.honesty_humility = v,
            TraitDimension::Emotionality => self.emotionality = v,
            TraitDimension::Extraversion => self.extraversion = v,
            TraitDimension::Agreeableness => self.agreeableness = v,
            TraitDimension::Conscientiousness => self.conscientiousness = v,
            TraitDimension::Openness => self.openness = v,
        }
    }

    /// Copy of this profile with every dimension clamped to `[0, 1]`.
    /// Non-finite dimensions reset to the midpoint.
    pub fn clamped(mut self) -> Self {
        for dimension in TraitDimension::ALL {
            let value = unit(self.get(dimension)).unwrap_or(TRAIT_MIDPOINT);
            self.set(dimension, value);
        }
        self
    }
}

impl Default for HexacoTraits {
    fn default() -> Self {
        Self::uniform(0.5)
    }
}

// ---------------------------------------------------------------------------
// PAD
// ---------------------------------------------------------------------------

/// Pleasure (valence), arousal, dominance affect state, each in `[-1, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PadState {
    /// Pleasantness of the current mood.
    pub valence: f64,
    /// Activation level.
    pub arousal: f64,
    /// Sense of control.
    pub dominance: f64,
}

impl PadState {
    /// Neutral affect.
    pub const NEUTRAL: Self = Self {
        valence: 0.0,
        arousal: 0.0,
        dominance: 0.0,
    };

    /// Build a state, clamping every dimension to `[-1, 1]`. Non-finite
    /// dimensions become neutral.
    pub fn new(valence: f64, arousal: f64, dominance: f64) -> Self {
        Self {
            valence: bounded(valence),
            arousal: bounded(arousal),
            dominance: bounded(dominance),
        }
    }

    /// Add `delta` dimension-wise and clamp the result. A non-finite delta
    /// leaves its dimension unchanged.
    pub fn apply(self, delta: Self) -> Self {
        Self::new(
            shifted(self.valence, delta.valence),
            shifted(self.arousal, delta.arousal),
            shifted(self.dominance, delta.dominance),
        )
    }
}

const fn bounded(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

const fn shifted(current: f64, delta: f64) -> f64 {
    if delta.is_finite() {
        current + delta
    } else {
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_clamps_to_unit_interval() {
        let mut traits = HexacoTraits::default();
        traits.set(TraitDimension::Openness, 1.7);
        traits.set(TraitDimension::Emotionality, -0.3);
        assert!((traits.openness - 1.0).abs() < f64::EPSILON);
        assert!(traits.emotionality.abs() < f64::EPSILON);
    }

    #[test]
    fn pad_apply_clamps() {
        let state = PadState::new(0.9, -0.9, 0.0).apply(PadState::new(0.5, -0.5, 0.25));
        assert!((state.valence - 1.0).abs() < f64::EPSILON);
        assert!((state.arousal + 1.0).abs() < f64::EPSILON);
        assert!((state.dominance - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn non_finite_trait_writes_are_ignored() {
        let mut traits = HexacoTraits::uniform(0.3);
        traits.set(TraitDimension::Openness, f64::NAN);
        traits.set(TraitDimension::Extraversion, f64::INFINITY);
        assert!((traits.openness - 0.3).abs() < f64::EPSILON);
        assert!((traits.extraversion - 0.3).abs() < f64::EPSILON);

        let repaired = HexacoTraits {
            agreeableness: f64::NAN,
            ..HexacoTraits::uniform(0.9)
        }
        .clamped();
        assert!((repaired.agreeableness - 0.5).abs() < f64::EPSILON);
        assert!((HexacoTraits::uniform(f64::NAN).openness - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn pad_rejects_non_finite_input() {
        let state = PadState::new(f64::NAN, f64::NEG_INFINITY, 0.4);
        assert!(state.valence.abs() < f64::EPSILON);
        assert!(state.arousal.abs() < f64::EPSILON);
        assert!((state.dominance - 0.4).abs() < f64::EPSILON);

        let moved = state.apply(PadState {
            valence: 0.2,
            arousal: f64::NAN,
            dominance: f64::INFINITY,
        });
        assert!((moved.valence - 0.2).abs() < f64::EPSILON);
        assert!(moved.arousal.abs() < f64::EPSILON);
        assert!((moved.dominance - 0.4).abs() < f64::EPSILON);
    }

    #[test]
    fn dimension_accessors_agree() {
        let mut traits = HexacoTraits::uniform(0.2);
        for dimension in TraitDimension::ALL {
            traits.set(dimension, 0.8);
            assert!((traits.get(dimension) - 0.8).abs() < f64::EPSILON);
        }
    }
}
