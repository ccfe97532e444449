use serde::{Deserialize, Serialize};

/// # ThresholdSchedule
///
/// How the exit threshold is chosen for a decoding position.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum ThresholdSchedule {
    /// The same threshold at every position
    Fixed(f32),

    /// Starts at `base` and decays towards `0.9 * base` as decoding advances:
    ///
    /// `t(i) = base * exp(-temperature * i / max_answer_length) / 10 + 9 * base / 10`
    PositionDecay {
        base: f32,
        temperature: f32,
        max_answer_length: usize,
    },

    /// Shallow-to-deep routing threshold. Callers may replace it per call
    /// with an adaptive value.
    ShallowToDeep(f32),
}

impl ThresholdSchedule {
    /// Threshold for decoding `position`.
    ///
    /// `adapt` only applies to [`ShallowToDeep`](Self::ShallowToDeep); the exit
    /// family ignores it.
    pub fn resolve(&self, position: usize, adapt: Option<f32>) -> f32 {
        match *self {
            Self::Fixed(base) => base,
            Self::PositionDecay { base, temperature, max_answer_length } => {
                let base = f64::from(base);
                let progress = position as f64 / max_answer_length.max(1) as f64;
                let decayed = base * (-f64::from(temperature) * progress).exp() / 10.0 + 9.0 * base / 10.0;
                decayed as f32
            }
            Self::ShallowToDeep(threshold) => adapt.unwrap_or(threshold),
        }
    }

    /// The undecayed threshold, used by the trend measures
    pub fn base(&self) -> f32 {
        match *self {
            Self::Fixed(base) | Self::ShallowToDeep(base) => base,
            Self::PositionDecay { base, .. } => base,
        }
    }
}
