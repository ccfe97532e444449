use tracing::debug;

use super::classifier::ExitClassifier;
use super::history::LayerHistory;
use super::measure::{ConfidenceMeasure, ExitQuery};
use super::scores::Scores;
use super::threshold::ThresholdSchedule;
use crate::backend::Backend;
use crate::config::ExitConfig;
use crate::error::Result;
use crate::partition::SkipMask;

/// The outcome of one engine call
#[derive(Clone, Debug, PartialEq)]
pub struct ExitDecision {
    /// `true` where the element should exit
    pub mask: SkipMask,
    /// Raw confidence the mask was derived from
    pub confidence: Scores,
    /// Threshold the confidence was compared against
    pub threshold: f32,
}

impl ExitDecision {
    pub fn exits(&self) -> usize {
        self.mask.count_exits()
    }
}

/// # ConfidenceEngine
///
/// Scores a layer with the configured [`ConfidenceMeasure`] and turns the
/// scores into a [`SkipMask`] with the configured [`ThresholdSchedule`].
///
/// The engine holds configuration only. Everything that changes during
/// decoding, the classifier and the [`LayerHistory`], is owned by the caller
/// and lent per call.
///
/// # Example
///
/// ```rust
/// # #[cfg(feature = "candle")]
/// # fn main() -> early_exit::Result<()> {
/// use candle_core::{Device, Tensor};
/// use early_exit::confidence::{ConfidenceEngine, ExitQuery, LayerHistory};
/// use early_exit::ExitConfig;
///
/// let engine = ConfidenceEngine::from_config(&ExitConfig::exit("softmax", 0.5))?;
/// let logits = Tensor::new(&[[8f32, 0., 0.], [1., 1., 1.]], &Device::Cpu)?;
/// let history = LayerHistory::new();
///
/// let query = ExitQuery::new(1, 0).with_logits(&logits);
/// let decision = engine.decide(&query, None, &history)?;
///
/// assert_eq!(decision.mask.values(), &[true, false]);
/// # Ok(())
/// # }
/// # #[cfg(not(feature = "candle"))]
/// # fn main() {}
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct ConfidenceEngine {
    measure: ConfidenceMeasure,
    schedule: ThresholdSchedule,
    measure_threshold: f32,
}

impl ConfidenceEngine {
    /// The trend measures compare against `schedule.base()`
    pub fn new(measure: ConfidenceMeasure, schedule: ThresholdSchedule) -> Self {
        Self {
            measure,
            schedule,
            measure_threshold: schedule.base(),
        }
    }

    /// Builds the engine for the active family of `config`.
    ///
    /// Fails with [`Error::Config`](crate::Error::Config) when no family is set,
    /// its threshold is missing, or its measure key is unknown.
    pub fn from_config(config: &ExitConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            measure: config.measure()?,
            schedule: config.threshold_schedule()?,
            measure_threshold: config.measure_threshold()?,
        })
    }

    pub fn measure(&self) -> ConfidenceMeasure {
        self.measure
    }

    pub fn schedule(&self) -> ThresholdSchedule {
        self.schedule
    }

    /// Threshold for `position`, with an optional shallow-to-deep override
    pub fn threshold(&self, position: usize, adapt: Option<f32>) -> f32 {
        self.schedule.resolve(position, adapt)
    }

    /// Raw confidence for one layer, without thresholding
    pub fn confidence<B: Backend>(
        &self,
        query: &ExitQuery<'_, B>,
        classifier: Option<&mut dyn ExitClassifier<B>>,
        history: &LayerHistory<B>,
    ) -> Result<Scores> {
        self.measure.score(query, classifier, history, self.measure_threshold)
    }

    /// Scores one layer and compares each score to the position's threshold.
    ///
    /// An element exits only when its confidence is strictly greater than the
    /// threshold.
    pub fn decide<B: Backend>(
        &self,
        query: &ExitQuery<'_, B>,
        classifier: Option<&mut dyn ExitClassifier<B>>,
        history: &LayerHistory<B>,
    ) -> Result<ExitDecision> {
        let confidence = self.confidence(query, classifier, history)?;
        let threshold = self.threshold(query.position, query.adapt_threshold);
        let mask = confidence.exceeding(threshold)?;

        debug!(
            measure = %self.measure,
            layer = query.layer_index,
            position = query.position,
            threshold,
            exits = mask.count_exits(),
            total = mask.len(),
            "exit decision"
        );

        Ok(ExitDecision { mask, confidence, threshold })
    }

    /// As [`decide`](Self::decide), keeping only the mask
    pub fn skip_mask<B: Backend>(
        &self,
        query: &ExitQuery<'_, B>,
        classifier: Option<&mut dyn ExitClassifier<B>>,
        history: &LayerHistory<B>,
    ) -> Result<SkipMask> {
        Ok(self.decide(query, classifier, history)?.mask)
    }
}
