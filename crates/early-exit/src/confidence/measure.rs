use std::fmt;
use std::str::FromStr;

use tracing::warn;

use super::classifier::ExitClassifier;
use super::history::LayerHistory;
use super::scores::Scores;
use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::tensor::operations::pad_grid;

/// Guards the cosine denominator against zero-norm hidden states
const COSINE_EPS: f32 = 1e-8;

/// # ExitQuery
///
/// Everything the engine sees for one layer of one decoding step.
///
/// Tensors are borrowed from the decoding loop. `position` is the decoding
/// step used by position-decayed thresholds, and `adapt_threshold` overrides
/// the shallow-to-deep threshold for this call.
#[derive(Debug)]
pub struct ExitQuery<'a, B> {
    /// Layer logits, `(batch, [seq,] vocab)`
    pub logits: Option<&'a B>,

    /// Layer hidden states, `(batch, [seq,] feature)`
    pub hidden_states: Option<&'a B>,

    /// 1-based index of the layer that produced these outputs
    pub layer_index: usize,

    /// Decoding position of this step
    pub position: usize,

    /// Marks a sequence boundary for stateful classifiers
    pub should_reset: bool,

    /// Replaces the configured shallow-to-deep threshold
    pub adapt_threshold: Option<f32>,
}

impl<B> Clone for ExitQuery<'_, B> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<B> Copy for ExitQuery<'_, B> {}

impl<'a, B: Backend> ExitQuery<'a, B> {
    pub fn new(layer_index: usize, position: usize) -> Self {
        Self {
            logits: None,
            hidden_states: None,
            layer_index,
            position,
            should_reset: false,
            adapt_threshold: None,
        }
    }

    pub fn with_logits(mut self, logits: &'a B) -> Self {
        self.logits = Some(logits);
        self
    }

    pub fn with_hidden_states(mut self, hidden_states: &'a B) -> Self {
        self.hidden_states = Some(hidden_states);
        self
    }

    pub fn with_reset(mut self, should_reset: bool) -> Self {
        self.should_reset = should_reset;
        self
    }

    pub fn with_adapt_threshold(mut self, threshold: f32) -> Self {
        self.adapt_threshold = Some(threshold);
        self
    }

    fn require_logits(&self) -> Result<&'a B> {
        self.logits.ok_or(Error::Precondition("logits"))
    }

    fn require_hidden_states(&self) -> Result<&'a B> {
        self.hidden_states.ok_or(Error::Precondition("hidden_states"))
    }

    // batch size for the zero sentinel, taken from whichever tensor was supplied
    fn batch_size(&self) -> Result<usize> {
        self.hidden_states
            .or(self.logits)
            .map(|t| t.batch_size())
            .ok_or(Error::Precondition("hidden_states"))
    }
}

/// # ConfidenceMeasure
///
/// The closed set of scoring strategies. Each variant holds only its own
/// window parameters; tensors arrive through [`ExitQuery`] and
/// [`LayerHistory`].
///
/// | key | variant |
/// |---|---|
/// | `softmax` | [`ProbabilityMargin`](ConfidenceMeasure::ProbabilityMargin) |
/// | `meta`, `meta_n` | [`Classifier`](ConfidenceMeasure::Classifier) |
/// | `recurrent_classifier` | [`RecurrentClassifier`](ConfidenceMeasure::RecurrentClassifier) |
/// | `last_three_hiddens_classifier` | [`HiddenWindowClassifier`](ConfidenceMeasure::HiddenWindowClassifier) |
/// | `hidden_state_saturation` | [`HiddenStateSaturation`](ConfidenceMeasure::HiddenStateSaturation) |
/// | `last_three_top_prob_heuristic` | [`TopProbabilityTrend`](ConfidenceMeasure::TopProbabilityTrend) |
/// | `mono` | [`ClassifierTrend`](ConfidenceMeasure::ClassifierTrend) |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceMeasure {
    /// Gap between the two largest softmax probabilities of the logits
    ProbabilityMargin,

    /// Positive-class probability of the classifier on the hidden states
    Classifier,

    /// As [`Classifier`](Self::Classifier), for a classifier carrying state across layers
    RecurrentClassifier,

    /// Classifier over the last `window` hidden states joined on the feature axis
    HiddenWindowClassifier { window: usize },

    /// Cosine similarity of the last two hidden states
    HiddenStateSaturation,

    /// `1.0` where the top softmax probability rose strictly over the last
    /// `window` layers and ends above the threshold
    TopProbabilityTrend { window: usize, min_layer: usize },

    /// As [`TopProbabilityTrend`](Self::TopProbabilityTrend), on the classifier's
    /// top probability for each of the last `window` hidden states
    ClassifierTrend { window: usize },
}

impl FromStr for ConfidenceMeasure {
    type Err = Error;

    fn from_str(key: &str) -> Result<Self> {
        match key {
            "softmax" => Ok(Self::ProbabilityMargin),
            "meta" | "meta_n" => Ok(Self::Classifier),
            "recurrent_classifier" => Ok(Self::RecurrentClassifier),
            "last_three_hiddens_classifier" => Ok(Self::HiddenWindowClassifier { window: 3 }),
            "hidden_state_saturation" => Ok(Self::HiddenStateSaturation),
            "last_three_top_prob_heuristic" => Ok(Self::TopProbabilityTrend { window: 3, min_layer: 3 }),
            "mono" => Ok(Self::ClassifierTrend { window: 3 }),
            _ => Err(Error::Config(format!("invalid confidence measure: {}", key))),
        }
    }
}

impl fmt::Display for ConfidenceMeasure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = match self {
            Self::ProbabilityMargin => "softmax",
            Self::Classifier => "meta",
            Self::RecurrentClassifier => "recurrent_classifier",
            Self::HiddenWindowClassifier { .. } => "last_three_hiddens_classifier",
            Self::HiddenStateSaturation => "hidden_state_saturation",
            Self::TopProbabilityTrend { .. } => "last_three_top_prob_heuristic",
            Self::ClassifierTrend { .. } => "mono",
        };
        f.write_str(key)
    }
}

impl ConfidenceMeasure {
    /// Scores one layer.
    ///
    /// # Parameters
    ///
    /// * `query` - The layer's tensors and step context
    /// * `classifier` - Auxiliary scorer, required by every classifier-based variant
    /// * `history` - Prior layers' buffers, read by the multi-layer variants
    /// * `threshold` - Base threshold the trend variants compare their last observation to
    ///
    /// # Returns
    ///
    /// One score per element. Multi-layer variants return [`Scores::zeros`] until
    /// enough history is buffered.
    ///
    /// # Errors
    ///
    /// [`Error::Precondition`] when a required tensor or the classifier is missing.
    pub fn score<B: Backend>(
        &self,
        query: &ExitQuery<'_, B>,
        classifier: Option<&mut dyn ExitClassifier<B>>,
        history: &LayerHistory<B>,
        threshold: f32,
    ) -> Result<Scores> {
        match *self {
            Self::ProbabilityMargin => probability_margin(query.require_logits()?),
            Self::Classifier => {
                let hidden = query.require_hidden_states()?;
                let classifier = require(classifier)?;
                positive_class(&classifier.forward(hidden)?)
            }
            Self::RecurrentClassifier => {
                let hidden = query.require_hidden_states()?;
                let classifier = require(classifier)?;
                recurrent_classifier(query, hidden, classifier)
            }
            Self::HiddenWindowClassifier { window } => {
                let classifier = require(classifier)?;
                match history.last_hidden_states(window) {
                    Some(recent) if window > 0 => {
                        let feature_dim = recent[0].shape().len().saturating_sub(1);
                        let joined = B::cat(recent, feature_dim)?;
                        positive_class(&classifier.forward(&joined)?)
                    }
                    _ => Ok(Scores::zeros(query.batch_size()?)),
                }
            }
            Self::HiddenStateSaturation => match history.last_hidden_states(2) {
                Some(recent) => cosine_similarity(&recent[1], &recent[0]),
                None => Ok(Scores::zeros(query.batch_size()?)),
            },
            Self::TopProbabilityTrend { window, min_layer } => {
                match history.last_softmax_values(window) {
                    Some(recent) if window > 0 && query.layer_index >= min_layer => {
                        let observations = recent
                            .iter()
                            .map(|probs| top_probability(probs))
                            .collect::<Result<Vec<_>>>()?;
                        rising_trend(&observations, threshold)
                    }
                    _ => Ok(Scores::zeros(query.batch_size()?)),
                }
            }
            Self::ClassifierTrend { window } => {
                let classifier = require(classifier)?;
                match history.last_hidden_states(window) {
                    Some(recent) if window > 0 => {
                        let mut observations = Vec::with_capacity(window);
                        for hidden in recent {
                            let probs = classifier.forward(hidden)?.softmax_last()?;
                            observations.push(top_probability(&probs)?);
                        }
                        rising_trend(&observations, threshold)
                    }
                    _ => Ok(Scores::zeros(query.batch_size()?)),
                }
            }
        }
    }
}

fn require<B: Backend>(
    classifier: Option<&mut dyn ExitClassifier<B>>,
) -> Result<&mut dyn ExitClassifier<B>> {
    classifier.ok_or(Error::Precondition("classifier"))
}

fn probability_margin<B: Backend>(logits: &B) -> Result<Scores> {
    let top = logits.softmax_last()?.top_k_last(2)?;
    let gaps = top.to_vec_f32()?
        .chunks(2)
        .map(|pair| pair[0] - pair[1])
        .collect();
    Ok(Scores::reduced(&top.shape(), gaps))
}

// softmax over the class axis, probability of class 1
fn positive_class<B: Backend>(preds: &B) -> Result<Scores> {
    let shape = preds.shape();
    let classes = shape.last().copied().unwrap_or(0);
    if classes < 2 {
        return Err(Error::Shape(format!(
            "classifier output {:?} needs at least two classes", shape
        )));
    }
    let probs = preds.softmax_last()?.to_vec_f32()?;
    let positive = probs.chunks(classes).map(|row| row[1]).collect();
    Ok(Scores::reduced(&shape, positive))
}

fn recurrent_classifier<B: Backend>(
    query: &ExitQuery<'_, B>,
    hidden: &B,
    classifier: &mut dyn ExitClassifier<B>,
) -> Result<Scores> {
    if query.layer_index == 1 || query.should_reset {
        classifier.reset();
    }
    let preds = match classifier.forward(hidden) {
        Err(Error::TransientState(reason)) => {
            warn!(%reason, layer = query.layer_index, "resetting recurrent classifier and retrying");
            classifier.reset();
            classifier.forward(hidden)?
        }
        other => other?,
    };
    positive_class(&preds)
}

fn cosine_similarity<B: Backend>(last: &B, previous: &B) -> Result<Scores> {
    let dot = last.mul(previous)?.sum_last_keepdim()?;
    let last_sq = last.mul(last)?.sum_last_keepdim()?.to_vec_f32()?;
    let previous_sq = previous.mul(previous)?.sum_last_keepdim()?.to_vec_f32()?;

    let similarity = dot.to_vec_f32()?
        .iter()
        .zip(last_sq.iter().zip(previous_sq.iter()))
        .map(|(d, (a, b))| d / (a.sqrt().max(COSINE_EPS) * b.sqrt().max(COSINE_EPS)))
        .collect();
    Ok(Scores::reduced(&dot.shape(), similarity))
}

/// Top probability per `(batch, seq)` cell of one observation
struct Observation {
    rows: usize,
    cols: usize,
    values: Vec<f32>,
}

fn top_probability<B: Backend>(probs: &B) -> Result<Observation> {
    let top = probs.top_k_last(1)?;
    let shape = top.shape();
    let (rows, cols) = match shape.as_slice() {
        [rows, _] => (*rows, 1),
        [rows, cols, _] => (*rows, *cols),
        _ => {
            return Err(Error::Shape(format!(
                "trend measures take (batch, [seq,] classes) distributions, got {:?}", probs.shape()
            )))
        }
    };
    Ok(Observation { rows, cols, values: top.to_vec_f32()? })
}

/// Marks cells whose observations rise strictly and end above `threshold`.
///
/// Observations may come from steps with different batch sizes or sequence
/// lengths; every one is zero-padded to the largest grid first. Probabilities
/// are non-negative, so padding never raises a top probability.
fn rising_trend(observations: &[Observation], threshold: f32) -> Result<Scores> {
    let rows = observations.iter().map(|o| o.rows).max().unwrap_or(0);
    let cols = observations.iter().map(|o| o.cols).max().unwrap_or(0);
    let padded: Vec<Vec<f32>> = observations
        .iter()
        .map(|o| pad_grid(&o.values, o.rows, o.cols, rows, cols))
        .collect();

    let confidence = (0..rows * cols)
        .map(|cell| {
            let rising = padded.windows(2).all(|pair| pair[0][cell] < pair[1][cell]);
            let last = padded.last().map(|p| p[cell]).unwrap_or(0.0);
            if rising && last > threshold { 1.0 } else { 0.0 }
        })
        .collect();

    let shape = if cols == 1 { vec![rows] } else { vec![rows, cols] };
    Ok(Scores::new(shape, confidence))
}
