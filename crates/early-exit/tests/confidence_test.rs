//! Integration tests for confidence scoring on candle tensors.
#![cfg(feature = "candle")]

use candle_core::{Device, Tensor};
use early_exit::confidence::{
    ConfidenceEngine, ConfidenceMeasure, ExitClassifier, ExitQuery, LayerHistory, Scores,
};
use early_exit::{Error, ExitConfig, ExitLedger, Result};

/// Two-class logits `(0, mean(hidden))`, counting resets
struct MeanClassifier {
    resets: usize,
}

impl ExitClassifier<Tensor> for MeanClassifier {
    fn forward(&mut self, hidden_states: &Tensor) -> Result<Tensor> {
        let mean = hidden_states.mean_keepdim(candle_core::D::Minus1)?;
        Ok(Tensor::cat(&[mean.zeros_like()?, mean], candle_core::D::Minus1)?)
    }

    fn reset(&mut self) {
        self.resets += 1;
    }
}

#[test]
fn test_softmax_engine_decision() {
    let engine = ConfidenceEngine::from_config(&ExitConfig::exit("softmax", 0.5)).unwrap();
    let logits = Tensor::new(&[[9f32, 0., 0.], [1., 1., 0.], [4., 0., 4.]], &Device::Cpu).unwrap();

    let query = ExitQuery::new(1, 0).with_logits(&logits);
    let decision = engine.decide(&query, None, &LayerHistory::new()).unwrap();

    assert_eq!(decision.confidence.shape(), &[3]);
    assert_eq!(decision.mask.values(), &[true, false, false]);
}

#[test]
fn test_meta_measure_with_closure_classifier() {
    let engine = ConfidenceEngine::from_config(&ExitConfig::exit("meta_n", 0.6)).unwrap();
    let hidden = Tensor::new(&[[[3f32, 3.]], [[-3., -3.]]], &Device::Cpu).unwrap();
    let mut classifier = |h: &Tensor| -> Result<Tensor> {
        let mean = h.mean_keepdim(candle_core::D::Minus1)?;
        Ok(Tensor::cat(&[mean.zeros_like()?, mean], candle_core::D::Minus1)?)
    };

    let query = ExitQuery::new(2, 0).with_hidden_states(&hidden);
    let decision = engine
        .decide(&query, Some(&mut classifier), &LayerHistory::new())
        .unwrap();

    // sigmoid(3) and sigmoid(-3)
    assert!((decision.confidence.values()[0] - 0.952_574_1).abs() < 1e-5);
    assert_eq!(decision.mask.values(), &[true, false]);
}

#[test]
fn test_recurrent_classifier_resets_at_first_layer() {
    let engine = ConfidenceEngine::from_config(&ExitConfig::exit("recurrent_classifier", 0.5)).unwrap();
    let hidden = Tensor::new(&[[1f32, 1.]], &Device::Cpu).unwrap();
    let mut classifier = MeanClassifier { resets: 0 };

    for layer in 1..=3 {
        let query = ExitQuery::new(layer, 0).with_hidden_states(&hidden);
        engine.decide(&query, Some(&mut classifier), &LayerHistory::new()).unwrap();
    }

    assert_eq!(classifier.resets, 1);
}

#[test]
fn test_classifier_measure_without_classifier() {
    let engine = ConfidenceEngine::from_config(&ExitConfig::exit("meta", 0.5)).unwrap();
    let hidden = Tensor::new(&[[1f32, 1.]], &Device::Cpu).unwrap();

    let query = ExitQuery::new(1, 0).with_hidden_states(&hidden);
    let err = engine.decide(&query, None, &LayerHistory::new()).unwrap_err();

    assert!(matches!(err, Error::Precondition("classifier")));
}

#[test]
fn test_saturation_on_repeated_hidden_states() {
    let engine = ConfidenceEngine::from_config(&ExitConfig::exit("hidden_state_saturation", 0.99)).unwrap();
    let a = Tensor::new(&[[[1f32, 2., 3.]], [[1., 0., 0.]]], &Device::Cpu).unwrap();
    let b = Tensor::new(&[[[2f32, 4., 6.]], [[0., 1., 0.]]], &Device::Cpu).unwrap();
    let mut history = LayerHistory::new();

    let query = ExitQuery::new(1, 0).with_hidden_states(&a);
    assert_eq!(engine.confidence(&query, None, &history).unwrap(), Scores::zeros(2));

    history.push_hidden_state(a.clone());
    history.push_hidden_state(b.clone());
    let query = ExitQuery::new(2, 0).with_hidden_states(&b);
    let decision = engine.decide(&query, None, &history).unwrap();

    assert!((decision.confidence.values()[0] - 1.0).abs() < 1e-5);
    assert!(decision.confidence.values()[1].abs() < 1e-6);
    assert_eq!(decision.mask.values(), &[true, false]);
}

#[test]
fn test_top_probability_trend_over_recorded_logits() {
    let engine =
        ConfidenceEngine::from_config(&ExitConfig::exit("last_three_top_prob_heuristic", 0.9)).unwrap();
    let hidden = Tensor::zeros((1, 1, 4), candle_core::DType::F32, &Device::Cpu).unwrap();
    let mut history = LayerHistory::new();

    // top probabilities rise through softmax of growing logit gaps
    for (layer, gap) in [1f32, 2., 4.].into_iter().enumerate() {
        let logits = Tensor::new(&[[[gap, 0.]]], &Device::Cpu).unwrap();
        history.record_logits(&logits).unwrap();

        let query = ExitQuery::new(layer + 1, 0).with_hidden_states(&hidden);
        let decision = engine.decide(&query, None, &history).unwrap();
        if layer < 2 {
            assert!(decision.mask.none());
        } else {
            // sigmoid(4) > 0.9 and the trend is strictly rising
            assert_eq!(decision.confidence.values(), &[1.0]);
            assert!(decision.mask.all());
        }
    }
}

#[test]
fn test_mono_measure_on_classifier_trend() {
    let engine = ConfidenceEngine::from_config(&ExitConfig::exit("mono", 0.9)).unwrap();
    let mut classifier = MeanClassifier { resets: 0 };
    let mut history = LayerHistory::new();
    for x in [0.5f32, 1.0, 3.0] {
        history.push_hidden_state(Tensor::new(&[[[x, x]]], &Device::Cpu).unwrap());
    }
    let query = ExitQuery::new(3, 0).with_hidden_states(&history.hidden_states()[2]);

    let decision = engine.decide(&query, Some(&mut classifier), &history).unwrap();

    assert_eq!(decision.confidence.values(), &[1.0]);
}

#[test]
fn test_measure_keys_parse() {
    assert_eq!(
        "last_three_hiddens_classifier".parse::<ConfidenceMeasure>().unwrap(),
        ConfidenceMeasure::HiddenWindowClassifier { window: 3 }
    );
    assert!(matches!("nope".parse::<ConfidenceMeasure>(), Err(Error::Config(_))));
}

#[test]
fn test_engine_and_ledger_decoding_loop() {
    let engine = ConfidenceEngine::from_config(&ExitConfig::exit("softmax", 0.5)).unwrap();
    // each row's logits sharpen at a different layer
    let layer_logits = [
        Tensor::new(&[[0f32, 0.], [9., 0.], [0., 0.], [0., 0.]], &Device::Cpu).unwrap(),
        Tensor::new(&[[9f32, 0.], [0., 0.], [0., 0.]], &Device::Cpu).unwrap(),
        Tensor::new(&[[0f32, 0.], [0., 0.]], &Device::Cpu).unwrap(),
    ];
    let batch = Tensor::new(&[[0f32], [1.], [2.], [3.]], &Device::Cpu).unwrap();
    let history = LayerHistory::new();
    let mut ledger = ExitLedger::new(4);

    let mut active = batch.clone();
    for (i, logits) in layer_logits.iter().enumerate() {
        let query = ExitQuery::new(i + 1, 0).with_logits(logits);
        let mask = engine.skip_mask(&query, None, &history).unwrap();
        active = ledger.route(&active, &mask).unwrap();
    }
    let output = ledger.finish(&active).unwrap();

    assert_eq!(output.to_vec2::<f32>().unwrap(), batch.to_vec2::<f32>().unwrap());
    assert_eq!(ledger.exit_layers(), &[Some(2), Some(1), None, None]);
    assert_eq!(ledger.active_positions(), &[2, 3]);
}

#[test]
fn test_softmax_decision_over_wide_vocabulary() {
    let engine = ConfidenceEngine::from_config(&ExitConfig::exit("softmax", 0.5)).unwrap();
    let mut rows = vec![0f32; 2 * 32_000];
    rows[7] = 20.0;
    let logits = Tensor::from_vec(rows, (2, 32_000), &Device::Cpu).unwrap();

    let query = ExitQuery::new(1, 0).with_logits(&logits);
    let decision = engine.decide(&query, None, &LayerHistory::new()).unwrap();

    assert_eq!(decision.mask.values(), &[true, false]);
    assert!(decision.confidence.values()[1].abs() < 1e-6);
}
