mod model;

use candle_core::{Device, Tensor};
use early_exit::confidence::{ConfidenceEngine, ExitQuery, LayerHistory};
use early_exit::{ExitConfig, ExitLedger};
use tracing::{info, Level};

use crate::model::Model;

const BATCH: usize = 8;
const HIDDEN: usize = 16;
const VOCAB: usize = 10;
const LAYERS: usize = 6;
const STEPS: usize = 4;

fn main() -> early_exit::Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::DEBUG).init();

    let device = Device::Cpu;
    let model = Model::new(LAYERS, HIDDEN, VOCAB, &device)?;
    let config = ExitConfig::exit("softmax", 0.6).with_position_decay(4.0, STEPS);
    let engine = ConfidenceEngine::from_config(&config)?;

    // the margin measure reads only the current layer's logits
    let history = LayerHistory::new();

    for position in 0..STEPS {
        let input = Tensor::randn(0f32, 1.0, (BATCH, HIDDEN), &device)?;
        let mut ledger = ExitLedger::new(BATCH);
        let mut active = input;

        for (i, layer) in model.layers().iter().enumerate() {
            if ledger.active_positions().is_empty() {
                break;
            }
            let (hidden, logits) = layer.forward(&active)?;

            let query = ExitQuery::new(i + 1, position).with_logits(&logits);
            let decision = engine.decide(&query, None, &history)?;
            active = ledger.route(&hidden, &decision.mask)?;
        }

        let output = ledger.finish(&active)?;
        let layers_run: usize = ledger
            .exit_layers()
            .iter()
            .map(|l| l.unwrap_or(LAYERS))
            .sum();
        info!(
            position,
            threshold = engine.threshold(position, None),
            exit_layers = ?ledger.exit_layers(),
            saved = BATCH * LAYERS - layers_run,
            output = ?output.dims(),
            "decoding step finished"
        );
    }
    Ok(())
}
