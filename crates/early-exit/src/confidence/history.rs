use crate::backend::Backend;
use crate::error::Result;

/// # LayerHistory
///
/// Append-only buffers of prior layers' hidden states and softmax distributions,
/// read by the multi-layer confidence measures.
///
/// The decoding loop owns the history, appends to it between engine calls and
/// lends it by reference. Each independent decoding session needs its own.
#[derive(Debug, Clone)]
pub struct LayerHistory<B> {
    hidden_states: Vec<B>,
    softmax_values: Vec<B>,
}

impl<B> Default for LayerHistory<B> {
    fn default() -> Self {
        Self {
            hidden_states: Vec::new(),
            softmax_values: Vec::new(),
        }
    }
}

impl<B: Backend> LayerHistory<B> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_hidden_state(&mut self, hidden_states: B) {
        self.hidden_states.push(hidden_states);
    }

    pub fn push_softmax(&mut self, softmax_values: B) {
        self.softmax_values.push(softmax_values);
    }

    /// Appends the softmax of `logits` over the last dimension
    pub fn record_logits(&mut self, logits: &B) -> Result<()> {
        self.softmax_values.push(logits.softmax_last()?);
        Ok(())
    }

    pub fn hidden_states(&self) -> &[B] {
        &self.hidden_states
    }

    pub fn softmax_values(&self) -> &[B] {
        &self.softmax_values
    }

    /// The most recent `n` hidden states, oldest first, or `None` if fewer are buffered
    pub fn last_hidden_states(&self, n: usize) -> Option<&[B]> {
        last_n(&self.hidden_states, n)
    }

    /// The most recent `n` softmax distributions, oldest first, or `None` if fewer are buffered
    pub fn last_softmax_values(&self, n: usize) -> Option<&[B]> {
        last_n(&self.softmax_values, n)
    }

    /// Drop everything, e.g. at a sequence boundary
    pub fn clear(&mut self) {
        self.hidden_states.clear();
        self.softmax_values.clear();
    }
}

fn last_n<B>(buffer: &[B], n: usize) -> Option<&[B]> {
    buffer.len().checked_sub(n).map(|start| &buffer[start..])
}
