use crate::backend::Backend;
use crate::error::Result;

/// # ExitClassifier
///
/// An auxiliary scorer mapping hidden states to two-class logits, with the
/// positive ("confident") class at index `1` of the last dimension.
///
/// Classifiers that carry recurrent state across layers of a decoding step
/// override [`ExitClassifier::reset`]; the recurrent measure calls it on the
/// first layer of every step and whenever the caller flags a sequence boundary.
/// When carried state no longer fits the input, `forward` should fail with
/// [`Error::TransientState`](crate::Error::TransientState) so the measure can
/// reset and retry.
///
/// The classifier is owned by the decoding loop and lent to the engine for
/// each call, so independent sessions never share state.
///
/// ```rust
/// use early_exit::backend::Backend;
/// use early_exit::confidence::ExitClassifier;
/// use early_exit::Result;
///
/// /// Counts layers seen since the last reset
/// struct Depth { seen: usize }
///
/// impl<B: Backend> ExitClassifier<B> for Depth {
///     fn forward(&mut self, hidden_states: &B) -> Result<B> {
///         self.seen += 1;
///         Ok(hidden_states.clone())
///     }
///
///     fn reset(&mut self) {
///         self.seen = 0;
///     }
/// }
/// ```
pub trait ExitClassifier<B: Backend> {
    /// Two-class logits for `hidden_states`, classes on the last dimension
    fn forward(&mut self, hidden_states: &B) -> Result<B>;

    /// Clear any recurrent state. Stateless classifiers keep the default no-op.
    fn reset(&mut self) {}
}

// Plain closures serve as stateless classifiers
impl<B, F> ExitClassifier<B> for F
where
    B: Backend,
    F: FnMut(&B) -> Result<B>,
{
    fn forward(&mut self, hidden_states: &B) -> Result<B> {
        self(hidden_states)
    }
}
