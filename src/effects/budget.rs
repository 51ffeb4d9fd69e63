//! Operation budget shared by everything one top-level call dispatches.

use tracing::warn;

use super::effect::EffectKind;
use crate::error::KernelError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Budget {
    pub remaining: usize,
    pub max: usize,
}

impl Budget {
    #[must_use]
    pub fn new(max: usize) -> Self {
        Self { remaining: max, max }
    }

    /// Charge one dispatch. Fails once nothing is left, whatever the node.
    pub fn consume(&mut self, kind: EffectKind) -> Result<(), KernelError> {
        if self.remaining == 0 {
            warn!(effect_kind = %kind, max_effect_ops = self.max, "effect budget exhausted");
            return Err(KernelError::BudgetExceeded {
                effect_kind: kind,
                max_effect_ops: self.max,
            });
        }
        self.remaining -= 1;
        Ok(())
    }

    #[must_use]
    pub fn used(&self) -> usize {
        self.max - self.remaining
    }
}
