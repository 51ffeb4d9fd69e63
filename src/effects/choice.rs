//! Player decisions.
//!
//! A choice is resolved from the move's parameters when the decision is
//! present there; otherwise the program stops with a `PendingChoice` listing
//! the legal options. A supplied value matches an option when they are equal
//! or read as the same scalar, so a token can be chosen by its id and a
//! player by their seat.

use tracing::debug;

use super::effect::EffectKind;
use super::interpreter::{Flow, Interpreter, PendingChoice};
use crate::core::Value;
use crate::error::KernelError;
use crate::eval::{eval_int, eval_query, Bindings, Query, ValueExpr};

fn option_matches(option: &Value, chosen: &Value) -> bool {
    if option == chosen {
        return true;
    }
    match (option.to_scalar(), chosen.to_scalar()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn invalid_choice(decision: &str, reason: impl Into<String>) -> KernelError {
    KernelError::InvalidChoice {
        decision: decision.to_string(),
        reason: reason.into(),
    }
}

impl Interpreter<'_> {
    pub(crate) fn choose_one(
        &mut self,
        decision: &str,
        bind: &str,
        options: &Query,
        bindings: &mut Bindings,
    ) -> Result<Flow, KernelError> {
        let options = eval_query(options, &self.eval_ctx(bindings))?;
        if options.is_empty() {
            return Err(invalid_choice(decision, "no options to choose from"));
        }

        let Some(chosen) = self.params.get(decision) else {
            debug!(decision, options = options.len(), "awaiting choice");
            return Ok(Flow::Await(PendingChoice {
                decision: decision.to_string(),
                options,
                min: 1,
                max: 1,
            }));
        };

        let picked = options
            .iter()
            .find(|option| option_matches(option, chosen))
            .cloned()
            .ok_or_else(|| {
                invalid_choice(decision, format!("{chosen:?} is not one of {} options", options.len()))
            })?;
        bindings.insert(bind.to_string(), picked);
        Ok(Flow::Continue)
    }

    pub(crate) fn choose_n(
        &mut self,
        decision: &str,
        bind: &str,
        options: &Query,
        min: &ValueExpr,
        max: &ValueExpr,
        bindings: &mut Bindings,
    ) -> Result<Flow, KernelError> {
        let (options, min, max) = {
            let ctx = self.eval_ctx(bindings);
            (eval_query(options, &ctx)?, eval_int(min, &ctx)?, eval_int(max, &ctx)?)
        };
        let (min, max) = match (usize::try_from(min), usize::try_from(max)) {
            (Ok(lo), Ok(hi)) if lo <= hi => (lo, hi),
            _ => {
                return Err(KernelError::invalid_effect(
                    EffectKind::ChooseN,
                    format!("invalid bounds [{min}, {max}]"),
                ))
            }
        };
        if min > options.len() {
            return Err(invalid_choice(
                decision,
                format!("needs at least {min} of {} options", options.len()),
            ));
        }
        let max = max.min(options.len());

        let Some(chosen) = self.params.get(decision) else {
            debug!(decision, options = options.len(), min, max, "awaiting choice");
            return Ok(Flow::Await(PendingChoice {
                decision: decision.to_string(),
                options,
                min,
                max,
            }));
        };

        let chosen: Vec<&Value> = match chosen {
            Value::List(items) => items.iter().collect(),
            single => vec![single],
        };
        let mut picked: Vec<usize> = Vec::with_capacity(chosen.len());
        for value in chosen {
            let index = options
                .iter()
                .position(|option| option_matches(option, value))
                .ok_or_else(|| invalid_choice(decision, format!("{value:?} is not an option")))?;
            if picked.contains(&index) {
                return Err(invalid_choice(decision, format!("{value:?} chosen twice")));
            }
            picked.push(index);
        }
        if picked.len() < min || picked.len() > max {
            return Err(invalid_choice(
                decision,
                format!("chose {}, expected {min}..={max}", picked.len()),
            ));
        }

        picked.sort_unstable();
        let selection = picked.into_iter().map(|i| options[i].clone()).collect();
        bindings.insert(bind.to_string(), Value::List(selection));
        Ok(Flow::Continue)
    }
}
