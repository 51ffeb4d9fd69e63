//! Control-flow and randomness handlers.
//!
//! Bodies run under the caller's budget. Bindings introduced by a construct
//! (`forEach` items, `let` values, `reduce` results, rolls) are visible only
//! inside its body; the enclosing scope is restored afterwards.

use tracing::debug;

use super::effect::{Effect, EffectKind, PriorityGroup};
use super::interpreter::{Flow, Interpreter};
use crate::core::{Value, ValueType};
use crate::error::KernelError;
use crate::eval::{eval_int, eval_query, eval_value, Bindings, Query, ValueExpr};
use crate::selectors::TokenSel;
use crate::zones::ZonePosition;

/// The per-subset half of an `evaluateSubset`.
pub(crate) struct SubsetScoring<'e> {
    pub(crate) subset_bind: &'e str,
    pub(crate) compute: &'e [Effect],
    pub(crate) score: &'e ValueExpr,
}

impl Interpreter<'_> {
    pub(crate) fn for_each(
        &mut self,
        bind: &str,
        over: &Query,
        effects: &[Effect],
        limit: Option<&ValueExpr>,
        count_bind: Option<&str>,
        bindings: &mut Bindings,
    ) -> Result<Flow, KernelError> {
        let (items, limit) = {
            let ctx = self.eval_ctx(bindings);
            let limit = match limit {
                Some(expr) => Some(eval_int(expr, &ctx)?),
                None => None,
            };
            (eval_query(over, &ctx)?, limit)
        };
        let cap = match limit {
            Some(n) if n <= 0 => {
                return Err(KernelError::invalid_effect(
                    EffectKind::ForEach,
                    format!("limit must be positive, got {n}"),
                ))
            }
            Some(n) => usize::try_from(n).unwrap_or(usize::MAX),
            None => usize::MAX,
        };

        let mut iterations: i64 = 0;
        for item in items.into_iter().take(cap) {
            let mut scope = bindings.clone();
            scope.insert(bind.to_string(), item);
            if let Flow::Await(choice) = self.run_list(effects, &mut scope)? {
                return Ok(Flow::Await(choice));
            }
            iterations += 1;
        }

        if let Some(name) = count_bind {
            bindings.insert(name.to_string(), Value::Int(iterations));
        }
        Ok(Flow::Continue)
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn reduce(
        &mut self,
        item_bind: &str,
        acc_bind: &str,
        over: &Query,
        initial: &ValueExpr,
        next: &ValueExpr,
        result_bind: &str,
        effects: &[Effect],
        bindings: &Bindings,
    ) -> Result<Flow, KernelError> {
        let result = {
            let ctx = self.eval_ctx(bindings);
            let items = eval_query(over, &ctx)?;
            let mut acc: Value = eval_value(initial, &ctx)?.into();
            for item in items {
                let mut scope = bindings.clone();
                scope.insert(item_bind.to_string(), item);
                scope.insert(acc_bind.to_string(), acc);
                acc = eval_value(next, &self.eval_ctx(&scope))?.into();
            }
            acc
        };

        let mut scope = bindings.clone();
        scope.insert(result_bind.to_string(), result);
        self.run_list(effects, &mut scope)
    }

    pub(crate) fn remove_by_priority(
        &mut self,
        budget: &ValueExpr,
        groups: &[PriorityGroup],
        remaining_bind: Option<&str>,
        effects: &[Effect],
        bindings: &Bindings,
    ) -> Result<Flow, KernelError> {
        let mut remaining = eval_int(budget, &self.eval_ctx(bindings))?;
        if remaining < 0 {
            return Err(KernelError::invalid_effect(
                EffectKind::RemoveByPriority,
                format!("budget must not be negative, got {remaining}"),
            ));
        }

        for group in groups {
            if remaining == 0 {
                break;
            }
            let candidates = eval_query(&group.over, &self.eval_ctx(bindings))?;
            for candidate in candidates {
                if remaining == 0 {
                    break;
                }
                if !matches!(candidate, Value::Token(_)) {
                    return Err(KernelError::type_mismatch(
                        ValueType::Token,
                        candidate.value_type(),
                        format!("removeByPriority group `{}`", group.bind),
                    ));
                }
                let mut scope = bindings.clone();
                scope.insert(group.bind.clone(), candidate);
                let removal = Effect::MoveToken {
                    token: TokenSel::Bound(group.bind.clone()),
                    from: group.from.clone(),
                    to: group.to.clone(),
                    position: ZonePosition::Top,
                };
                if let Flow::Await(choice) = self.apply(&removal, &mut scope)? {
                    return Ok(Flow::Await(choice));
                }
                remaining -= 1;
            }
        }

        let mut scope = bindings.clone();
        if let Some(name) = remaining_bind {
            scope.insert(name.to_string(), Value::Int(remaining));
        }
        self.run_list(effects, &mut scope)
    }

    /// Score every subset on a scratch copy of the state; only `effects`
    /// touch the real one.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn evaluate_subset(
        &mut self,
        source: &Query,
        subset_size: &ValueExpr,
        scoring: &SubsetScoring<'_>,
        result_bind: &str,
        best_subset_bind: Option<&str>,
        effects: &[Effect],
        bindings: &Bindings,
    ) -> Result<Flow, KernelError> {
        let (items, size) = {
            let ctx = self.eval_ctx(bindings);
            (eval_query(source, &ctx)?, eval_int(subset_size, &ctx)?)
        };
        let size = match usize::try_from(size) {
            Ok(k) if k <= items.len() => k,
            _ => {
                return Err(KernelError::invalid_effect(
                    EffectKind::EvaluateSubset,
                    format!("subset size {size} out of range for {} items", items.len()),
                ))
            }
        };
        let max = self.def.limits.max_subset_combinations;
        if binomial(items.len(), size) > max {
            return Err(KernelError::QueryTooLarge { max });
        }

        let mut best: Option<(i64, Vec<Value>)> = None;
        let mut indices: Vec<usize> = (0..size).collect();
        loop {
            let subset: Vec<Value> = indices.iter().map(|&i| items[i].clone()).collect();
            let score = self.score_subset(scoring, &subset, bindings)?;
            if best.as_ref().map_or(true, |(top, _)| score > *top) {
                best = Some((score, subset));
            }
            if !next_combination(&mut indices, items.len()) {
                break;
            }
        }

        let mut scope = bindings.clone();
        if let Some((score, subset)) = best {
            debug!(score, size, "best subset selected");
            scope.insert(result_bind.to_string(), Value::Int(score));
            if let Some(name) = best_subset_bind {
                scope.insert(name.to_string(), Value::List(subset));
            }
        }
        self.run_list(effects, &mut scope)
    }

    /// Run `compute` for one subset and restore the state afterwards.
    fn score_subset(
        &mut self,
        scoring: &SubsetScoring<'_>,
        subset: &[Value],
        bindings: &Bindings,
    ) -> Result<i64, KernelError> {
        let saved_state = self.state.clone();
        let saved_events = self.events.len();
        let mut scope = bindings.clone();
        scope.insert(scoring.subset_bind.to_string(), Value::List(subset.to_vec()));

        let flow = self.run_list(scoring.compute, &mut scope);
        let score = match flow {
            Ok(Flow::Continue) => eval_int(scoring.score, &self.eval_ctx(&scope)),
            Ok(Flow::Await(choice)) => Err(KernelError::invalid_effect(
                EffectKind::EvaluateSubset,
                format!("compute cannot await decision `{}`", choice.decision),
            )),
            Err(err) => Err(err),
        };

        self.state = saved_state;
        self.events.truncate(saved_events);
        score
    }

    pub(crate) fn roll_random(
        &mut self,
        bind: &str,
        min: &ValueExpr,
        max: &ValueExpr,
        effects: &[Effect],
        bindings: &Bindings,
    ) -> Result<Flow, KernelError> {
        let (min, max) = {
            let ctx = self.eval_ctx(bindings);
            (eval_int(min, &ctx)?, eval_int(max, &ctx)?)
        };
        let (roll, rng) = self.state.rng.next_int(min, max)?;
        self.state.rng = rng;
        debug!(min, max, roll, "rolled");

        let mut scope = bindings.clone();
        scope.insert(bind.to_string(), Value::Int(roll));
        self.run_list(effects, &mut scope)
    }
}

/// `n choose k`, saturating.
fn binomial(n: usize, k: usize) -> usize {
    let k = k.min(n - k);
    let mut result: usize = 1;
    for i in 0..k {
        result = result.saturating_mul(n - i) / (i + 1);
        if result == usize::MAX {
            break;
        }
    }
    result
}

/// Advance to the next lexicographic k-combination of `0..n`.
fn next_combination(indices: &mut [usize], n: usize) -> bool {
    let k = indices.len();
    for i in (0..k).rev() {
        if indices[i] < n - k + i {
            indices[i] += 1;
            for j in i + 1..k {
                indices[j] = indices[j - 1] + 1;
            }
            return true;
        }
    }
    false
}
