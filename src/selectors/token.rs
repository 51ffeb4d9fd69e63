//! Token references.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::{Token, TokenId, Value, ValueType};
use crate::error::KernelError;
use crate::eval::EvalContext;
use crate::zones::locate_token;

use super::bound_selector_value;

/// A token named by literal id or by a binding holding a token (or its id).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenSel {
    Id(TokenId),
    Bound(String),
}

impl TokenSel {
    pub fn bound(name: impl Into<String>) -> Self {
        TokenSel::Bound(name.into())
    }

    pub fn id(id: impl Into<String>) -> Self {
        TokenSel::Id(TokenId::new(id))
    }
}

impl fmt::Display for TokenSel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenSel::Id(id) => write!(f, "{id}"),
            TokenSel::Bound(name) => f.write_str(name),
        }
    }
}

/// Resolve the id a token selector names, without checking where it is.
pub fn resolve_token_id(sel: &TokenSel, ctx: &EvalContext<'_>) -> Result<TokenId, KernelError> {
    match sel {
        TokenSel::Id(id) => Ok(id.clone()),
        TokenSel::Bound(name) => match bound_selector_value(name, ctx)? {
            Value::Token(token) => Ok(token.id.clone()),
            Value::Str(id) => Ok(TokenId::new(id.as_str())),
            other => Err(KernelError::type_mismatch(
                ValueType::Token,
                other.value_type(),
                format!("token binding `{name}`"),
            )),
        },
    }
}

/// Resolve a token selector to the token as it is in the current state.
///
/// Bound tokens are snapshots; the live copy is looked up by id so that
/// property changes made since binding are visible.
pub fn resolve_token(sel: &TokenSel, ctx: &EvalContext<'_>) -> Result<Token, KernelError> {
    let id = resolve_token_id(sel, ctx)?;
    let location = locate_token(ctx.state, &id)?;
    ctx.state
        .zones
        .get(&location.zone)
        .and_then(|tokens| tokens.get(location.index))
        .cloned()
        .ok_or(KernelError::TokenLocation {
            token: id,
            zones: vec![location.zone],
        })
}
