//! Tokens - runtime game pieces.
//!
//! A `Token` is a uniquely-identified, typed piece with a small property bag.
//! Ownership is positional: a token belongs to whichever zone sequence holds
//! it, there is no back-reference from the token to its zone.

use im::OrdMap;
use serde::{Deserialize, Serialize};

use super::value::ScalarValue;

/// Unique token identifier.
///
/// Fresh ids are minted as `tok_<type>_<ordinal>` from the state's ordinal
/// counter; `GameState::mint_token_id` skips ordinals whose id is already
/// placed.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TokenId(pub String);

impl TokenId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mint the id for the `ordinal`-th token of the game.
    #[must_use]
    pub fn minted(token_type: &str, ordinal: u64) -> Self {
        Self(format!("tok_{token_type}_{ordinal}"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TokenId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A game piece.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub id: TokenId,

    /// Declared token type (e.g. `"troops"`, `"base"`).
    pub token_type: String,

    /// Scalar property bag. Unknown keys are an explicit failure at read time.
    #[serde(default)]
    pub props: OrdMap<String, ScalarValue>,
}

impl Token {
    pub fn new(id: impl Into<String>, token_type: impl Into<String>) -> Self {
        Self {
            id: TokenId::new(id),
            token_type: token_type.into(),
            props: OrdMap::new(),
        }
    }

    /// Set a property (builder pattern).
    #[must_use]
    pub fn with_prop(mut self, key: impl Into<String>, value: impl Into<ScalarValue>) -> Self {
        self.props.insert(key.into(), value.into());
        self
    }

    /// Read a property, including the `id` and `type` pseudo-properties.
    ///
    /// Declared properties shadow the pseudo-properties.
    #[must_use]
    pub fn prop(&self, key: &str) -> Option<ScalarValue> {
        if let Some(value) = self.props.get(key) {
            return Some(value.clone());
        }
        match key {
            "id" => Some(ScalarValue::Str(self.id.0.clone())),
            "type" => Some(ScalarValue::Str(self.token_type.clone())),
            _ => None,
        }
    }

    /// Names a property lookup could have matched, for error suggestions.
    #[must_use]
    pub fn prop_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.props.keys().cloned().collect();
        names.push("id".to_string());
        names.push("type".to_string());
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minted_id() {
        assert_eq!(TokenId::minted("troops", 7).as_str(), "tok_troops_7");
    }

    #[test]
    fn test_pseudo_props() {
        let token = Token::new("t1", "base").with_prop("faction", "nva");

        assert_eq!(token.prop("faction"), Some(ScalarValue::from("nva")));
        assert_eq!(token.prop("type"), Some(ScalarValue::from("base")));
        assert_eq!(token.prop("id"), Some(ScalarValue::from("t1")));
        assert_eq!(token.prop("strength"), None);
    }

    #[test]
    fn test_declared_prop_shadows_pseudo() {
        let token = Token::new("t1", "base").with_prop("type", "override");
        assert_eq!(token.prop("type"), Some(ScalarValue::from("override")));
    }

    #[test]
    fn test_token_serialization() {
        let token = Token::new("t1", "troops").with_prop("strength", 3);
        let json = serde_json::to_string(&token).unwrap();
        let deserialized: Token = serde_json::from_str(&json).unwrap();
        assert_eq!(token, deserialized);
    }
}
