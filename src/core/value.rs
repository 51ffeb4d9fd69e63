//! Value types shared by state, definitions and the evaluator.
//!
//! ## Value Families
//!
//! - `ScalarValue`: token properties and expression results (`Int`, `Bool`, `Str`)
//! - `VarValue`: global and per-player variables (`Int`, `Bool`)
//! - `AttributeValue`: static zone attributes (scalars plus ordered string lists)
//! - `Value`: anything a binding can hold (scalars, players, zones, tokens, lists)
//!
//! Integers are `i64` but the engine only admits the safe-integer range
//! `[-(2^53 - 1), 2^53 - 1]` so that serialized states survive any JSON tooling
//! on the replay side.

use serde::{Deserialize, Serialize};

use super::config::ZoneId;
use super::player::PlayerId;
use super::token::Token;

/// Largest integer the evaluator will produce.
pub const MAX_SAFE_INTEGER: i64 = 9_007_199_254_740_991;

/// Smallest integer the evaluator will produce.
pub const MIN_SAFE_INTEGER: i64 = -MAX_SAFE_INTEGER;

/// Check whether an integer lies in the safe range.
#[must_use]
pub const fn is_safe_integer(value: i64) -> bool {
    value >= MIN_SAFE_INTEGER && value <= MAX_SAFE_INTEGER
}

/// Runtime type tag used in error reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueType {
    Int,
    Bool,
    Str,
    StrList,
    Player,
    Zone,
    Token,
    List,
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ValueType::Int => "int",
            ValueType::Bool => "bool",
            ValueType::Str => "string",
            ValueType::StrList => "string list",
            ValueType::Player => "player",
            ValueType::Zone => "zone",
            ValueType::Token => "token",
            ValueType::List => "list",
        };
        f.write_str(name)
    }
}

/// A scalar: the only shapes expressions and token properties produce.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ScalarValue {
    Int(i64),
    Bool(bool),
    Str(String),
}

impl ScalarValue {
    /// Get as integer if this is an Int value.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ScalarValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Get as bool if this is a Bool value.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ScalarValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Get as string reference if this is a Str value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScalarValue::Str(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn value_type(&self) -> ValueType {
        match self {
            ScalarValue::Int(_) => ValueType::Int,
            ScalarValue::Bool(_) => ValueType::Bool,
            ScalarValue::Str(_) => ValueType::Str,
        }
    }
}

impl std::fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScalarValue::Int(v) => write!(f, "{v}"),
            ScalarValue::Bool(v) => write!(f, "{v}"),
            ScalarValue::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for ScalarValue {
    fn from(v: i64) -> Self {
        ScalarValue::Int(v)
    }
}

impl From<i32> for ScalarValue {
    fn from(v: i32) -> Self {
        ScalarValue::Int(v as i64)
    }
}

impl From<bool> for ScalarValue {
    fn from(v: bool) -> Self {
        ScalarValue::Bool(v)
    }
}

impl From<&str> for ScalarValue {
    fn from(v: &str) -> Self {
        ScalarValue::Str(v.to_string())
    }
}

impl From<String> for ScalarValue {
    fn from(v: String) -> Self {
        ScalarValue::Str(v)
    }
}

/// Value of a declared variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VarValue {
    Int(i64),
    Bool(bool),
}

impl VarValue {
    #[must_use]
    pub fn as_int(self) -> Option<i64> {
        match self {
            VarValue::Int(v) => Some(v),
            VarValue::Bool(_) => None,
        }
    }

    #[must_use]
    pub fn as_bool(self) -> Option<bool> {
        match self {
            VarValue::Bool(v) => Some(v),
            VarValue::Int(_) => None,
        }
    }
}

impl From<VarValue> for ScalarValue {
    fn from(v: VarValue) -> Self {
        match v {
            VarValue::Int(i) => ScalarValue::Int(i),
            VarValue::Bool(b) => ScalarValue::Bool(b),
        }
    }
}

impl std::fmt::Display for VarValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VarValue::Int(v) => write!(f, "{v}"),
            VarValue::Bool(v) => write!(f, "{v}"),
        }
    }
}

/// Static attribute attached to a zone definition.
///
/// List values compare by exact order in stacking space filters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeValue {
    Int(i64),
    Bool(bool),
    Text(String),
    TextList(Vec<String>),
}

impl AttributeValue {
    /// Project to a scalar, if this is not a list.
    #[must_use]
    pub fn as_scalar(&self) -> Option<ScalarValue> {
        match self {
            AttributeValue::Int(v) => Some(ScalarValue::Int(*v)),
            AttributeValue::Bool(v) => Some(ScalarValue::Bool(*v)),
            AttributeValue::Text(s) => Some(ScalarValue::Str(s.clone())),
            AttributeValue::TextList(_) => None,
        }
    }

    #[must_use]
    pub fn value_type(&self) -> ValueType {
        match self {
            AttributeValue::Int(_) => ValueType::Int,
            AttributeValue::Bool(_) => ValueType::Bool,
            AttributeValue::Text(_) => ValueType::Str,
            AttributeValue::TextList(_) => ValueType::StrList,
        }
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Int(v)
    }
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        AttributeValue::Bool(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::Text(v.to_string())
    }
}

impl From<Vec<String>> for AttributeValue {
    fn from(v: Vec<String>) -> Self {
        AttributeValue::TextList(v)
    }
}

/// Anything a binding (`$name`) can hold.
///
/// Tokens are bound as snapshots; lookups by id go back to the current state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    Int(i64),
    Bool(bool),
    Str(String),
    Player(PlayerId),
    Zone(ZoneId),
    Token(Token),
    List(Vec<Value>),
}

impl Value {
    #[must_use]
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Int(_) => ValueType::Int,
            Value::Bool(_) => ValueType::Bool,
            Value::Str(_) => ValueType::Str,
            Value::Player(_) => ValueType::Player,
            Value::Zone(_) => ValueType::Zone,
            Value::Token(_) => ValueType::Token,
            Value::List(_) => ValueType::List,
        }
    }

    /// Project to the scalar an expression sees when it reads this binding.
    ///
    /// Players read as their seat index, zones and tokens as their ids.
    /// Lists have no scalar form.
    #[must_use]
    pub fn to_scalar(&self) -> Option<ScalarValue> {
        match self {
            Value::Int(v) => Some(ScalarValue::Int(*v)),
            Value::Bool(v) => Some(ScalarValue::Bool(*v)),
            Value::Str(s) => Some(ScalarValue::Str(s.clone())),
            Value::Player(p) => Some(ScalarValue::Int(p.index() as i64)),
            Value::Zone(z) => Some(ScalarValue::Str(z.as_str().to_string())),
            Value::Token(t) => Some(ScalarValue::Str(t.id.as_str().to_string())),
            Value::List(_) => None,
        }
    }
}

impl From<ScalarValue> for Value {
    fn from(v: ScalarValue) -> Self {
        match v {
            ScalarValue::Int(i) => Value::Int(i),
            ScalarValue::Bool(b) => Value::Bool(b),
            ScalarValue::Str(s) => Value::Str(s),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<PlayerId> for Value {
    fn from(v: PlayerId) -> Self {
        Value::Player(v)
    }
}

impl From<ZoneId> for Value {
    fn from(v: ZoneId) -> Self {
        Value::Zone(v)
    }
}

impl From<Token> for Value {
    fn from(v: Token) -> Self {
        Value::Token(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_integer_bounds() {
        assert!(is_safe_integer(MAX_SAFE_INTEGER));
        assert!(is_safe_integer(MIN_SAFE_INTEGER));
        assert!(!is_safe_integer(MAX_SAFE_INTEGER + 1));
        assert!(!is_safe_integer(i64::MIN));
    }

    #[test]
    fn test_scalar_accessors() {
        assert_eq!(ScalarValue::from(5).as_int(), Some(5));
        assert_eq!(ScalarValue::from(true).as_bool(), Some(true));
        assert_eq!(ScalarValue::from("us").as_str(), Some("us"));
        assert_eq!(ScalarValue::from("us").as_int(), None);
    }

    #[test]
    fn test_binding_projection() {
        assert_eq!(
            Value::Player(PlayerId::new(2)).to_scalar(),
            Some(ScalarValue::Int(2))
        );
        assert_eq!(
            Value::Zone(ZoneId::new("deck:none")).to_scalar(),
            Some(ScalarValue::Str("deck:none".to_string()))
        );
        assert_eq!(Value::List(vec![]).to_scalar(), None);
    }

    #[test]
    fn test_attribute_projection() {
        assert_eq!(
            AttributeValue::from("highland").as_scalar(),
            Some(ScalarValue::from("highland"))
        );
        assert_eq!(
            AttributeValue::TextList(vec!["a".into()]).as_scalar(),
            None
        );
    }

    #[test]
    fn test_scalar_serialization() {
        let value = ScalarValue::Str("nva".to_string());
        let json = serde_json::to_string(&value).unwrap();
        let deserialized: ScalarValue = serde_json::from_str(&json).unwrap();
        assert_eq!(value, deserialized);
    }
}
