//! Tri-state attribute values.
//!
//! Every attribute the host hands us is either null, unknown (to be computed
//! during apply), or a known payload. On the JSON wire, null is `null`, unknown
//! is the [`UNKNOWN_VALUE`] sentinel string, and everything else is the known
//! value.
//!
//! ```
//! use multy_provider::value::{AttrValue, UNKNOWN_VALUE};
//! use serde_json::json;
//!
//! let name: AttrValue<String> = serde_json::from_value(json!("vn1")).unwrap();
//! assert_eq!(name, AttrValue::Known("vn1".to_string()));
//!
//! let id: AttrValue<String> = serde_json::from_value(json!(UNKNOWN_VALUE)).unwrap();
//! assert!(id.is_unknown());
//! ```

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

/// The sentinel the host uses for values that are not known until apply.
pub const UNKNOWN_VALUE: &str = "74D93920-ED26-11E3-AC10-0800200C9A66";

/// Returns true if the raw host value is the unknown sentinel.
pub fn is_unknown(value: &serde_json::Value) -> bool {
    matches!(value, serde_json::Value::String(s) if s == UNKNOWN_VALUE)
}

/// Returns the raw host encoding of an unknown value.
pub fn unknown() -> serde_json::Value {
    serde_json::Value::String(UNKNOWN_VALUE.to_string())
}

/// An attribute value tagged as null, unknown, or known.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AttrValue<T> {
    /// The attribute is not set.
    #[default]
    Null,
    /// The attribute will be known after apply.
    Unknown,
    /// The attribute has a concrete value.
    Known(T),
}

/// A string attribute.
pub type StringValue = AttrValue<String>;
/// A 64-bit integer attribute.
pub type Int64Value = AttrValue<i64>;
/// A boolean attribute.
pub type BoolValue = AttrValue<bool>;
/// A list attribute.
pub type ListValue<T> = AttrValue<Vec<T>>;
/// A map attribute with string keys.
pub type MapValue<T> = AttrValue<BTreeMap<String, T>>;

impl<T> AttrValue<T> {
    /// Create a known value.
    pub fn known(value: impl Into<T>) -> Self {
        Self::Known(value.into())
    }

    /// Returns true if the value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns true if the value is unknown.
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    /// Returns true if the value is neither null nor unknown.
    pub fn is_known(&self) -> bool {
        matches!(self, Self::Known(_))
    }

    /// Borrow the known payload.
    pub fn as_known(&self) -> Option<&T> {
        match self {
            Self::Known(v) => Some(v),
            _ => None,
        }
    }

    /// Take the known payload.
    pub fn into_known(self) -> Option<T> {
        match self {
            Self::Known(v) => Some(v),
            _ => None,
        }
    }

    /// Map the known payload, keeping the tri-state.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> AttrValue<U> {
        match self {
            Self::Null => AttrValue::Null,
            Self::Unknown => AttrValue::Unknown,
            Self::Known(v) => AttrValue::Known(f(v)),
        }
    }
}

impl<T: Default + Clone> AttrValue<T> {
    /// The known payload, or `T::default()` for null and unknown.
    ///
    /// This is the value sent on the remote wire, where proto3 cannot
    /// distinguish unset from zero.
    pub fn value_or_default(&self) -> T {
        self.as_known().cloned().unwrap_or_default()
    }
}

impl<T: Default + PartialEq> AttrValue<T> {
    /// Build a value from a remote field, mapping the zero value to null.
    pub fn from_non_zero(value: T) -> Self {
        if value == T::default() {
            Self::Null
        } else {
            Self::Known(value)
        }
    }

    /// Undo [`from_non_zero`](Self::from_non_zero) for a zero value that was
    /// configured explicitly: when `self` came back null and `sent` held the
    /// zero value, `self` becomes that known zero again.
    pub fn keep_zero_from(&mut self, sent: &Self) {
        if !self.is_null() {
            return;
        }
        if matches!(sent, Self::Known(v) if *v == T::default()) {
            *self = Self::Known(T::default());
        }
    }
}

impl<T> From<Option<T>> for AttrValue<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Self::Known(v),
            None => Self::Null,
        }
    }
}

impl<T: Serialize> Serialize for AttrValue<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Unknown => serializer.serialize_str(UNKNOWN_VALUE),
            Self::Known(v) => v.serialize(serializer),
        }
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for AttrValue<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        if raw.is_null() {
            return Ok(Self::Null);
        }
        if is_unknown(&raw) {
            return Ok(Self::Unknown);
        }
        serde_json::from_value(raw)
            .map(Self::Known)
            .map_err(D::Error::custom)
    }
}

/// Deserialize a nested block list, treating null as empty.
///
/// Used with `#[serde(deserialize_with = "null_as_empty")]` on `Vec` fields of
/// list nested blocks.
pub fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    if raw.is_null() || is_unknown(&raw) {
        return Ok(Vec::new());
    }
    serde_json::from_value(raw).map_err(D::Error::custom)
}

/// Serialize a nested block list, writing an empty list as null.
///
/// Pairs with [`null_as_empty`] so a block the user never wrote does not
/// show up as a change from null to `[]`.
#[allow(clippy::ptr_arg)]
pub fn empty_as_null<S, T>(items: &Vec<T>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    T: Serialize,
{
    if items.is_empty() {
        serializer.serialize_none()
    } else {
        items.serialize(serializer)
    }
}

/// Deserialize a single nested block, treating null and unknown as absent.
///
/// Used with `#[serde(deserialize_with = "block_or_none")]` on `Option` fields
/// of single nested blocks.
pub fn block_or_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    if raw.is_null() || is_unknown(&raw) {
        return Ok(None);
    }
    serde_json::from_value(raw).map(Some).map_err(D::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    struct Sample {
        name: StringValue,
        count: Int64Value,
        #[serde(deserialize_with = "null_as_empty", serialize_with = "empty_as_null")]
        rules: Vec<String>,
    }

    #[test]
    fn test_deserialize_tri_state() {
        let sample: Sample =
            serde_json::from_value(json!({"name": null, "count": UNKNOWN_VALUE})).unwrap();
        assert!(sample.name.is_null());
        assert!(sample.count.is_unknown());
        assert!(sample.rules.is_empty());

        let sample: Sample =
            serde_json::from_value(json!({"name": "a", "count": 3, "rules": ["x"]})).unwrap();
        assert_eq!(sample.name, AttrValue::Known("a".to_string()));
        assert_eq!(sample.count, AttrValue::Known(3));
        assert_eq!(sample.rules, vec!["x".to_string()]);
    }

    #[test]
    fn test_serialize_tri_state() {
        let sample = Sample {
            name: AttrValue::Unknown,
            count: AttrValue::Null,
            rules: vec![],
        };
        let value = serde_json::to_value(&sample).unwrap();
        assert_eq!(value["name"], json!(UNKNOWN_VALUE));
        assert_eq!(value["count"], json!(null));
        assert_eq!(value["rules"], json!(null));

        let sample = Sample {
            rules: vec!["a".to_string()],
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&sample).unwrap()["rules"], json!(["a"]));
    }

    #[test]
    fn test_wrong_type_is_an_error() {
        let result: Result<Int64Value, _> = serde_json::from_value(json!("not a number"));
        assert!(result.is_err());
    }

    #[test]
    fn test_null_and_zero_stay_distinct() {
        let zero: Int64Value = serde_json::from_value(json!(0)).unwrap();
        assert_eq!(zero, AttrValue::Known(0));
        assert_eq!(Int64Value::from_non_zero(0), AttrValue::Null);
        assert_eq!(Int64Value::from_non_zero(5), AttrValue::Known(5));
        assert_eq!(Int64Value::Null.value_or_default(), 0);
    }

    #[test]
    fn test_configured_zero_survives_the_reply() {
        let mut state = BoolValue::from_non_zero(false);
        state.keep_zero_from(&AttrValue::Known(false));
        assert_eq!(state, AttrValue::Known(false));

        let mut state = Int64Value::from_non_zero(0);
        state.keep_zero_from(&AttrValue::Null);
        assert!(state.is_null());

        let mut state = Int64Value::from_non_zero(0);
        state.keep_zero_from(&AttrValue::Known(2));
        assert!(state.is_null());

        let mut state = Int64Value::Known(3);
        state.keep_zero_from(&AttrValue::Known(0));
        assert_eq!(state, AttrValue::Known(3));
    }

    #[test]
    fn test_single_block_unknown_is_absent() {
        #[derive(Debug, Default, Deserialize)]
        #[serde(default)]
        struct Outer {
            #[serde(deserialize_with = "block_or_none")]
            inner: Option<Sample>,
        }

        let outer: Outer = serde_json::from_value(json!({"inner": UNKNOWN_VALUE})).unwrap();
        assert!(outer.inner.is_none());
        let outer: Outer = serde_json::from_value(json!({"inner": {"name": "x"}})).unwrap();
        assert_eq!(outer.inner.unwrap().name, AttrValue::Known("x".to_string()));
    }

    #[test]
    fn test_unknown_helpers() {
        assert!(is_unknown(&unknown()));
        assert!(!is_unknown(&json!("value")));
        assert!(!is_unknown(&json!(null)));
    }
}
