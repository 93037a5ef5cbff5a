//! Attribute validators.
//!
//! Validators run against the raw JSON value of a single attribute during
//! configuration validation. Null and unknown values always pass; a missing
//! required attribute is reported by the structural pass in
//! [`crate::validation`].

use std::fmt;
use std::marker::PhantomData;
use std::net::IpAddr;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::enums::{EnumType, EnumValue, ProtoEnum};
use crate::schema::Diagnostic;
use crate::value::is_unknown;

/// A check over one attribute's configured value.
pub trait AttributeValidator: Send + Sync + fmt::Debug {
    /// Human-readable description used in documentation.
    fn description(&self) -> String;

    /// Validate the value found at `path`. Returns a diagnostic on failure.
    fn validate(&self, path: &str, value: &Value) -> Option<Diagnostic>;
}

fn is_absent(value: &Value) -> bool {
    value.is_null() || is_unknown(value)
}

fn invalid(path: &str, detail: impl Into<String>) -> Diagnostic {
    Diagnostic::error(format!("Invalid value for attribute '{}'", path))
        .with_detail(detail)
        .with_attribute(path)
}

/// Parse an IPv4 or IPv6 network in `address/prefix` notation.
pub fn parse_cidr(cidr: &str) -> Result<(IpAddr, u8), String> {
    let (ip, prefix) = cidr
        .split_once('/')
        .ok_or_else(|| format!("invalid CIDR '{}': expected address/prefix", cidr))?;

    let ip: IpAddr = ip
        .parse()
        .map_err(|_| format!("invalid CIDR '{}': '{}' is not an IP address", cidr, ip))?;

    let max = if ip.is_ipv4() { 32 } else { 128 };
    let canonical = !prefix.is_empty()
        && prefix.bytes().all(|b| b.is_ascii_digit())
        && (prefix == "0" || !prefix.starts_with('0'));
    let prefix: u8 = Some(prefix)
        .filter(|_| canonical)
        .and_then(|p| p.parse().ok())
        .filter(|p| *p <= max)
        .ok_or_else(|| format!("invalid CIDR '{}': prefix must be between 0 and {}", cidr, max))?;

    Ok((ip, prefix))
}

/// Accepts strings in CIDR notation.
#[derive(Debug, Clone, Copy, Default)]
pub struct Cidr;

impl AttributeValidator for Cidr {
    fn description(&self) -> String {
        "value must be a valid CIDR block".to_string()
    }

    fn validate(&self, path: &str, value: &Value) -> Option<Diagnostic> {
        if is_absent(value) {
            return None;
        }
        match value.as_str() {
            Some(s) => parse_cidr(s).err().map(|e| invalid(path, e)),
            None => Some(invalid(path, "expected a string")),
        }
    }
}

/// Accepts numbers, or lists of numbers, within `min..=max`.
#[derive(Debug, Clone, Copy)]
pub struct InRange {
    min: i64,
    max: i64,
}

impl InRange {
    /// Accept values in `min..=max`.
    pub const fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    /// The range of a protobuf `int32` field.
    pub const fn int32() -> Self {
        Self::new(i32::MIN as i64, i32::MAX as i64)
    }
}

impl AttributeValidator for InRange {
    fn description(&self) -> String {
        format!("value must be between {} and {}", self.min, self.max)
    }

    fn validate(&self, path: &str, value: &Value) -> Option<Diagnostic> {
        if is_absent(value) {
            return None;
        }
        if let Value::Array(items) = value {
            return items
                .iter()
                .enumerate()
                .find_map(|(i, item)| self.validate(&format!("{}.{}", path, i), item));
        }
        let Some(n) = value.as_f64() else {
            return Some(invalid(path, "expected a number"));
        };
        if n < self.min as f64 || n > self.max as f64 {
            return Some(invalid(
                path,
                format!("value {} must be between {} and {}", value, self.min, self.max),
            ));
        }
        None
    }
}

/// Accepts strings that are exactly one of a fixed set.
#[derive(Debug, Clone)]
pub struct OneOf {
    values: Vec<String>,
}

impl OneOf {
    /// Build a membership validator.
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

impl AttributeValidator for OneOf {
    fn description(&self) -> String {
        format!("value must be one of [{}]", self.values.join(", "))
    }

    fn validate(&self, path: &str, value: &Value) -> Option<Diagnostic> {
        if is_absent(value) {
            return None;
        }
        match value.as_str() {
            Some(s) if self.values.iter().any(|v| v == s) => None,
            Some(s) => Some(invalid(
                path,
                format!("value {:?} must be one of [{}]", s, self.values.join(", ")),
            )),
            None => Some(invalid(path, "expected a string")),
        }
    }
}

/// Rejects the zero value of `T` (empty string, zero integer).
pub struct NonEmpty<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> NonEmpty<T> {
    /// Build a non-empty validator.
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for NonEmpty<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for NonEmpty<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NonEmpty<{}>", std::any::type_name::<T>())
    }
}

impl<T> AttributeValidator for NonEmpty<T>
where
    T: DeserializeOwned + Default + PartialEq + 'static,
{
    fn description(&self) -> String {
        "value must not be empty".to_string()
    }

    fn validate(&self, path: &str, value: &Value) -> Option<Diagnostic> {
        if is_absent(value) {
            return None;
        }
        match serde_json::from_value::<T>(value.clone()) {
            Ok(v) if v == T::default() => Some(invalid(path, "value must not be empty")),
            Ok(_) => None,
            Err(e) => Some(invalid(path, e.to_string())),
        }
    }
}

/// Runs [`EnumType::validate`] on the decoded value.
pub struct EnumValidator<T> {
    enum_type: EnumType<T>,
}

impl<T: ProtoEnum> EnumValidator<T> {
    /// Validate against the given enum type.
    pub fn new(enum_type: EnumType<T>) -> Self {
        Self { enum_type }
    }
}

impl<T> fmt::Debug for EnumValidator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnumValidator")
            .field("enum_type", &self.enum_type)
            .finish()
    }
}

impl<T: ProtoEnum> AttributeValidator for EnumValidator<T> {
    fn description(&self) -> String {
        format!(
            "value must be one of [{}]",
            self.enum_type.allowed_tokens().join(", ")
        )
    }

    fn validate(&self, path: &str, value: &Value) -> Option<Diagnostic> {
        let decoded: EnumValue<T> = match self.enum_type.value_from_host(value) {
            Ok(v) => v,
            Err(e) => return Some(invalid(path, e)),
        };
        self.enum_type
            .validate(&decoded)
            .err()
            .map(|e| invalid(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::{CloudProvider, ObjectAcl};
    use crate::value::UNKNOWN_VALUE;
    use serde_json::json;

    #[test]
    fn test_cidr() {
        assert!(Cidr.validate("cidr_block", &json!("10.0.0.0/16")).is_none());
        assert!(Cidr.validate("cidr_block", &json!("::/0")).is_none());
        assert!(Cidr.validate("cidr_block", &json!("2001:db8::/32")).is_none());
        assert!(Cidr.validate("cidr_block", &json!(null)).is_none());
        assert!(Cidr.validate("cidr_block", &json!(UNKNOWN_VALUE)).is_none());

        let diag = Cidr.validate("cidr_block", &json!("10.0.0.0")).unwrap();
        assert_eq!(diag.attribute, Some("cidr_block".to_string()));
        assert!(Cidr.validate("cidr_block", &json!("")).is_some());
        assert!(Cidr.validate("cidr_block", &json!("10.0.0.0/33")).is_some());
        assert!(Cidr.validate("cidr_block", &json!("::/129")).is_some());
        assert!(Cidr.validate("cidr_block", &json!("10.0.0.256/16")).is_some());
    }

    #[test]
    fn test_cidr_prefix_must_be_plain_digits() {
        assert_eq!(parse_cidr("0.0.0.0/0").unwrap().1, 0);
        assert_eq!(parse_cidr("10.0.0.0/8").unwrap().1, 8);
        assert!(parse_cidr("10.0.0.0/+8").is_err());
        assert!(parse_cidr("10.0.0.0/016").is_err());
        assert!(parse_cidr("10.0.0.0/00").is_err());
        assert!(parse_cidr("10.0.0.0/").is_err());
        assert!(parse_cidr("10.0.0.0/ 8").is_err());
        assert!(Cidr.validate("cidr_block", &json!("10.0.0.0/+8")).is_some());
    }

    #[test]
    fn test_int32_range() {
        let v = InRange::int32();
        assert!(v.validate("from_port", &json!(80)).is_none());
        assert!(v.validate("from_port", &json!(-1)).is_none());
        assert!(v.validate("from_port", &json!(2147483647)).is_none());
        assert!(v.validate("from_port", &json!(null)).is_none());

        let diag = v.validate("from_port", &json!(2147483648i64)).unwrap();
        assert_eq!(diag.attribute.as_deref(), Some("from_port"));
        assert!(v.validate("from_port", &json!(-2147483649i64)).is_some());

        let diag = v.validate("availability_zones", &json!([1, 4294967296i64])).unwrap();
        assert_eq!(diag.attribute.as_deref(), Some("availability_zones.1"));
        assert!(v.validate("availability_zones", &json!([1, 2])).is_none());
    }

    #[test]
    fn test_one_of_is_case_sensitive() {
        let v = OneOf::new(["tcp", "udp", "icmp"]);
        assert!(v.validate("rule.0.protocol", &json!("tcp")).is_none());
        assert!(v.validate("rule.0.protocol", &json!("TCP")).is_some());
        assert!(v.validate("rule.0.protocol", &json!("sctp")).is_some());
        assert!(v.validate("rule.0.protocol", &json!(null)).is_none());
    }

    #[test]
    fn test_non_empty() {
        let strings = NonEmpty::<String>::new();
        assert!(strings.validate("name", &json!("")).is_some());
        assert!(strings.validate("name", &json!("vn")).is_none());

        let ints = NonEmpty::<i64>::new();
        assert!(ints.validate("storage_gb", &json!(0)).is_some());
        assert!(ints.validate("storage_gb", &json!(10)).is_none());
        assert!(ints.validate("storage_gb", &json!(UNKNOWN_VALUE)).is_none());
    }

    #[test]
    fn test_enum_validator() {
        let v = EnumValidator::new(EnumType::<CloudProvider>::new());
        assert!(v.validate("cloud", &json!("aws")).is_none());
        assert!(v.validate("cloud", &json!("AZURE")).is_none());

        let diag = v.validate("cloud", &json!("oracle")).unwrap();
        let detail = diag.detail.unwrap();
        assert!(detail.contains("is not defined"), "{}", detail);
        assert!(detail.contains("[aws, azure, gcp]"), "{}", detail);

        let acl = EnumValidator::new(EnumType::<ObjectAcl>::allowing_zero());
        assert!(acl.validate("acl", &json!("private")).is_none());
    }
}
