//! Typed attributes for protocol-buffer enums.
//!
//! The remote service speaks integer enum tags; the host speaks lowercase
//! strings such as `"aws"` or `"us_east_1"`. An [`EnumType`] is the closed
//! mapping between the two for one enum, and an [`EnumValue`] is a tri-state
//! value of that type that remembers the raw string the user wrote so the
//! validator can report exactly what was wrong.
//!
//! ```
//! use multy_provider::enums::{CloudProvider, EnumType};
//! use serde_json::json;
//!
//! let clouds = EnumType::<CloudProvider>::new();
//! let value = clouds.value_from_host(&json!("AZURE")).unwrap();
//! assert_eq!(value.get(), Some(CloudProvider::Azure));
//! assert_eq!(clouds.to_host_value(&value), json!("azure"));
//!
//! let bad = clouds.value_from_host(&json!("oracle")).unwrap();
//! assert!(clouds.validate(&bad).is_err());
//! ```

use std::fmt;
use std::marker::PhantomData;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::value::{is_unknown, unknown, AttrValue};

pub use crate::generated::resources::{
    CloudProvider, DatabaseEngine, DatabaseSize, Location, ObjectAcl, OperatingSystem,
    RouteDestination, RuleDirection, VaultAccess, VmSize,
};

/// A protocol-buffer enum with a closed set of canonical tokens.
pub trait ProtoEnum: Copy + PartialEq + Send + Sync + 'static {
    /// Every variant, including the zero variant.
    fn variants() -> &'static [Self];

    /// The canonical upper-case token, e.g. `"US_EAST_1"`.
    fn token(self) -> &'static str;

    /// The integer tag used on the wire.
    fn tag(self) -> i32;

    /// Find the variant for an integer tag.
    fn from_tag(tag: i32) -> Option<Self> {
        Self::variants().iter().copied().find(|v| v.tag() == tag)
    }

    /// Find the variant for a token, ignoring case.
    fn from_token(token: &str) -> Option<Self> {
        let upper = token.to_uppercase();
        Self::variants().iter().copied().find(|v| v.token() == upper)
    }
}

macro_rules! proto_enum {
    ($($ty:ident { $($variant:ident),+ $(,)? })+) => {
        $(
            impl ProtoEnum for $ty {
                fn variants() -> &'static [Self] {
                    &[$($ty::$variant),+]
                }

                fn token(self) -> &'static str {
                    self.as_str_name()
                }

                fn tag(self) -> i32 {
                    self as i32
                }
            }
        )+
    };
}

proto_enum! {
    CloudProvider { UnknownProvider, Aws, Azure, Gcp }
    Location {
        UnknownLocation, EuWest1, EuWest2, EuWest3, UsEast1, UsEast2, UsWest1, UsWest2, EuNorth1,
    }
    VmSize {
        UnknownVmSize, GeneralNano, GeneralMicro, GeneralSmall, GeneralMedium, GeneralLarge,
        GeneralXlarge, ComputeLarge, MemoryLarge,
    }
    OperatingSystem { UnknownOs, CentOs, Ubuntu, Debian }
    DatabaseEngine { UnknownEngine, Mysql, Postgres, Mariadb }
    DatabaseSize { UnknownDatabaseSize, Micro, Small, Medium }
    RouteDestination { UnknownDestination, Internet }
    ObjectAcl { Private, PublicRead }
    VaultAccess { UnknownAccess, Read, Write, Owner }
    RuleDirection { Both, Ingress, Egress }
}

/// The known payload of an [`EnumValue`].
#[derive(Debug, Clone)]
struct Parsed {
    tag: i32,
    raw: Option<String>,
}

/// A tri-state value of a protocol enum.
///
/// Known values carry the integer tag and, when they came from the host, the
/// original string. Equality compares canonical tokens, so `"AWS"` and `"aws"`
/// are the same value.
pub struct EnumValue<T> {
    state: AttrValue<Parsed>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: ProtoEnum> EnumValue<T> {
    fn from_state(state: AttrValue<Parsed>) -> Self {
        Self {
            state,
            _marker: PhantomData,
        }
    }

    /// A null value.
    pub fn null() -> Self {
        Self::from_state(AttrValue::Null)
    }

    /// An unknown value.
    pub fn unknown() -> Self {
        Self::from_state(AttrValue::Unknown)
    }

    /// A known value from an integer tag.
    pub fn from_tag(tag: i32) -> Self {
        Self::from_state(AttrValue::Known(Parsed { tag, raw: None }))
    }

    /// A known value from a variant.
    pub fn of(variant: T) -> Self {
        Self::from_tag(variant.tag())
    }

    /// Parse a host string: up-case it, look up the tag (zero on a miss) and
    /// keep the original for validation.
    pub fn parse(raw: &str) -> Self {
        let tag = T::from_token(raw).map(ProtoEnum::tag).unwrap_or(0);
        Self::from_state(AttrValue::Known(Parsed {
            tag,
            raw: Some(raw.to_string()),
        }))
    }

    /// Returns true if the value is null.
    pub fn is_null(&self) -> bool {
        self.state.is_null()
    }

    /// Returns true if the value is unknown.
    pub fn is_unknown(&self) -> bool {
        self.state.is_unknown()
    }

    /// Returns true if the value is known.
    pub fn is_known(&self) -> bool {
        self.state.is_known()
    }

    /// The integer tag, zero for null and unknown.
    pub fn tag(&self) -> i32 {
        self.state.as_known().map(|p| p.tag).unwrap_or(0)
    }

    /// The variant, if the value is known and its tag is defined.
    pub fn get(&self) -> Option<T> {
        self.state.as_known().and_then(|p| T::from_tag(p.tag))
    }

    /// The raw string the host sent, if any.
    pub fn raw(&self) -> Option<&str> {
        self.state.as_known().and_then(|p| p.raw.as_deref())
    }

    /// The canonical upper-case token of a known value.
    fn canonical(&self) -> Option<String> {
        let parsed = self.state.as_known()?;
        match (&parsed.raw, T::from_tag(parsed.tag)) {
            (Some(raw), _) => Some(raw.to_uppercase()),
            (None, Some(variant)) => Some(variant.token().to_string()),
            (None, None) => Some(parsed.tag.to_string()),
        }
    }

    /// Encode this value for the host.
    pub fn to_host(&self) -> serde_json::Value {
        match &self.state {
            AttrValue::Null => serde_json::Value::Null,
            AttrValue::Unknown => unknown(),
            AttrValue::Known(parsed) => {
                if let Some(raw) = &parsed.raw {
                    if T::from_token(raw).is_none() {
                        return serde_json::Value::String(raw.clone());
                    }
                }
                match T::from_tag(parsed.tag) {
                    Some(variant) => serde_json::Value::String(variant.token().to_lowercase()),
                    None => serde_json::Value::Null,
                }
            }
        }
    }
}

impl<T: ProtoEnum> EnumValue<T> {
    /// Build a value from a remote tag, mapping zero to null unless zero is
    /// a legitimate value of the enum.
    pub fn from_remote(tag: i32, enum_type: &EnumType<T>) -> Self {
        if tag == 0 && !enum_type.allows_zero() {
            Self::null()
        } else {
            Self::from_tag(tag)
        }
    }
}

impl<T> Clone for EnumValue<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: ProtoEnum> Default for EnumValue<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T: ProtoEnum> PartialEq for EnumValue<T> {
    fn eq(&self, other: &Self) -> bool {
        match (&self.state, &other.state) {
            (AttrValue::Null, AttrValue::Null) => true,
            (AttrValue::Unknown, AttrValue::Unknown) => true,
            (AttrValue::Known(_), AttrValue::Known(_)) => self.canonical() == other.canonical(),
            _ => false,
        }
    }
}

impl<T: ProtoEnum> fmt::Debug for EnumValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            AttrValue::Null => write!(f, "EnumValue(null)"),
            AttrValue::Unknown => write!(f, "EnumValue(unknown)"),
            AttrValue::Known(_) => write!(
                f,
                "EnumValue({})",
                self.canonical().unwrap_or_default().to_lowercase()
            ),
        }
    }
}

impl<T: ProtoEnum> Serialize for EnumValue<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_host().serialize(serializer)
    }
}

impl<'de, T: ProtoEnum> Deserialize<'de> for EnumValue<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        value_from_json(&raw).map_err(D::Error::custom)
    }
}

fn value_from_json<T: ProtoEnum>(raw: &serde_json::Value) -> Result<EnumValue<T>, String> {
    match raw {
        serde_json::Value::Null => Ok(EnumValue::null()),
        v if is_unknown(v) => Ok(EnumValue::unknown()),
        serde_json::Value::String(s) => Ok(EnumValue::parse(s)),
        other => Err(format!("expected a string, got {}", other)),
    }
}

/// The attribute type of a protocol enum.
///
/// `allow_zero_as_value` decides whether tag zero is a real value (e.g.
/// `private` for object ACLs) or the "unset" sentinel.
pub struct EnumType<T> {
    allow_zero_as_value: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for EnumType<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for EnumType<T> {}

impl<T> fmt::Debug for EnumType<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnumType")
            .field("enum", &std::any::type_name::<T>())
            .field("allow_zero_as_value", &self.allow_zero_as_value)
            .finish()
    }
}

impl<T: ProtoEnum> Default for EnumType<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ProtoEnum> EnumType<T> {
    /// An enum type where tag zero means "unset".
    pub const fn new() -> Self {
        Self {
            allow_zero_as_value: false,
            _marker: PhantomData,
        }
    }

    /// An enum type where tag zero is a legitimate value.
    pub const fn allowing_zero() -> Self {
        Self {
            allow_zero_as_value: true,
            _marker: PhantomData,
        }
    }

    /// Whether tag zero is a legitimate value.
    pub fn allows_zero(&self) -> bool {
        self.allow_zero_as_value
    }

    /// A known value from the integer form.
    pub fn new_val(&self, tag: i32) -> EnumValue<T> {
        EnumValue::from_tag(tag)
    }

    /// A known zero value with no raw string.
    pub fn zero_val(&self) -> EnumValue<T> {
        EnumValue::from_tag(0)
    }

    /// Decode a host value, propagating null and unknown.
    pub fn value_from_host(&self, raw: &serde_json::Value) -> Result<EnumValue<T>, String> {
        value_from_json(raw)
    }

    /// Encode a value for the host.
    pub fn to_host_value(&self, value: &EnumValue<T>) -> serde_json::Value {
        value.to_host()
    }

    /// The lowercase tokens accepted by this type, in tag order.
    pub fn allowed_tokens(&self) -> Vec<String> {
        let mut variants: Vec<T> = T::variants()
            .iter()
            .copied()
            .filter(|v| self.allow_zero_as_value || v.tag() != 0)
            .collect();
        variants.sort_by_key(|v| v.tag());
        variants
            .into_iter()
            .map(|v| v.token().to_lowercase())
            .collect()
    }

    /// Check that a known value is one of the allowed tokens.
    pub fn validate(&self, value: &EnumValue<T>) -> Result<(), String> {
        let parsed = match &value.state {
            AttrValue::Known(parsed) => parsed,
            _ => return Ok(()),
        };

        if let Some(raw) = &parsed.raw {
            if T::from_token(raw).is_none() {
                return Err(self.not_defined(raw));
            }
        }

        if parsed.tag == 0 && !self.allow_zero_as_value {
            let shown = parsed.raw.clone().unwrap_or_else(|| "0".to_string());
            return Err(self.not_defined(&shown));
        }

        Ok(())
    }

    fn not_defined(&self, shown: &str) -> String {
        format!(
            "value {:?} is not defined, must be one of [{}]",
            shown,
            self.allowed_tokens().join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_every_canonical_token_round_trips() {
        let locations = EnumType::<Location>::new();
        for variant in Location::variants().iter().filter(|v| v.tag() != 0) {
            let upper = locations
                .value_from_host(&json!(variant.token()))
                .unwrap();
            assert!(locations.validate(&upper).is_ok(), "{}", variant.token());

            let lower = variant.token().to_lowercase();
            let value = locations.value_from_host(&json!(lower)).unwrap();
            assert_eq!(locations.to_host_value(&value), json!(lower));
            assert_eq!(value.get(), Some(*variant));
        }
    }

    #[test]
    fn test_unknown_token_is_rejected_with_allowed_set() {
        let clouds = EnumType::<CloudProvider>::new();
        let value = clouds.value_from_host(&json!("oracle")).unwrap();
        assert_eq!(value.tag(), 0);
        assert_eq!(value.raw(), Some("oracle"));

        let err = clouds.validate(&value).unwrap_err();
        assert_eq!(
            err,
            "value \"oracle\" is not defined, must be one of [aws, azure, gcp]"
        );
    }

    #[test]
    fn test_zero_sentinel() {
        let clouds = EnumType::<CloudProvider>::new();
        assert!(clouds.validate(&clouds.zero_val()).is_err());
        assert_eq!(clouds.new_val(2).get(), Some(CloudProvider::Azure));
        assert!(clouds.validate(&clouds.new_val(2)).is_ok());
        let unset = clouds.value_from_host(&json!("unknown_provider")).unwrap();
        assert!(clouds.validate(&unset).is_err());

        let acls = EnumType::<ObjectAcl>::allowing_zero();
        assert!(acls.validate(&acls.zero_val()).is_ok());
        assert_eq!(acls.to_host_value(&acls.zero_val()), json!("private"));
        assert_eq!(acls.allowed_tokens(), vec!["private", "public_read"]);
    }

    #[test]
    fn test_null_and_unknown_pass_validation() {
        let sizes = EnumType::<VmSize>::new();
        let null = sizes.value_from_host(&json!(null)).unwrap();
        let unknown = sizes
            .value_from_host(&json!(crate::value::UNKNOWN_VALUE))
            .unwrap();
        assert!(null.is_null());
        assert!(unknown.is_unknown());
        assert!(sizes.validate(&null).is_ok());
        assert!(sizes.validate(&unknown).is_ok());
        assert_eq!(sizes.to_host_value(&null), json!(null));
    }

    #[test]
    fn test_non_string_host_value_is_an_error() {
        let sizes = EnumType::<VmSize>::new();
        assert!(sizes.value_from_host(&json!(3)).is_err());
    }

    #[test]
    fn test_equality_uses_canonical_tokens() {
        let upper = EnumValue::<CloudProvider>::parse("AWS");
        let lower = EnumValue::<CloudProvider>::parse("aws");
        let tagged = EnumValue::of(CloudProvider::Aws);
        assert_eq!(upper, lower);
        assert_eq!(lower, tagged);
        assert_ne!(tagged, EnumValue::of(CloudProvider::Gcp));
        assert_ne!(EnumValue::<CloudProvider>::null(), EnumValue::unknown());
        assert_ne!(EnumValue::<CloudProvider>::null(), tagged);
    }

    #[test]
    fn test_from_remote_collapses_zero() {
        let engines = EnumType::<DatabaseEngine>::new();
        assert!(EnumValue::from_remote(0, &engines).is_null());
        assert_eq!(
            EnumValue::from_remote(1, &engines).get(),
            Some(DatabaseEngine::Mysql)
        );

        let directions = EnumType::<RuleDirection>::allowing_zero();
        assert_eq!(
            EnumValue::from_remote(0, &directions).get(),
            Some(RuleDirection::Both)
        );
    }

    #[test]
    fn test_serde_round_trip_through_record() {
        #[derive(Serialize, Deserialize, Default)]
        #[serde(default)]
        struct Holder {
            cloud: EnumValue<CloudProvider>,
        }

        let holder: Holder = serde_json::from_value(json!({"cloud": "GCP"})).unwrap();
        assert_eq!(holder.cloud.get(), Some(CloudProvider::Gcp));
        assert_eq!(serde_json::to_value(&holder).unwrap(), json!({"cloud": "gcp"}));

        let holder: Holder = serde_json::from_value(json!({})).unwrap();
        assert!(holder.cloud.is_null());
    }
}
