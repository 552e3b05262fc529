//! Canonical student identifiers.
//!
//! The SIS and the remote platform disagree on how a student identifier is
//! typed: the roster usually carries numbers (often float-origin, `123.0`),
//! the remote always answers with text (`"123"`). Both sides are folded into
//! one [`ExternalId`] here and nowhere else, so a join key compares equal no
//! matter which representation it arrived in.

use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Largest magnitude at which every integer is exactly representable as `f64`.
const MAX_LOSSLESS_F64: f64 = 9_007_199_254_740_992.0;

/// A canonical student identifier shared between the SIS and the remote.
///
/// Numeric forms (`123`, `123.0`, `"123"`, `" 123 "`) collapse to
/// [`ExternalId::Numeric`]; anything that does not coerce losslessly to an
/// integer stays as trimmed opaque text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExternalId {
    Numeric(i64),
    Text(String),
}

impl ExternalId {
    /// Canonicalize a textual identifier. Returns `None` for blank input.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        if let Ok(n) = trimmed.parse::<i64>() {
            return Some(Self::Numeric(n));
        }
        match trimmed.parse::<f64>() {
            Ok(f) if is_lossless_integer(f) => Some(Self::Numeric(f as i64)),
            _ => Some(Self::Text(trimmed.to_owned())),
        }
    }

    /// Canonicalize a floating-point identifier.
    pub fn from_f64(value: f64) -> Self {
        if is_lossless_integer(value) {
            Self::Numeric(value as i64)
        } else {
            Self::Text(value.to_string())
        }
    }

    /// Canonicalize an unsigned identifier; values beyond `i64` stay textual.
    pub fn from_u64(value: u64) -> Self {
        match i64::try_from(value) {
            Ok(n) => Self::Numeric(n),
            Err(_) => Self::Text(value.to_string()),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Numeric(_))
    }
}

fn is_lossless_integer(value: f64) -> bool {
    value.is_finite() && value.fract() == 0.0 && value.abs() <= MAX_LOSSLESS_F64
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(n) => n.fmt(f),
            Self::Text(s) => s.fmt(f),
        }
    }
}

impl From<i64> for ExternalId {
    fn from(n: i64) -> Self {
        Self::Numeric(n)
    }
}

/// Serialized as text, which is how the remote platform represents it.
impl Serialize for ExternalId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ExternalId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ExternalIdVisitor)
    }
}

struct ExternalIdVisitor;

impl<'de> Visitor<'de> for ExternalIdVisitor {
    type Value = ExternalId;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a non-blank student identifier (integer, float, or string)")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Ok(ExternalId::Numeric(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(ExternalId::from_u64(v))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        Ok(ExternalId::from_f64(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        ExternalId::parse(v).ok_or_else(|| E::invalid_value(de::Unexpected::Str(v), &self))
    }
}

/// Reads an identifier from the remote side, where `null`, blank text, and
/// booleans mean "no identifier" rather than a malformed page.
///
/// Use with `#[serde(default, deserialize_with = "...")]` on an
/// `Option<ExternalId>` field.
pub fn deserialize_lenient<'de, D>(deserializer: D) -> Result<Option<ExternalId>, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(LenientVisitor)
}

struct LenientVisitor;

impl<'de> Visitor<'de> for LenientVisitor {
    type Value = Option<ExternalId>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a student identifier or null")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserialize_lenient(deserializer)
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Ok(Some(ExternalId::Numeric(v)))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(Some(ExternalId::from_u64(v)))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        Ok(Some(ExternalId::from_f64(v)))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Ok(ExternalId::parse(v))
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("123", ExternalId::Numeric(123))]
    #[case(" 123 ", ExternalId::Numeric(123))]
    #[case("123.0", ExternalId::Numeric(123))]
    #[case("00123", ExternalId::Numeric(123))]
    #[case("-7", ExternalId::Numeric(-7))]
    #[case("123.5", ExternalId::Text("123.5".into()))]
    #[case("S-0042", ExternalId::Text("S-0042".into()))]
    #[case("NaN", ExternalId::Text("NaN".into()))]
    fn parse_canonicalizes(#[case] raw: &str, #[case] expected: ExternalId) {
        assert_eq!(ExternalId::parse(raw), Some(expected));
    }

    #[test]
    fn blank_is_not_an_identifier() {
        assert_eq!(ExternalId::parse(""), None);
        assert_eq!(ExternalId::parse("   "), None);
    }

    #[test]
    fn representation_skew_shares_one_key() {
        let from_text: ExternalId = serde_json::from_str(r#""123""#).unwrap();
        let from_int: ExternalId = serde_json::from_str("123").unwrap();
        let from_float: ExternalId = serde_json::from_str("123.0").unwrap();
        assert_eq!(from_text, from_int);
        assert_eq!(from_int, from_float);
    }

    #[test]
    fn float_beyond_lossless_range_stays_text() {
        let id = ExternalId::from_f64(1e20);
        assert!(!id.is_numeric());
    }

    #[test]
    fn oversized_unsigned_stays_text() {
        assert_eq!(
            ExternalId::from_u64(u64::MAX),
            ExternalId::Text(u64::MAX.to_string())
        );
    }

    #[test]
    fn serializes_as_text() {
        let json = serde_json::to_string(&ExternalId::Numeric(55)).unwrap();
        assert_eq!(json, r#""55""#);
    }

    #[test]
    fn blank_string_fails_to_deserialize() {
        assert!(serde_json::from_str::<ExternalId>(r#""  ""#).is_err());
    }

    #[derive(Deserialize)]
    struct Row {
        #[serde(default, deserialize_with = "deserialize_lenient")]
        id: Option<ExternalId>,
    }

    #[rstest]
    #[case(r#"{"id":"55"}"#, Some(ExternalId::Numeric(55)))]
    #[case(r#"{"id":55.0}"#, Some(ExternalId::Numeric(55)))]
    #[case(r#"{"id":"S-1"}"#, Some(ExternalId::Text("S-1".into())))]
    #[case(r#"{"id":"  "}"#, None)]
    #[case(r#"{"id":null}"#, None)]
    #[case(r#"{"id":false}"#, None)]
    #[case(r#"{}"#, None)]
    fn lenient_reading_maps_missing_ids_to_none(
        #[case] json: &str,
        #[case] expected: Option<ExternalId>,
    ) {
        let row: Row = serde_json::from_str(json).unwrap();
        assert_eq!(row.id, expected);
    }
}
