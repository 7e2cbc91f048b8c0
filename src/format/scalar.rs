use std::net::IpAddr;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat};
use once_cell::sync::Lazy;
use ordered_float::OrderedFloat;
use regex::Regex;
use serde_json::Value;

use crate::error::ViolationKind;
use crate::schema::PrimitiveType;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)+$").unwrap());
static NAME_EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*([^<>]*?)\s*<([^<>]+)>\s*$").unwrap());
static URI_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:[^\s]+$").unwrap());
static UUID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$").unwrap()
});
static BASE64_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[A-Za-z0-9+/]{4})*(?:[A-Za-z0-9+/]{2}==|[A-Za-z0-9+/]{3}=)?$").unwrap());

/// Concrete scalar implementation a `(type, format)` pair resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Boolean,
    Integer,
    Float,
    /// Seconds as a number.
    TimeDelta,
    Text,
    Password,
    Binary,
    /// Base64 payload.
    Byte,
    Date,
    DateTime,
    Time,
    Email,
    NameEmail,
    Uri,
    Uuid,
    Ipv4,
    Ipv6,
    IpAny,
    Ipv4Network,
    Ipv6Network,
    IpAnyNetwork,
    Regex,
    Path,
}

/// How a date-time or time spelled its zone; re-encoding uses the same form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    /// Numeric offset, `+02:00` or `+00:00`.
    Offset,
    /// `Z` suffix.
    Zulu,
    /// No zone at all; read as UTC.
    Floating,
}

/// A decoded scalar value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Bool(bool),
    /// Also produced by number fields given an integer literal.
    Integer(i64),
    Number(OrderedFloat<f64>),
    Text(String),
    Date(NaiveDate),
    DateTime(DateTime<FixedOffset>, Zone),
    Time(NaiveTime, Zone),
    Ip(IpAddr),
}

impl ScalarType {
    /// Human name used in diagnostics and the emitted model view.
    pub fn name(self) -> &'static str {
        match self {
            Self::Boolean => "bool",
            Self::Integer => "int",
            Self::Float => "float",
            Self::TimeDelta => "timedelta",
            Self::Text => "str",
            Self::Password => "password",
            Self::Binary => "binary",
            Self::Byte => "base64 bytes",
            Self::Date => "date",
            Self::DateTime => "datetime",
            Self::Time => "time",
            Self::Email => "email",
            Self::NameEmail => "name-email",
            Self::Uri => "uri",
            Self::Uuid => "uuid",
            Self::Ipv4 => "ipv4 address",
            Self::Ipv6 => "ipv6 address",
            Self::IpAny => "ip address",
            Self::Ipv4Network => "ipv4 network",
            Self::Ipv6Network => "ipv6 network",
            Self::IpAnyNetwork => "ip network",
            Self::Regex => "regex",
            Self::Path => "path",
        }
    }

    pub fn primitive(self) -> PrimitiveType {
        match self {
            Self::Boolean => PrimitiveType::Boolean,
            Self::Integer => PrimitiveType::Integer,
            Self::Float | Self::TimeDelta => PrimitiveType::Number,
            _ => PrimitiveType::String,
        }
    }

    /// Check a JSON value and decode it into a typed scalar.
    pub fn decode(self, value: &Value) -> Result<Scalar, ViolationKind> {
        match self {
            Self::Boolean => match value {
                Value::Bool(b) => Ok(Scalar::Bool(*b)),
                other => Err(self.wrong_type(other)),
            },
            Self::Integer => match value {
                Value::Number(n) => match n.as_i64() {
                    Some(i) => Ok(Scalar::Integer(i)),
                    None if n.is_u64() => Err(self.invalid("out of range for a 64-bit integer")),
                    None => Err(self.invalid(format!("integer literal required, found {n}"))),
                },
                other => Err(self.wrong_type(other)),
            },
            Self::Float | Self::TimeDelta => match value {
                Value::Number(n) => match (n.as_i64(), n.as_f64()) {
                    (Some(i), _) => Ok(Scalar::Integer(i)),
                    (None, Some(f)) => Ok(Scalar::Number(OrderedFloat(f))),
                    (None, None) => Err(self.invalid(format!("{n} is not representable"))),
                },
                other => Err(self.wrong_type(other)),
            },
            _ => {
                let Value::String(s) = value else {
                    return Err(self.wrong_type(value));
                };
                self.decode_str(s)
            }
        }
    }

    fn decode_str(self, s: &str) -> Result<Scalar, ViolationKind> {
        let text = || Scalar::Text(s.to_string());
        match self {
            Self::Text | Self::Password | Self::Binary | Self::Path => Ok(text()),
            Self::Byte => BASE64_RE.is_match(s).then(text).ok_or_else(|| self.invalid("not base64")),
            Self::Email => EMAIL_RE.is_match(s).then(text).ok_or_else(|| self.invalid("not an email address")),
            Self::NameEmail => {
                let address = NAME_EMAIL_RE
                    .captures(s)
                    .and_then(|c| c.get(2))
                    .map(|m| m.as_str())
                    .unwrap_or(s);
                EMAIL_RE.is_match(address).then(text).ok_or_else(|| self.invalid("not a name/email pair"))
            }
            Self::Uri => URI_RE.is_match(s).then(text).ok_or_else(|| self.invalid("not an absolute uri")),
            Self::Uuid => UUID_RE.is_match(s).then(text).ok_or_else(|| self.invalid("not a uuid")),
            Self::Date => NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map(Scalar::Date)
                .map_err(|e| self.invalid(e.to_string())),
            Self::DateTime => parse_date_time(s).map(|(dt, zone)| Scalar::DateTime(dt, zone)).map_err(|e| self.invalid(e)),
            Self::Time => parse_time(s).map(|(t, zone)| Scalar::Time(t, zone)).map_err(|e| self.invalid(e)),
            Self::Ipv4 | Self::Ipv6 | Self::IpAny => {
                let ip: IpAddr = s.parse().map_err(|_| self.invalid("not an ip address"))?;
                match (self, ip) {
                    (Self::Ipv4, IpAddr::V6(_)) => Err(self.invalid("expected an ipv4 address")),
                    (Self::Ipv6, IpAddr::V4(_)) => Err(self.invalid("expected an ipv6 address")),
                    _ => Ok(Scalar::Ip(ip)),
                }
            }
            Self::Ipv4Network | Self::Ipv6Network | Self::IpAnyNetwork => {
                parse_network(self, s).map(|_| text()).map_err(|e| self.invalid(e))
            }
            Self::Regex => Regex::new(s).map(|_| text()).map_err(|e| self.invalid(e.to_string())),
            Self::Boolean | Self::Integer | Self::Float | Self::TimeDelta => Err(self.wrong_type(&Value::String(s.into()))),
        }
    }

    fn wrong_type(self, found: &Value) -> ViolationKind {
        ViolationKind::WrongType { expected: self.name().to_string(), found: json_kind(found) }
    }

    fn invalid(self, reason: impl Into<String>) -> ViolationKind {
        ViolationKind::InvalidFormat { expected: self.name().to_string(), reason: reason.into() }
    }
}

impl Scalar {
    pub fn to_json(&self) -> Value {
        match self {
            Scalar::Bool(b) => Value::Bool(*b),
            Scalar::Integer(i) => Value::from(*i),
            Scalar::Number(f) => Value::from(f.0),
            Scalar::Text(s) => Value::String(s.clone()),
            Scalar::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
            Scalar::DateTime(dt, zone) => Value::String(match zone {
                Zone::Offset => dt.to_rfc3339_opts(SecondsFormat::AutoSi, false),
                Zone::Zulu => dt.to_rfc3339_opts(SecondsFormat::AutoSi, true),
                Zone::Floating => dt.naive_local().format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
            }),
            Scalar::Time(t, zone) => {
                let mut text = t.format("%H:%M:%S%.f").to_string();
                if *zone == Zone::Zulu {
                    text.push('Z');
                }
                Value::String(text)
            }
            Scalar::Ip(ip) => Value::String(ip.to_string()),
        }
    }
}

/// JSON kind name for diagnostics.
pub fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ------------------------------- Parsing ---------------------------------- //

// RFC 3339 first; a zone-less timestamp is read as UTC.
fn parse_date_time(s: &str) -> Result<(DateTime<FixedOffset>, Zone), String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        let zone = if s.ends_with(['Z', 'z']) { Zone::Zulu } else { Zone::Offset };
        return Ok((dt, zone));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| (naive.and_utc().fixed_offset(), Zone::Floating))
        .map_err(|e| e.to_string())
}

fn parse_time(s: &str) -> Result<(NaiveTime, Zone), String> {
    let (s, zone) = match s.strip_suffix('Z') {
        Some(rest) => (rest, Zone::Zulu),
        None => (s, Zone::Floating),
    };
    NaiveTime::parse_from_str(s, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .map(|t| (t, zone))
        .map_err(|e| e.to_string())
}

fn parse_network(ty: ScalarType, s: &str) -> Result<(), String> {
    let (addr, prefix) = s.split_once('/').unwrap_or((s, ""));
    let ip: IpAddr = addr.parse().map_err(|_| format!("`{addr}` is not an ip address"))?;
    let max = match (ty, ip) {
        (ScalarType::Ipv4Network, IpAddr::V6(_)) => return Err("expected an ipv4 network".into()),
        (ScalarType::Ipv6Network, IpAddr::V4(_)) => return Err("expected an ipv6 network".into()),
        (_, IpAddr::V4(_)) => 32,
        (_, IpAddr::V6(_)) => 128,
    };
    if prefix.is_empty() {
        return Ok(());
    }
    match prefix.parse::<u8>() {
        Ok(p) if p <= max => Ok(()),
        _ => Err(format!("prefix `/{prefix}` out of range")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn integer_rejects_fractions_and_strings() {
        assert_eq!(ScalarType::Integer.decode(&json!(7)), Ok(Scalar::Integer(7)));
        assert!(matches!(ScalarType::Integer.decode(&json!(1.5)), Err(ViolationKind::InvalidFormat { .. })));
        assert!(matches!(ScalarType::Integer.decode(&json!("7")), Err(ViolationKind::WrongType { found: "string", .. })));
    }

    #[test]
    fn float_accepts_integers() {
        assert_eq!(ScalarType::Float.decode(&json!(2.5)), Ok(Scalar::Number(OrderedFloat(2.5))));
        assert!(ScalarType::Float.decode(&json!(true)).is_err());
    }

    #[test]
    fn integer_literals_in_number_fields_keep_their_spelling() {
        let three = ScalarType::Float.decode(&json!(3)).unwrap();
        assert_eq!(three, Scalar::Integer(3));
        assert_eq!(three.to_json(), json!(3));
        assert_eq!(ScalarType::TimeDelta.decode(&json!(60)).unwrap().to_json(), json!(60));
        assert_eq!(ScalarType::Float.decode(&json!(3.0)).unwrap().to_json(), json!(3.0));
    }

    #[test]
    fn integer_message_asks_for_a_literal() {
        let Err(ViolationKind::InvalidFormat { reason, .. }) = ScalarType::Integer.decode(&json!(1.0)) else {
            panic!("1.0 is not an integer literal");
        };
        assert!(reason.starts_with("integer literal required"), "{reason}");
    }

    #[test]
    fn date_time_round_trips_rfc3339() {
        let v = ScalarType::DateTime.decode(&json!("2024-02-29T10:30:00+02:00")).unwrap();
        assert_eq!(v.to_json(), json!("2024-02-29T10:30:00+02:00"));
        let utc = ScalarType::DateTime.decode(&json!("2024-02-29T10:30:00+00:00")).unwrap();
        assert_eq!(utc.to_json(), json!("2024-02-29T10:30:00+00:00"));
        let zulu = ScalarType::DateTime.decode(&json!("2024-01-02T03:04:05Z")).unwrap();
        assert_eq!(zulu.to_json(), json!("2024-01-02T03:04:05Z"));
        let naive = ScalarType::DateTime.decode(&json!("2024-02-29T10:30:00")).unwrap();
        assert!(matches!(naive, Scalar::DateTime(_, Zone::Floating)));
        assert_eq!(naive.to_json(), json!("2024-02-29T10:30:00"));
        assert!(ScalarType::DateTime.decode(&json!("yesterday")).is_err());
    }

    #[test]
    fn date_and_time_formats() {
        assert!(ScalarType::Date.decode(&json!("2023-12-01")).is_ok());
        assert!(ScalarType::Date.decode(&json!("2023-13-01")).is_err());
        assert!(ScalarType::Time.decode(&json!("08:15")).is_ok());
    }

    #[test]
    fn time_keeps_its_zone_suffix() {
        assert_eq!(ScalarType::Time.decode(&json!("23:59:01Z")).unwrap().to_json(), json!("23:59:01Z"));
        assert_eq!(ScalarType::Time.decode(&json!("23:59:01")).unwrap().to_json(), json!("23:59:01"));
    }

    #[test]
    fn string_formats_check_shape() {
        assert!(ScalarType::Email.decode(&json!("bozo@clown.com")).is_ok());
        assert!(ScalarType::Email.decode(&json!("bozo")).is_err());
        assert!(ScalarType::NameEmail.decode(&json!("Bozo Smith <bozo@clown.com>")).is_ok());
        assert!(ScalarType::Uri.decode(&json!("http://fido.jpg")).is_ok());
        assert!(ScalarType::Uri.decode(&json!("fido.jpg")).is_err());
        assert!(ScalarType::Uuid.decode(&json!("123e4567-e89b-12d3-a456-426614174000")).is_ok());
        assert!(ScalarType::Byte.decode(&json!("aGVsbG8=")).is_ok());
        assert!(ScalarType::Byte.decode(&json!("not base64!")).is_err());
        assert!(ScalarType::Regex.decode(&json!("^a+$")).is_ok());
        assert!(ScalarType::Regex.decode(&json!("(")).is_err());
    }

    #[test]
    fn ip_families_are_enforced() {
        assert!(ScalarType::Ipv4.decode(&json!("10.0.0.1")).is_ok());
        assert!(ScalarType::Ipv4.decode(&json!("::1")).is_err());
        assert!(ScalarType::IpAny.decode(&json!("::1")).is_ok());
        assert!(ScalarType::Ipv4Network.decode(&json!("10.0.0.0/8")).is_ok());
        assert!(ScalarType::Ipv4Network.decode(&json!("10.0.0.0/33")).is_err());
        assert!(ScalarType::Ipv6Network.decode(&json!("fe80::/10")).is_ok());
    }
}
