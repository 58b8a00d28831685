//! Cadence values as the Flow tooling exchanges them.
//!
//! Transaction and script arguments are handed to the `flow` CLI as
//! JSON-Cadence (`--args-json`), and script results come back in the same
//! encoding. Only the types the auction transactions and scripts use are
//! given first-class variants; anything else is kept as raw JSON.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of fractional digits carried by a UFix64
pub const UFIX64_DECIMALS: u32 = 8;

/// Units per whole token (10^8)
pub const UFIX64_SCALE: u64 = 100_000_000;

const INTEGER_TYPES: &[&str] = &[
    "Int", "Int8", "Int16", "Int32", "Int64", "Int128", "Int256", "UInt", "UInt8", "UInt16",
    "UInt32", "UInt64", "UInt128", "UInt256", "Word8", "Word16", "Word32", "Word64",
];

const COMPOSITE_TYPES: &[&str] = &["Struct", "Resource", "Event", "Contract", "Enum"];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CadenceError {
    #[error("invalid UFix64 '{input}': {reason}")]
    InvalidUFix64 { input: String, reason: &'static str },

    #[error("invalid address '{input}': {reason}")]
    InvalidAddress { input: String, reason: &'static str },

    #[error("malformed JSON-Cadence value: {0}")]
    Malformed(String),
}

/// Unsigned fixed-point number with 8 decimal places.
///
/// Stored as an integer count of 10^-8 units, so `100000.0` is
/// `10_000_000_000_000` units. Arithmetic is checked; an auction balance
/// never silently wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct UFix64(u64);

impl UFix64 {
    pub const ZERO: UFix64 = UFix64(0);
    pub const MAX: UFix64 = UFix64(u64::MAX);

    pub const fn from_units(units: u64) -> Self {
        Self(units)
    }

    pub const fn units(&self) -> u64 {
        self.0
    }

    /// Whole token amount, `None` if it does not fit
    pub fn from_whole(whole: u64) -> Option<Self> {
        whole.checked_mul(UFIX64_SCALE).map(Self)
    }

    pub fn checked_add(self, other: UFix64) -> Option<UFix64> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: UFix64) -> Option<UFix64> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn saturating_sub(self, other: UFix64) -> UFix64 {
        Self(self.0.saturating_sub(other.0))
    }

    /// Multiply by a plain integer, e.g. a bid amount by a round count
    pub fn checked_mul_int(self, factor: u64) -> Option<UFix64> {
        self.0.checked_mul(factor).map(Self)
    }
}

impl FromStr for UFix64 {
    type Err = CadenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim();
        let invalid = |reason| CadenceError::InvalidUFix64 {
            input: s.to_string(),
            reason,
        };

        if input.is_empty() {
            return Err(invalid("empty value"));
        }
        if input.starts_with('-') {
            return Err(invalid("negative values are not allowed"));
        }

        let (int_part, frac_part) = input.split_once('.').unwrap_or((input, ""));
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid("no digits"));
        }
        if !int_part.bytes().all(|b| b.is_ascii_digit())
            || !frac_part.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid("unexpected character"));
        }
        if frac_part.len() > UFIX64_DECIMALS as usize {
            return Err(invalid("more than 8 fractional digits"));
        }

        let whole: u64 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().map_err(|_| invalid("out of range"))?
        };

        let fraction: u64 = if frac_part.is_empty() {
            0
        } else {
            let digits: u64 = frac_part.parse().map_err(|_| invalid("out of range"))?;
            digits * 10u64.pow(UFIX64_DECIMALS - frac_part.len() as u32)
        };

        whole
            .checked_mul(UFIX64_SCALE)
            .and_then(|units| units.checked_add(fraction))
            .map(Self)
            .ok_or_else(|| invalid("out of range"))
    }
}

impl fmt::Display for UFix64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:08}", self.0 / UFIX64_SCALE, self.0 % UFIX64_SCALE)
    }
}

impl Serialize for UFix64 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for UFix64 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// 8-byte Flow account address
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address([u8; 8]);

impl Address {
    pub const fn new(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }

    /// Hex form without the `0x` prefix, as `flow.json` stores it
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for Address {
    type Err = CadenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        let invalid = |reason| CadenceError::InvalidAddress {
            input: s.to_string(),
            reason,
        };

        if digits.is_empty() {
            return Err(invalid("empty address"));
        }
        if digits.len() > 16 {
            return Err(invalid("longer than 16 hex digits"));
        }

        // Flow tolerates short addresses such as 0x01
        let padded = format!("{:0>16}", digits);
        let decoded = hex::decode(&padded).map_err(|_| invalid("not hexadecimal"))?;

        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&decoded);
        Ok(Self(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// A typed argument for a transaction or script
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Argument {
    Address(Address),
    UInt64(u64),
    UFix64(UFix64),
    String(String),
}

impl Argument {
    pub fn type_name(&self) -> &'static str {
        match self {
            Argument::Address(_) => "Address",
            Argument::UInt64(_) => "UInt64",
            Argument::UFix64(_) => "UFix64",
            Argument::String(_) => "String",
        }
    }

    /// JSON-Cadence encoding of this argument.
    ///
    /// Integer and fixed-point values are encoded as strings, which is what
    /// the format requires to stay lossless for 64-bit and wider types.
    pub fn to_json_cadence(&self) -> Value {
        let value = match self {
            Argument::Address(address) => address.to_string(),
            Argument::UInt64(value) => value.to_string(),
            Argument::UFix64(value) => value.to_string(),
            Argument::String(value) => value.clone(),
        };
        json!({ "type": self.type_name(), "value": value })
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::Address(address) => write!(f, "Address({})", address),
            Argument::UInt64(value) => write!(f, "UInt64({})", value),
            Argument::UFix64(value) => write!(f, "UFix64({})", value),
            Argument::String(value) => write!(f, "String({:?})", value),
        }
    }
}

/// Encode an ordered argument list for `--args-json`
pub fn encode_arguments(args: &[Argument]) -> String {
    Value::Array(args.iter().map(Argument::to_json_cadence).collect()).to_string()
}

/// A decoded JSON-Cadence value, typically a script result
#[derive(Debug, Clone, PartialEq)]
pub enum CadenceValue {
    Void,
    Optional(Option<Box<CadenceValue>>),
    Bool(bool),
    String(String),
    Address(Address),
    /// Integer types keep their decimal text so no width is lost
    Integer { type_name: String, value: String },
    UFix64(UFix64),
    Fix64(String),
    Array(Vec<CadenceValue>),
    Dictionary(Vec<(CadenceValue, CadenceValue)>),
    Composite {
        kind: String,
        id: String,
        fields: Vec<(String, CadenceValue)>,
    },
    Other { type_name: String, raw: Value },
}

impl CadenceValue {
    /// Parse JSON-Cadence text
    pub fn parse(text: &str) -> Result<Self, CadenceError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| CadenceError::Malformed(e.to_string()))?;
        Self::from_json(&value)
    }

    /// Decode an already-parsed JSON-Cadence value
    pub fn from_json(value: &Value) -> Result<Self, CadenceError> {
        let object = value
            .as_object()
            .ok_or_else(|| CadenceError::Malformed(format!("expected an object, got {}", value)))?;
        let type_name = object
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| CadenceError::Malformed("missing 'type' field".to_string()))?;
        let inner = object.get("value");

        let text = || {
            inner.and_then(Value::as_str).ok_or_else(|| {
                CadenceError::Malformed(format!("{} value must be a string", type_name))
            })
        };

        match type_name {
            "Void" => Ok(CadenceValue::Void),
            "Optional" => match inner {
                None | Some(Value::Null) => Ok(CadenceValue::Optional(None)),
                Some(inner) => Ok(CadenceValue::Optional(Some(Box::new(Self::from_json(
                    inner,
                )?)))),
            },
            "Bool" => inner
                .and_then(Value::as_bool)
                .map(CadenceValue::Bool)
                .ok_or_else(|| CadenceError::Malformed("Bool value must be a boolean".into())),
            "String" | "Character" => Ok(CadenceValue::String(text()?.to_string())),
            "Address" => Ok(CadenceValue::Address(text()?.parse()?)),
            "UFix64" => Ok(CadenceValue::UFix64(text()?.parse()?)),
            "Fix64" => Ok(CadenceValue::Fix64(text()?.to_string())),
            t if INTEGER_TYPES.contains(&t) => Ok(CadenceValue::Integer {
                type_name: t.to_string(),
                value: text()?.to_string(),
            }),
            "Array" => {
                let items = inner.and_then(Value::as_array).ok_or_else(|| {
                    CadenceError::Malformed("Array value must be a list".to_string())
                })?;
                items
                    .iter()
                    .map(Self::from_json)
                    .collect::<Result<Vec<_>, _>>()
                    .map(CadenceValue::Array)
            }
            "Dictionary" => {
                let entries = inner.and_then(Value::as_array).ok_or_else(|| {
                    CadenceError::Malformed("Dictionary value must be a list".to_string())
                })?;
                let mut pairs = Vec::with_capacity(entries.len());
                for entry in entries {
                    let key = entry.get("key").ok_or_else(|| {
                        CadenceError::Malformed("dictionary entry without key".to_string())
                    })?;
                    let value = entry.get("value").ok_or_else(|| {
                        CadenceError::Malformed("dictionary entry without value".to_string())
                    })?;
                    pairs.push((Self::from_json(key)?, Self::from_json(value)?));
                }
                Ok(CadenceValue::Dictionary(pairs))
            }
            t if COMPOSITE_TYPES.contains(&t) => {
                let body = inner.and_then(Value::as_object).ok_or_else(|| {
                    CadenceError::Malformed(format!("{} value must be an object", t))
                })?;
                let id = body
                    .get("id")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let mut fields = Vec::new();
                if let Some(entries) = body.get("fields").and_then(Value::as_array) {
                    for entry in entries {
                        let name = entry.get("name").and_then(Value::as_str).ok_or_else(|| {
                            CadenceError::Malformed("composite field without name".to_string())
                        })?;
                        let value = entry.get("value").ok_or_else(|| {
                            CadenceError::Malformed(format!("field '{}' without value", name))
                        })?;
                        fields.push((name.to_string(), Self::from_json(value)?));
                    }
                }
                Ok(CadenceValue::Composite {
                    kind: t.to_string(),
                    id,
                    fields,
                })
            }
            other => Ok(CadenceValue::Other {
                type_name: other.to_string(),
                raw: inner.cloned().unwrap_or(Value::Null),
            }),
        }
    }

    /// The value as a UFix64, looking through a present Optional
    pub fn as_ufix64(&self) -> Option<UFix64> {
        match self {
            CadenceValue::UFix64(value) => Some(*value),
            CadenceValue::Optional(Some(inner)) => inner.as_ufix64(),
            _ => None,
        }
    }

    /// Named member of a composite, or the entry of a String-keyed dictionary
    pub fn field(&self, name: &str) -> Option<&CadenceValue> {
        match self {
            CadenceValue::Composite { fields, .. } => fields
                .iter()
                .find(|(field, _)| field == name)
                .map(|(_, value)| value),
            CadenceValue::Dictionary(entries) => entries
                .iter()
                .find(|(key, _)| matches!(key, CadenceValue::String(k) if k == name))
                .map(|(_, value)| value),
            CadenceValue::Optional(Some(inner)) => inner.field(name),
            _ => None,
        }
    }

    /// Depth-first search for a UFix64 stored under `name`
    pub fn find_ufix64(&self, name: &str) -> Option<UFix64> {
        if let Some(found) = self.field(name).and_then(CadenceValue::as_ufix64) {
            return Some(found);
        }

        match self {
            CadenceValue::Optional(Some(inner)) => inner.find_ufix64(name),
            CadenceValue::Array(items) => items.iter().find_map(|item| item.find_ufix64(name)),
            CadenceValue::Dictionary(entries) => entries
                .iter()
                .find_map(|(_, value)| value.find_ufix64(name)),
            CadenceValue::Composite { fields, .. } => fields
                .iter()
                .find_map(|(_, value)| value.find_ufix64(name)),
            _ => None,
        }
    }
}

impl fmt::Display for CadenceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CadenceValue::Void => write!(f, "()"),
            CadenceValue::Optional(None) => write!(f, "nil"),
            CadenceValue::Optional(Some(inner)) => write!(f, "{}", inner),
            CadenceValue::Bool(value) => write!(f, "{}", value),
            CadenceValue::String(value) => write!(f, "{:?}", value),
            CadenceValue::Address(address) => write!(f, "{}", address),
            CadenceValue::Integer { value, .. } => write!(f, "{}", value),
            CadenceValue::UFix64(value) => write!(f, "{}", value),
            CadenceValue::Fix64(value) => write!(f, "{}", value),
            CadenceValue::Array(items) => {
                write!(f, "[")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            CadenceValue::Dictionary(entries) => {
                write!(f, "{{")?;
                for (idx, (key, value)) in entries.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                write!(f, "}}")
            }
            CadenceValue::Composite { id, fields, .. } => {
                write!(f, "{}(", id)?;
                for (idx, (name, value)) in fields.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", name, value)?;
                }
                write!(f, ")")
            }
            CadenceValue::Other { type_name, raw } => write!(f, "{}({})", type_name, raw),
        }
    }
}
