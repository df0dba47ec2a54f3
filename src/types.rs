//! Primitive value types: textual parse/print plus a fixed binary width
//! where one exists (network byte order). The fixed-width forms back the
//! compact table representations in [`crate::value`].

use crate::value::Value;
use byteorder::{BigEndian, ByteOrder};
use std::net::{Ipv4Addr, Ipv6Addr};

/// The closed set of primitive leaf types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    String,
    Boolean,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Int8,
    Int16,
    Int32,
    Int64,
    Ipv4Address,
    Ipv6Address,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid {type_name} value {text:?}: {reason}")]
pub struct DecodeError {
    pub type_name: &'static str,
    pub text: String,
    pub reason: String,
}

impl Primitive {
    pub fn from_name(name: &str) -> Option<Primitive> {
        match name {
            "string" => Some(Primitive::String),
            "boolean" => Some(Primitive::Boolean),
            "uint8" => Some(Primitive::Uint8),
            "uint16" => Some(Primitive::Uint16),
            "uint32" => Some(Primitive::Uint32),
            "uint64" => Some(Primitive::Uint64),
            "int8" => Some(Primitive::Int8),
            "int16" => Some(Primitive::Int16),
            "int32" => Some(Primitive::Int32),
            "int64" => Some(Primitive::Int64),
            "ipv4-address" => Some(Primitive::Ipv4Address),
            "ipv6-address" => Some(Primitive::Ipv6Address),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Primitive::String => "string",
            Primitive::Boolean => "boolean",
            Primitive::Uint8 => "uint8",
            Primitive::Uint16 => "uint16",
            Primitive::Uint32 => "uint32",
            Primitive::Uint64 => "uint64",
            Primitive::Int8 => "int8",
            Primitive::Int16 => "int16",
            Primitive::Int32 => "int32",
            Primitive::Int64 => "int64",
            Primitive::Ipv4Address => "ipv4-address",
            Primitive::Ipv6Address => "ipv6-address",
        }
    }

    /// Binary width when the type has a fixed-size representation.
    /// Strings have none.
    pub fn fixed_size(self) -> Option<usize> {
        match self {
            Primitive::String => None,
            Primitive::Boolean | Primitive::Uint8 | Primitive::Int8 => Some(1),
            Primitive::Uint16 | Primitive::Int16 => Some(2),
            Primitive::Uint32 | Primitive::Int32 | Primitive::Ipv4Address => Some(4),
            Primitive::Uint64 | Primitive::Int64 => Some(8),
            Primitive::Ipv6Address => Some(16),
        }
    }

    /// Decode a textual argument into a [`Value`] of this type.
    pub fn parse(self, text: &str) -> Result<Value, DecodeError> {
        let text = text.trim();
        match self {
            Primitive::String => Ok(Value::String(text.to_string())),
            Primitive::Boolean => match text {
                "true" => Ok(Value::Boolean(true)),
                "false" => Ok(Value::Boolean(false)),
                _ => Err(self.error(text, "expected true or false")),
            },
            Primitive::Uint8 => parse_unsigned(text).map(Value::Uint8).map_err(|r| self.error(text, &r)),
            Primitive::Uint16 => parse_unsigned(text).map(Value::Uint16).map_err(|r| self.error(text, &r)),
            Primitive::Uint32 => parse_unsigned(text).map(Value::Uint32).map_err(|r| self.error(text, &r)),
            Primitive::Uint64 => parse_unsigned(text).map(Value::Uint64).map_err(|r| self.error(text, &r)),
            Primitive::Int8 => parse_signed(text).map(Value::Int8).map_err(|r| self.error(text, &r)),
            Primitive::Int16 => parse_signed(text).map(Value::Int16).map_err(|r| self.error(text, &r)),
            Primitive::Int32 => parse_signed(text).map(Value::Int32).map_err(|r| self.error(text, &r)),
            Primitive::Int64 => parse_signed(text).map(Value::Int64).map_err(|r| self.error(text, &r)),
            Primitive::Ipv4Address => text
                .parse::<Ipv4Addr>()
                .map(Value::Ipv4)
                .map_err(|e| self.error(text, &e.to_string())),
            Primitive::Ipv6Address => text
                .parse::<Ipv6Addr>()
                .map(Value::Ipv6)
                .map_err(|e| self.error(text, &e.to_string())),
        }
    }

    /// Canonical text for a value of this type; `None` when the value's
    /// variant does not match the type (an internal-consistency error the
    /// caller surfaces).
    pub fn to_text(self, value: &Value) -> Option<String> {
        match (self, value) {
            (Primitive::String, Value::String(s)) => Some(s.clone()),
            (Primitive::Boolean, Value::Boolean(b)) => Some(b.to_string()),
            (Primitive::Uint8, Value::Uint8(n)) => Some(n.to_string()),
            (Primitive::Uint16, Value::Uint16(n)) => Some(n.to_string()),
            (Primitive::Uint32, Value::Uint32(n)) => Some(n.to_string()),
            (Primitive::Uint64, Value::Uint64(n)) => Some(n.to_string()),
            (Primitive::Int8, Value::Int8(n)) => Some(n.to_string()),
            (Primitive::Int16, Value::Int16(n)) => Some(n.to_string()),
            (Primitive::Int32, Value::Int32(n)) => Some(n.to_string()),
            (Primitive::Int64, Value::Int64(n)) => Some(n.to_string()),
            (Primitive::Ipv4Address, Value::Ipv4(a)) => Some(a.to_string()),
            (Primitive::Ipv6Address, Value::Ipv6(a)) => Some(a.to_string()),
            _ => None,
        }
    }

    /// Write a value into `out` (must be exactly `fixed_size` bytes).
    /// Returns false when the value's variant does not match.
    pub fn write_fixed(self, value: &Value, out: &mut [u8]) -> bool {
        match (self, value) {
            (Primitive::Boolean, Value::Boolean(b)) => out[0] = *b as u8,
            (Primitive::Uint8, Value::Uint8(n)) => out[0] = *n,
            (Primitive::Uint16, Value::Uint16(n)) => BigEndian::write_u16(out, *n),
            (Primitive::Uint32, Value::Uint32(n)) => BigEndian::write_u32(out, *n),
            (Primitive::Uint64, Value::Uint64(n)) => BigEndian::write_u64(out, *n),
            (Primitive::Int8, Value::Int8(n)) => out[0] = *n as u8,
            (Primitive::Int16, Value::Int16(n)) => BigEndian::write_i16(out, *n),
            (Primitive::Int32, Value::Int32(n)) => BigEndian::write_i32(out, *n),
            (Primitive::Int64, Value::Int64(n)) => BigEndian::write_i64(out, *n),
            (Primitive::Ipv4Address, Value::Ipv4(a)) => out.copy_from_slice(&a.octets()),
            (Primitive::Ipv6Address, Value::Ipv6(a)) => out.copy_from_slice(&a.octets()),
            _ => return false,
        }
        true
    }

    /// Read a value back from its fixed-width form (`bytes` must be exactly
    /// `fixed_size` bytes).
    pub fn read_fixed(self, bytes: &[u8]) -> Value {
        match self {
            Primitive::Boolean => Value::Boolean(bytes[0] != 0),
            Primitive::Uint8 => Value::Uint8(bytes[0]),
            Primitive::Uint16 => Value::Uint16(BigEndian::read_u16(bytes)),
            Primitive::Uint32 => Value::Uint32(BigEndian::read_u32(bytes)),
            Primitive::Uint64 => Value::Uint64(BigEndian::read_u64(bytes)),
            Primitive::Int8 => Value::Int8(bytes[0] as i8),
            Primitive::Int16 => Value::Int16(BigEndian::read_i16(bytes)),
            Primitive::Int32 => Value::Int32(BigEndian::read_i32(bytes)),
            Primitive::Int64 => Value::Int64(BigEndian::read_i64(bytes)),
            Primitive::Ipv4Address => {
                let mut o = [0u8; 4];
                o.copy_from_slice(bytes);
                Value::Ipv4(Ipv4Addr::from(o))
            }
            Primitive::Ipv6Address => {
                let mut o = [0u8; 16];
                o.copy_from_slice(bytes);
                Value::Ipv6(Ipv6Addr::from(o))
            }
            Primitive::String => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        }
    }

    fn error(self, text: &str, reason: &str) -> DecodeError {
        DecodeError {
            type_name: self.name(),
            text: text.to_string(),
            reason: reason.to_string(),
        }
    }
}

fn parse_unsigned<T: TryFrom<u64>>(text: &str) -> Result<T, String> {
    let n = if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).map_err(|e| e.to_string())?
    } else {
        text.parse::<u64>().map_err(|e| e.to_string())?
    };
    T::try_from(n).map_err(|_| "out of range".to_string())
}

fn parse_signed<T: TryFrom<i64>>(text: &str) -> Result<T, String> {
    let n = text.parse::<i64>().map_err(|e| e.to_string())?;
    T::try_from(n).map_err(|_| "out of range".to_string())
}

/// Restrictions attached to a leaf type (range, length, pattern, ...).
/// Carried through compilation; `check` is a pass-through hook until value
/// constraint enforcement lands.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Restrictions {
    /// Raw `(keyword, argument)` substatements of the type statement.
    pub clauses: Vec<(String, String)>,
}

impl Restrictions {
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn check(&self, _value: &Value) -> Result<(), DecodeError> {
        Ok(())
    }
}
