use std::fmt;

use serde::Serialize;

use super::Error;

/// Supported configuration value types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Value {
    /// Booleans.
    Bool(bool),
    /// Integers.
    Integer(i128),
    /// Strings.
    String(String),
}

impl Value {
    /// Parses `s` as the same kind of value as `self` and replaces `self`.
    ///
    /// Integers may be written in decimal or with a `0x`, `0o` or `0b`
    /// prefix.
    pub(crate) fn parse_in_place(&mut self, s: &str) -> Result<(), Error> {
        *self = match self {
            Value::Bool(_) => match s {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => {
                    return Err(Error::parse(format!(
                        "Expected 'true' or 'false', found: '{s}'"
                    )));
                }
            },
            Value::Integer(_) => {
                let (digits, radix) = match s.as_bytes() {
                    [b'0', b'x', ..] => (&s[2..], 16),
                    [b'0', b'o', ..] => (&s[2..], 8),
                    [b'0', b'b', ..] => (&s[2..], 2),
                    _ => (s, 10),
                };

                let inner = i128::from_str_radix(digits, radix).map_err(|_| {
                    Error::parse(format!("Expected valid integer value, found: '{s}'"))
                })?;

                Value::Integer(inner)
            }
            Value::String(_) => Value::String(s.into()),
        };

        Ok(())
    }

    /// The value as a [bool], if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// The value as an [i128], if it is one.
    pub fn as_integer(&self) -> Option<i128> {
        match self {
            Value::Integer(value) => Some(*value),
            _ => None,
        }
    }

    /// The value as a string slice, if it is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(value) => Some(value),
            _ => None,
        }
    }

    /// Is the value a bool?
    pub fn is_bool(&self) -> bool {
        matches!(self, Value::Bool(_))
    }

    /// Is the value an integer?
    pub fn is_integer(&self) -> bool {
        matches!(self, Value::Integer(_))
    }

    /// Is the value a string?
    pub fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::String(s) => write!(f, "{s}"),
        }
    }
}
