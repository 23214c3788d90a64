//! Generic, name-keyed message properties.
//!
//! `Message` keeps a typed `PropertyMap` and produces the compact binary
//! form on demand. Reserved names that map onto native message fields are
//! resolved by the static table in `command::message` before this map is
//! consulted.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;
use thiserror::Error;

/// Errors produced by property access and property map (un)marshaling.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PropertyError {
    #[error("property data truncated")]
    Truncated,
    #[error("unknown property value type {0}")]
    UnknownValueType(u8),
    #[error("property data is not valid utf8")]
    InvalidUtf8,
    #[error("property name is {0} bytes long, limit is 65535")]
    NameTooLong(usize),
    #[error("property '{0}' is read-only")]
    ReadOnly(String),
    #[error("property '{name}' expects a {expected} value")]
    TypeMismatch { name: String, expected: &'static str },
}

/// A primitive property value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Bool(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
}

impl PropertyValue {
    fn type_tag(&self) -> u8 {
        match self {
            PropertyValue::Bool(_) => 1,
            PropertyValue::Byte(_) => 2,
            PropertyValue::Short(_) => 3,
            PropertyValue::Int(_) => 4,
            PropertyValue::Long(_) => 5,
            PropertyValue::Float(_) => 6,
            PropertyValue::Double(_) => 7,
            PropertyValue::String(_) => 8,
            PropertyValue::Bytes(_) => 9,
        }
    }

    /// Integer view of any integral value.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PropertyValue::Byte(v) => Some(i64::from(*v)),
            PropertyValue::Short(v) => Some(i64::from(*v)),
            PropertyValue::Int(v) => Some(i64::from(*v)),
            PropertyValue::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Bool(v) => write!(f, "{}", v),
            PropertyValue::Byte(v) => write!(f, "{}", v),
            PropertyValue::Short(v) => write!(f, "{}", v),
            PropertyValue::Int(v) => write!(f, "{}", v),
            PropertyValue::Long(v) => write!(f, "{}", v),
            PropertyValue::Float(v) => write!(f, "{}", v),
            PropertyValue::Double(v) => write!(f, "{}", v),
            PropertyValue::String(v) => f.write_str(v),
            PropertyValue::Bytes(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

macro_rules! property_value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for PropertyValue {
                fn from(v: $ty) -> Self {
                    PropertyValue::$variant(v.into())
                }
            }
        )*
    };
}

property_value_from! {
    bool => Bool,
    i8 => Byte,
    i16 => Short,
    i32 => Int,
    i64 => Long,
    f32 => Float,
    f64 => Double,
    String => String,
    &str => String,
    Vec<u8> => Bytes,
}

/// Insertion-ordered map of property names to primitive values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyMap {
    entries: Vec<(String, PropertyValue)>,
}

impl PropertyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    /// Insert or replace a property, returning the previous value.
    pub fn set(
        &mut self,
        name: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Option<PropertyValue> {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == name) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((name, value));
                None
            }
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<PropertyValue> {
        let pos = self.entries.iter().position(|(k, _)| k == name)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Encode the map into its compact binary form.
    ///
    /// Layout: `u32` entry count, then per entry a `u16` name length, the
    /// UTF-8 name, a `u8` type tag and the big-endian payload. Strings and
    /// byte arrays are prefixed with a `u32` length.
    pub fn marshal(&self) -> Result<Bytes, PropertyError> {
        let mut buf = BytesMut::new();
        buf.put_u32(self.entries.len() as u32);
        for (name, value) in &self.entries {
            let name_len =
                u16::try_from(name.len()).map_err(|_| PropertyError::NameTooLong(name.len()))?;
            buf.put_u16(name_len);
            buf.put_slice(name.as_bytes());
            buf.put_u8(value.type_tag());
            match value {
                PropertyValue::Bool(v) => buf.put_u8(u8::from(*v)),
                PropertyValue::Byte(v) => buf.put_i8(*v),
                PropertyValue::Short(v) => buf.put_i16(*v),
                PropertyValue::Int(v) => buf.put_i32(*v),
                PropertyValue::Long(v) => buf.put_i64(*v),
                PropertyValue::Float(v) => buf.put_f32(*v),
                PropertyValue::Double(v) => buf.put_f64(*v),
                PropertyValue::String(v) => {
                    buf.put_u32(v.len() as u32);
                    buf.put_slice(v.as_bytes());
                }
                PropertyValue::Bytes(v) => {
                    buf.put_u32(v.len() as u32);
                    buf.put_slice(v);
                }
            }
        }
        Ok(buf.freeze())
    }

    /// Decode a map produced by `marshal`. An empty input is an empty map.
    pub fn unmarshal(mut data: &[u8]) -> Result<Self, PropertyError> {
        let mut map = PropertyMap::new();
        if data.is_empty() {
            return Ok(map);
        }
        need(&data, 4)?;
        let count = data.get_u32();
        for _ in 0..count {
            need(&data, 2)?;
            let name_len = data.get_u16() as usize;
            let name = take_utf8(&mut data, name_len)?;
            need(&data, 1)?;
            let value = match data.get_u8() {
                1 => {
                    need(&data, 1)?;
                    PropertyValue::Bool(data.get_u8() != 0)
                }
                2 => {
                    need(&data, 1)?;
                    PropertyValue::Byte(data.get_i8())
                }
                3 => {
                    need(&data, 2)?;
                    PropertyValue::Short(data.get_i16())
                }
                4 => {
                    need(&data, 4)?;
                    PropertyValue::Int(data.get_i32())
                }
                5 => {
                    need(&data, 8)?;
                    PropertyValue::Long(data.get_i64())
                }
                6 => {
                    need(&data, 4)?;
                    PropertyValue::Float(data.get_f32())
                }
                7 => {
                    need(&data, 8)?;
                    PropertyValue::Double(data.get_f64())
                }
                8 => {
                    need(&data, 4)?;
                    let len = data.get_u32() as usize;
                    PropertyValue::String(take_utf8(&mut data, len)?)
                }
                9 => {
                    need(&data, 4)?;
                    let len = data.get_u32() as usize;
                    need(&data, len)?;
                    let bytes = data[..len].to_vec();
                    data.advance(len);
                    PropertyValue::Bytes(bytes)
                }
                other => return Err(PropertyError::UnknownValueType(other)),
            };
            map.entries.push((name, value));
        }
        Ok(map)
    }
}

fn need(data: &&[u8], n: usize) -> Result<(), PropertyError> {
    if data.remaining() < n {
        Err(PropertyError::Truncated)
    } else {
        Ok(())
    }
}

fn take_utf8(data: &mut &[u8], len: usize) -> Result<String, PropertyError> {
    need(data, len)?;
    let s = std::str::from_utf8(&data[..len])
        .map_err(|_| PropertyError::InvalidUtf8)?
        .to_string();
    data.advance(len);
    Ok(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmarshal_rejects_truncated_input() {
        let mut map = PropertyMap::new();
        map.set("key", "value");
        let bytes = map.marshal().unwrap();
        let cut = &bytes[..bytes.len() - 2];
        assert_eq!(PropertyMap::unmarshal(cut), Err(PropertyError::Truncated));
    }

    #[test]
    fn unmarshal_rejects_unknown_tag() {
        let mut raw = BytesMut::new();
        raw.put_u32(1);
        raw.put_u16(1);
        raw.put_slice(b"k");
        raw.put_u8(42);
        assert_eq!(
            PropertyMap::unmarshal(&raw),
            Err(PropertyError::UnknownValueType(42))
        );
    }

    #[test]
    fn marshal_rejects_oversized_name() {
        let mut map = PropertyMap::new();
        map.set("x".repeat(70_000), 1);
        assert_eq!(map.marshal(), Err(PropertyError::NameTooLong(70_000)));
    }
}
