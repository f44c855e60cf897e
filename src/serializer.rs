//! Session payload serializers.
//!
//! A [`Serializer`] turns the [`Values`] of a session into the bytes written to the
//! backend and back. The strategy is chosen once, when the store is built:
//!
//! | Serializer                | Feature       | `Int` / `Float` kept apart |
//! |---------------------------|---------------|----------------------------|
//! | [`BincodeSerializer`]     | `bincode`     | yes                        |
//! | [`MessagePackSerializer`] | `messagepack` | yes                        |
//! | [`JsonSerializer`]        | always        | no, numbers load as `Float` |
//!
//! Payloads written by one serializer cannot be read by another. Switching the
//! serializer of a store with live sessions makes every existing session fail to
//! load with [`Error::Decode`].

use std::fmt::Debug;
use std::sync::Arc;

use crate::session::{Value, Values};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Encoding failed with: {0}")]
    Encode(String),

    #[error("Decoding failed with: {0}")]
    Decode(String),
}

/// Converts session values to and from their stored representation.
pub trait Serializer: Debug + Send + Sync + 'static {
    fn serialize(&self, values: &Values) -> Result<Vec<u8>, Error>;

    fn deserialize(&self, bytes: &[u8]) -> Result<Values, Error>;
}

/// Compact binary encoding using [bincode](https://crates.io/crates/bincode).
#[cfg(feature = "bincode")]
#[derive(Clone, Copy, Debug, Default)]
pub struct BincodeSerializer;

#[cfg(feature = "bincode")]
impl Serializer for BincodeSerializer {
    fn serialize(&self, values: &Values) -> Result<Vec<u8>, Error> {
        bincode::serde::encode_to_vec(values, bincode::config::standard())
            .map_err(|e| Error::Encode(e.to_string()))
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<Values, Error> {
        bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map(|(values, _)| values)
            .map_err(|e| Error::Decode(e.to_string()))
    }
}

/// Cross-language binary encoding using [MessagePack](https://crates.io/crates/rmp-serde).
#[cfg(feature = "messagepack")]
#[derive(Clone, Copy, Debug, Default)]
pub struct MessagePackSerializer;

#[cfg(feature = "messagepack")]
impl Serializer for MessagePackSerializer {
    fn serialize(&self, values: &Values) -> Result<Vec<u8>, Error> {
        rmp_serde::to_vec(values).map_err(|e| Error::Encode(e.to_string()))
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<Values, Error> {
        rmp_serde::from_slice(bytes).map_err(|e| Error::Decode(e.to_string()))
    }
}

/// Stores the session as a plain JSON object.
///
/// JSON has a single number type, so `Value::Int(3)` is read back as
/// `Value::Float(3.0)`. Integers beyond 2^53 lose precision on the way back:
/// `Int(9007199254740993)` loads as `Float(9007199254740992.0)`. Store such ids as
/// strings. Non-finite floats have no JSON form and fail to encode.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn serialize(&self, values: &Values) -> Result<Vec<u8>, Error> {
        let object = values
            .iter()
            .map(|(key, value)| -> Result<_, Error> { Ok((key.clone(), to_json(value)?)) })
            .collect::<Result<serde_json::Map<_, _>, Error>>()?;

        serde_json::to_vec(&object).map_err(|e| Error::Encode(e.to_string()))
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<Values, Error> {
        let json: serde_json::Value =
            serde_json::from_slice(bytes).map_err(|e| Error::Decode(e.to_string()))?;

        match json {
            serde_json::Value::Object(object) => object
                .into_iter()
                .map(|(key, value)| -> Result<_, Error> { Ok((key, from_json(value)?)) })
                .collect::<Result<Values, Error>>(),
            other => Err(Error::Decode(format!(
                "expected a JSON object, found {other}"
            ))),
        }
    }
}

fn to_json(value: &Value) -> Result<serde_json::Value, Error> {
    Ok(match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(n) => serde_json::Value::Number((*n).into()),
        Value::Float(n) => serde_json::Number::from_f64(*n)
            .map(serde_json::Value::Number)
            .ok_or_else(|| Error::Encode(format!("{n} cannot be represented in JSON")))?,
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::List(items) => {
            serde_json::Value::Array(items.iter().map(to_json).collect::<Result<_, _>>()?)
        }
        Value::Map(map) => serde_json::Value::Object(
            map.iter()
                .map(|(key, value)| -> Result<_, Error> { Ok((key.clone(), to_json(value)?)) })
                .collect::<Result<_, Error>>()?,
        ),
    })
}

fn from_json(value: serde_json::Value) -> Result<Value, Error> {
    Ok(match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => n
            .as_f64()
            .map(Value::Float)
            .ok_or_else(|| Error::Decode(format!("{n} is not a finite number")))?,
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(items) => {
            Value::List(items.into_iter().map(from_json).collect::<Result<_, _>>()?)
        }
        serde_json::Value::Object(object) => Value::Map(
            object
                .into_iter()
                .map(|(key, value)| -> Result<_, Error> { Ok((key, from_json(value)?)) })
                .collect::<Result<_, Error>>()?,
        ),
    })
}

/// The serializer a store uses unless configured otherwise.
#[cfg(feature = "bincode")]
pub(crate) fn default_serializer() -> Arc<dyn Serializer> {
    Arc::new(BincodeSerializer)
}

#[cfg(all(not(feature = "bincode"), feature = "messagepack"))]
pub(crate) fn default_serializer() -> Arc<dyn Serializer> {
    Arc::new(MessagePackSerializer)
}

#[cfg(not(any(feature = "bincode", feature = "messagepack")))]
pub(crate) fn default_serializer() -> Arc<dyn Serializer> {
    Arc::new(JsonSerializer)
}
