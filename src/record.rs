use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// A single log entry: an ordered mapping of field names to JSON values.
///
/// Records are immutable once handed to [`Logger::log`](crate::Logger::log).
/// The order of keys within a record carries no meaning; the sequence of
/// records is strictly ordered by production time.
pub type Record = Map<String, Value>;

/// Pluggable serialization hooks for non-primitive value types.
///
/// The serializer walks every value in a record and offers it to
/// [`encode_value`](Codec::encode_value); the deserializer walks every object
/// and offers it to [`decode_object`](Codec::decode_object). Both hooks
/// return `None` to leave the value untouched, so a codec only has to
/// recognize its own markers. The core never depends on concrete value types.
///
/// # Examples
///
/// A codec that stores byte blobs as tagged hex strings:
///
/// ```
/// use runlog::Codec;
/// use serde_json::{Map, Value};
///
/// struct HexCodec;
///
/// impl Codec for HexCodec {
///     fn decode_object(&self, object: &Map<String, Value>) -> Option<Value> {
///         let hex = object.get("__hex__")?.as_str()?;
///         Some(Value::String(format!("decoded:{hex}")))
///     }
/// }
/// ```
pub trait Codec: Send + Sync {
    /// Offered every value during serialization. Return a replacement to
    /// rewrite the value, or `None` to keep it. Replacements are written
    /// as-is and are not walked again.
    fn encode_value(&self, _value: &Value) -> Option<Value> {
        None
    }

    /// Offered every object during deserialization, innermost first.
    /// Return `Some` to replace the object with a reconstructed value.
    fn decode_object(&self, _object: &Map<String, Value>) -> Option<Value> {
        None
    }
}

/// The default codec: leaves every value exactly as serde_json produced it.
pub struct PlainCodec;

impl Codec for PlainCodec {}

/// Serializes a record to a single newline-terminated JSON line.
///
/// Serialization happens exactly once per `log()` call; the resulting line is
/// shared between the durable appender and the broadcaster.
pub fn to_line(record: &Record, codec: &dyn Codec) -> Result<String> {
    let encoded = encode_tree(&Value::Object(record.clone()), codec);
    let mut line = serde_json::to_string(&encoded)?;
    line.push('\n');
    Ok(line)
}

/// Parses one JSON line back into a record, applying the codec's
/// `decode_object` hook to every nested object.
pub fn from_line(line: &str, codec: &dyn Codec) -> Result<Record> {
    let value: Value = serde_json::from_str(line.trim_end())?;
    match decode_tree(value, codec) {
        Value::Object(map) => Ok(map),
        other => Err(Error::Malformed(format!(
            "expected an object, got {other}"
        ))),
    }
}

fn encode_tree(value: &Value, codec: &dyn Codec) -> Value {
    if let Some(replacement) = codec.encode_value(value) {
        return replacement;
    }
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, nested)| (key.clone(), encode_tree(nested, codec)))
                .collect(),
        ),
        Value::Array(items) => {
            Value::Array(items.iter().map(|item| encode_tree(item, codec)).collect())
        }
        other => other.clone(),
    }
}

fn decode_tree(value: Value, codec: &dyn Codec) -> Value {
    match value {
        Value::Object(map) => {
            let map: Map<String, Value> = map
                .into_iter()
                .map(|(key, nested)| (key, decode_tree(nested, codec)))
                .collect();
            codec.decode_object(&map).unwrap_or(Value::Object(map))
        }
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| decode_tree(item, codec))
                .collect(),
        ),
        other => other,
    }
}

/// Builds a [`Record`] from `"key": value` pairs.
///
/// Values may be any expression accepted by `serde_json::json!`.
///
/// # Examples
///
/// ```
/// use runlog::record;
///
/// let step = 7;
/// let entry = record! {
///     "step": step,
///     "loss": 0.25,
///     "meta": { "lr": 1e-3 },
/// };
/// assert_eq!(entry["step"], 7);
/// ```
#[macro_export]
macro_rules! record {
    ($($body:tt)*) => {
        match $crate::__json::json!({ $($body)* }) {
            $crate::__json::Value::Object(map) => map,
            _ => unreachable!("a JSON object literal always parses to an object"),
        }
    };
}
