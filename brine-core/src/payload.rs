//! Payload serialization.
//!
//! Values are CBOR-encoded and LZ4-compressed before encryption. The CBOR
//! data model is restricted to plain aggregates: a tagged node anywhere in
//! the tree is refused in both directions, so a decoded value can never carry
//! reconstruction semantics. Text nodes are UTF-8 validated by the decoder.

use std::io;

use ciborium::Value;

use crate::BrineError;

/// The value an absent payload decodes to: an empty map.
pub fn empty_map() -> Value {
    Value::Map(Vec::new())
}

/// Serialize and compress a value.
pub fn freeze(value: &Value) -> Result<Vec<u8>, BrineError> {
    reject_tags(value)?;

    let mut raw = Vec::new();
    ciborium::ser::into_writer(value, &mut raw)
        .map_err(|e| BrineError::PayloadError(io::Error::other(e)))?;

    Ok(lz4_flex::compress_prepend_size(&raw))
}

/// Decompress and deserialize a value.
pub fn thaw(bytes: &[u8]) -> Result<Value, BrineError> {
    let raw = lz4_flex::decompress_size_prepended(bytes)
        .map_err(|e| BrineError::PayloadError(io::Error::other(e)))?;

    let value: Value = ciborium::de::from_reader(raw.as_slice())
        .map_err(|e| BrineError::PayloadError(io::Error::other(e)))?;

    reject_tags(&value)?;
    Ok(value)
}

fn reject_tags(value: &Value) -> Result<(), BrineError> {
    match value {
        Value::Tag(..) => Err(BrineError::TaggedValue),
        Value::Array(items) => items.iter().try_for_each(reject_tags),
        Value::Map(entries) => entries.iter().try_for_each(|(key, value)| {
            reject_tags(key)?;
            reject_tags(value)
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Value {
        Value::Map(vec![
            (Value::Text("foo".into()), Value::Text("bar".into())),
            (Value::Text("count".into()), Value::Integer(42.into())),
            (
                Value::Text("flags".into()),
                Value::Array(vec![Value::Bool(true), Value::Null]),
            ),
        ])
    }

    #[test]
    fn freeze_thaw_round_trips() {
        let value = session();
        assert_eq!(thaw(&freeze(&value).unwrap()).unwrap(), value);
    }

    #[test]
    fn empty_map_round_trips() {
        assert_eq!(thaw(&freeze(&empty_map()).unwrap()).unwrap(), empty_map());
    }

    #[test]
    fn freeze_refuses_tagged_values() {
        let tagged = Value::Tag(37, Box::new(Value::Bytes(vec![0; 16])));
        assert!(matches!(freeze(&tagged), Err(BrineError::TaggedValue)));

        let nested = Value::Map(vec![(
            Value::Text("inner".into()),
            Value::Array(vec![Value::Tag(0, Box::new(Value::Text("x".into())))]),
        )]);
        assert!(matches!(freeze(&nested), Err(BrineError::TaggedValue)));
    }

    #[test]
    fn thaw_refuses_tagged_values() {
        // 0xc1 tags the following item with tag 1; compress it the way
        // freeze would have.
        let raw = [0xc1, 0x00];
        let bytes = lz4_flex::compress_prepend_size(&raw);
        assert!(matches!(thaw(&bytes), Err(BrineError::TaggedValue)));
    }

    #[test]
    fn thaw_rejects_garbage() {
        assert!(matches!(thaw(b"junk"), Err(BrineError::PayloadError(_))));
    }
}
