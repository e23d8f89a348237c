//! Encoding of persisted states and events.

use crate::persistence::error::CodecError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Byte encoding used for snapshots and journal entries.
///
/// The target type of `decode` plays the role of the type descriptor: the
/// same bytes decode only into the type they were encoded from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Codec {
    #[default]
    Json,
    Bincode,
}

impl Codec {
    pub fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        match self {
            Codec::Json => Ok(serde_json::to_vec(value)?),
            Codec::Bincode => Ok(bincode::serialize(value)?),
        }
    }

    pub fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        match self {
            Codec::Json => Ok(serde_json::from_slice(bytes)?),
            Codec::Bincode => Ok(bincode::deserialize(bytes)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
    enum Order {
        Draft,
        Placed { items: Vec<String>, total: u64 },
    }

    #[test]
    fn both_codecs_preserve_struct_variants() {
        let order = Order::Placed {
            items: vec!["tea".into(), "cake".into()],
            total: 1250,
        };
        for codec in [Codec::Json, Codec::Bincode] {
            let bytes = codec.encode(&order).unwrap();
            let decoded: Order = codec.decode(&bytes).unwrap();
            assert_eq!(decoded, order);
        }
        assert_eq!(
            Codec::Json.decode::<Order>(br#""Draft""#).unwrap(),
            Order::Draft
        );
    }

    #[test]
    fn garbage_fails_to_decode() {
        assert!(Codec::Json.decode::<Order>(b"not json").is_err());
        assert!(Codec::Bincode.decode::<Order>(&[0xff; 2]).is_err());
    }
}
