use crate::error::{TrustLedgerError, TrustLedgerResult};
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

pub type Hash32 = [u8; 32];

/// Sentinel linked by the first custody entry and the first block.
pub const GENESIS_HASH: Hash32 = [0u8; 32];

pub fn sha256(bytes: &[u8]) -> Hash32 {
    let mut h = Sha256::new();
    h.update(bytes);
    h.finalize().into()
}

pub fn canonical_json(v: &impl Serialize) -> TrustLedgerResult<Vec<u8>> {
    let value = serde_json::to_value(v).map_err(|e| TrustLedgerError::Internal(e.to_string()))?;
    let sorted = sort_json(value);
    serde_json::to_vec(&sorted).map_err(|e| TrustLedgerError::Internal(e.to_string()))
}

fn sort_json(v: Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = Map::new();
            for (k, val) in entries {
                sorted.insert(k, sort_json(val));
            }
            Value::Object(sorted)
        }
        Value::Array(arr) => Value::Array(arr.into_iter().map(sort_json).collect()),
        other => other,
    }
}

/// SHA-256 over the canonical JSON encoding of `v`.
pub fn hash_canonical(v: &impl Serialize) -> TrustLedgerResult<Hash32> {
    Ok(sha256(&canonical_json(v)?))
}

pub fn to_hex(hash: &Hash32) -> String {
    hex::encode(hash)
}

pub fn from_hex(s: &str) -> TrustLedgerResult<Hash32> {
    let raw = hex::decode(s).map_err(|e| TrustLedgerError::InvalidArgument(e.to_string()))?;
    raw.try_into()
        .map_err(|_| TrustLedgerError::InvalidArgument("hash must be 32 bytes".to_string()))
}

/// Serde adapter storing a [`Hash32`] as lowercase hex.
pub mod hex32 {
    use super::Hash32;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(hash: &Hash32, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(hash))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Hash32, D::Error> {
        let s = String::deserialize(d)?;
        let raw = hex::decode(&s).map_err(serde::de::Error::custom)?;
        raw.try_into()
            .map_err(|_| serde::de::Error::custom("expected 32-byte hex hash"))
    }
}
