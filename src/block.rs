use crate::address::EthAddress;
use crate::amount::parse_amount;
use anyhow::{Context, Result};
use num_bigint::BigInt;
use serde::{Deserialize, Deserializer};

/// Light-detail block as delivered by the stream: header fields plus the
/// transaction traces needed for matching, no full block body.
#[derive(Debug, Clone, Deserialize)]
pub struct BlockLight {
    pub number: u64,
    pub hash: String,
    #[serde(default)]
    pub transaction_traces: Vec<TransactionTrace>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransactionTrace {
    pub hash: String,
    #[serde(default)]
    pub calls: Vec<InternalCall>,
}

/// A sub-operation within a transaction trace, e.g. a contract-to-contract
/// value transfer, distinct from the top-level transaction.
#[derive(Debug, Clone, Deserialize)]
pub struct InternalCall {
    pub caller: EthAddress,
    pub address: EthAddress,
    #[serde(default, deserialize_with = "deserialize_value")]
    pub value: Option<BigInt>,
}

fn deserialize_value<'de, D>(deserializer: D) -> Result<Option<BigInt>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(raw) => parse_amount(&raw)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid amount {raw:?}"))),
    }
}

/// Decodes an opaque block payload received from the stream. Failure here
/// indicates a protocol mismatch that retrying cannot fix, so callers treat
/// it as fatal for the whole process.
pub fn decode_block(payload: &serde_json::Value) -> Result<BlockLight> {
    serde_json::from_value(payload.clone())
        .context("should have been able to decode received block payload")
}
