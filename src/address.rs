use alloy_primitives::{Address, hex};
use anyhow::Result;
use std::collections::HashSet;
use std::fmt;

/// A canonical 20-byte Ethereum address.
///
/// Inputs longer than 20 bytes keep only the trailing 20 bytes, shorter
/// inputs are zero-left-padded, so two addresses compare equal whenever
/// their canonical forms do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EthAddress(Address);

#[derive(Debug, thiserror::Error)]
#[error("invalid address {input:?}: {source}")]
pub struct AddressParseError {
    input: String,
    #[source]
    source: hex::FromHexError,
}

impl EthAddress {
    pub fn parse(input: &str) -> Result<Self, AddressParseError> {
        let decoded = hex::decode(sanitize_hex(input)).map_err(|source| AddressParseError {
            input: input.to_string(),
            source,
        })?;

        let mut bytes = [0u8; 20];
        if decoded.len() >= 20 {
            bytes.copy_from_slice(&decoded[decoded.len() - 20..]);
        } else {
            bytes[20 - decoded.len()..].copy_from_slice(&decoded);
        }

        Ok(EthAddress(Address::from(bytes)))
    }

    pub fn pretty(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for EthAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl<'de> serde::Deserialize<'de> for EthAddress {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        EthAddress::parse(&raw).map_err(serde::de::Error::custom)
    }
}

fn sanitize_hex(input: &str) -> String {
    let input = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .unwrap_or(input);

    if input.len() % 2 != 0 {
        format!("0{}", input.to_lowercase())
    } else {
        input.to_lowercase()
    }
}

pub fn parse_address_list(input: &str) -> Result<Vec<EthAddress>> {
    let parts: Vec<&str> = input
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect();

    if parts.is_empty() {
        anyhow::bail!("expecting at least one address, found none");
    }

    parts
        .into_iter()
        .map(|part| EthAddress::parse(part).map_err(Into::into))
        .collect()
}

/// Read-only membership set over canonical address text forms.
#[derive(Debug, Clone, Default)]
pub struct AddressSet(HashSet<String>);

impl AddressSet {
    pub fn new(addresses: &[EthAddress]) -> Self {
        AddressSet(addresses.iter().map(EthAddress::pretty).collect())
    }

    pub fn contains(&self, pretty: &str) -> bool {
        self.0.contains(pretty)
    }
}

/// Builds the server-side filter predicate selecting transactions where any
/// of `to`, `from`, `erc20_to` or `erc20_from` is one of the given addresses.
///
/// The grammar is fixed by the remote service: each clause tests membership
/// in a bracketed, single-quoted, comma-joined list, input order preserved.
pub fn filter_expression(addresses: &[EthAddress]) -> String {
    let quoted: Vec<String> = addresses
        .iter()
        .map(|address| format!("'{}'", address.pretty()))
        .collect();
    let list = format!("[{}]", quoted.join(","));

    format!("to in {list} || from in {list} || erc20_to in {list} || erc20_from in {list}")
}
