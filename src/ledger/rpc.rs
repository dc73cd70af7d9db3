//! JSON-RPC ledger client
//!
//! Implements [`Ledger`] over Ethereum JSON-RPC for an ERC-721 collection:
//!
//! - `totalSupply()` / `tokenByIndex(uint256)` / `tokenURI(uint256)` via
//!   `eth_call` with hand-rolled selectors (the read surface is three fixed
//!   functions; a full ABI layer would be dead weight)
//! - mint discovery via `eth_getLogs` filtered on the `Transfer` topic with
//!   the zero address as origin
//! - a polling mint subscription: the upstream node is plain HTTP, so "live"
//!   means reading the chain head on an interval and sweeping the delta
//!
//! No retries at this layer. A ledger failure is an [`EnumerationError`] and
//! the caller decides what to do with it.

use futures::channel::mpsc;
use futures::stream::BoxStream;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

use async_trait::async_trait;

use super::{Ledger, MetadataPointer, MintNotice};
use crate::types::EnumerationError;

// Function selectors (first 4 bytes of keccak256 of the signature)
const SELECTOR_TOTAL_SUPPLY: &str = "0x18160ddd"; // totalSupply()
const SELECTOR_TOKEN_BY_INDEX: &str = "0x4f6ccce7"; // tokenByIndex(uint256)
const SELECTOR_TOKEN_URI: &str = "0xc87b56dd"; // tokenURI(uint256)

/// keccak256("Transfer(address,address,uint256)")
const TRANSFER_TOPIC: &str = "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";

/// 32-byte zero word: the null origin that distinguishes a mint from a transfer
const ZERO_WORD: &str = "0x0000000000000000000000000000000000000000000000000000000000000000";

/// Connection settings for [`RpcLedger`]
#[derive(Debug, Clone)]
pub struct RpcLedgerConfig {
    /// JSON-RPC endpoint URL
    pub endpoint: String,
    /// Collection contract address (0x-prefixed)
    pub contract_address: String,
    /// Timeout per RPC request
    pub request_timeout: Duration,
    /// Interval between live mint polls
    pub poll_interval: Duration,
}

impl Default for RpcLedgerConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8545".to_string(),
            contract_address: ZERO_WORD[..42].to_string(),
            request_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_secs(4),
        }
    }
}

/// Ethereum JSON-RPC implementation of the ledger boundary
#[derive(Clone)]
pub struct RpcLedger {
    client: reqwest::Client,
    config: RpcLedgerConfig,
}

impl RpcLedger {
    pub fn new(config: RpcLedgerConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Issue one JSON-RPC request and return the `result` member
    async fn rpc(&self, method: &str, params: Value) -> Result<Value, EnumerationError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self
            .client
            .post(&self.config.endpoint)
            .timeout(self.config.request_timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| EnumerationError::LedgerUnreachable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(EnumerationError::LedgerUnreachable(format!(
                "{} returned status {}",
                method,
                response.status()
            )));
        }

        let envelope: Value = response
            .json()
            .await
            .map_err(|e| EnumerationError::MalformedResponse(e.to_string()))?;

        if let Some(err) = envelope.get("error") {
            return Err(EnumerationError::MalformedResponse(format!(
                "{method} failed: {err}"
            )));
        }

        envelope
            .get("result")
            .cloned()
            .ok_or_else(|| EnumerationError::MalformedResponse(format!("{method}: no result")))
    }

    /// `eth_call` against the collection contract, returning raw hex data
    async fn eth_call(&self, calldata: String) -> Result<String, EnumerationError> {
        let result = self
            .rpc(
                "eth_call",
                json!([{ "to": self.config.contract_address, "data": calldata }, "latest"]),
            )
            .await?;

        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| EnumerationError::MalformedResponse("eth_call: non-string result".into()))
    }
}

#[async_trait]
impl Ledger for RpcLedger {
    async fn total_supply(&self) -> Result<u64, EnumerationError> {
        let data = self.eth_call(SELECTOR_TOTAL_SUPPLY.to_string()).await?;
        decode_uint_word(&data)
    }

    async fn identifier_at_index(&self, index: u64) -> Result<u64, EnumerationError> {
        let calldata = format!("{}{}", SELECTOR_TOKEN_BY_INDEX, encode_uint_word(index));
        let data = self.eth_call(calldata).await?;
        decode_uint_word(&data)
    }

    async fn metadata_pointer(&self, token_id: u64) -> Result<MetadataPointer, EnumerationError> {
        let calldata = format!("{}{}", SELECTOR_TOKEN_URI, encode_uint_word(token_id));
        let data = self.eth_call(calldata).await?;
        Ok(MetadataPointer::new(decode_abi_string(&data)?))
    }

    async fn mint_logs(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<MintNotice>, EnumerationError> {
        let result = self
            .rpc(
                "eth_getLogs",
                json!([{
                    "address": self.config.contract_address,
                    "fromBlock": format!("0x{from_block:x}"),
                    "toBlock": format!("0x{to_block:x}"),
                    // topic filter: Transfer events whose origin is the zero
                    // address, i.e. mints only
                    "topics": [TRANSFER_TOPIC, ZERO_WORD],
                }]),
            )
            .await?;

        let logs = result
            .as_array()
            .ok_or_else(|| EnumerationError::MalformedResponse("eth_getLogs: not an array".into()))?;

        let mut notices = Vec::with_capacity(logs.len());
        for log in logs {
            notices.push(parse_mint_log(log)?);
        }

        debug!(
            from_block,
            to_block,
            count = notices.len(),
            "swept mint logs"
        );
        Ok(notices)
    }

    async fn chain_head(&self) -> Result<u64, EnumerationError> {
        let result = self.rpc("eth_blockNumber", json!([])).await?;
        let hex = result.as_str().ok_or_else(|| {
            EnumerationError::MalformedResponse("eth_blockNumber: non-string result".into())
        })?;
        parse_quantity(hex)
    }

    fn subscribe_mints(&self) -> BoxStream<'static, MintNotice> {
        let (tx, rx) = mpsc::unbounded();
        let ledger = self.clone();

        tokio::spawn(async move {
            // History up to the current head belongs to backfill; the
            // subscription starts delivering from the first head it observes.
            let mut last_seen: Option<u64> = None;

            loop {
                tokio::time::sleep(ledger.config.poll_interval).await;
                if tx.is_closed() {
                    debug!("mint subscription dropped, stopping poll task");
                    return;
                }

                let head = match ledger.chain_head().await {
                    Ok(head) => head,
                    Err(e) => {
                        warn!(error = %e, "mint poll: chain head read failed");
                        continue;
                    }
                };

                let from = match last_seen {
                    None => {
                        last_seen = Some(head);
                        continue;
                    }
                    Some(seen) if head > seen => seen + 1,
                    Some(_) => continue,
                };

                match ledger.mint_logs(from, head).await {
                    Ok(notices) => {
                        for notice in notices {
                            if tx.unbounded_send(notice).is_err() {
                                return;
                            }
                        }
                        last_seen = Some(head);
                    }
                    Err(e) => {
                        // Window not advanced; the next poll retries it
                        warn!(error = %e, from, to = head, "mint poll: log sweep failed");
                    }
                }
            }
        });

        Box::pin(rx)
    }
}

// =============================================================================
// ABI helpers
// =============================================================================

/// Encode a u64 as a left-padded 32-byte ABI word (without 0x prefix)
fn encode_uint_word(value: u64) -> String {
    format!("{value:064x}")
}

/// Decode a single 32-byte ABI word into a u64
fn decode_uint_word(data: &str) -> Result<u64, EnumerationError> {
    let hex = data.strip_prefix("0x").unwrap_or(data);
    if hex.len() != 64 {
        return Err(EnumerationError::MalformedResponse(format!(
            "expected 32-byte word, got {} hex chars",
            hex.len()
        )));
    }
    // Anything above u64 range is not a token id or supply we can represent
    if hex[..48].bytes().any(|b| b != b'0') {
        return Err(EnumerationError::MalformedResponse(
            "uint word exceeds u64 range".into(),
        ));
    }
    u64::from_str_radix(&hex[48..], 16)
        .map_err(|e| EnumerationError::MalformedResponse(e.to_string()))
}

/// Decode an ABI-encoded dynamic string return value
fn decode_abi_string(data: &str) -> Result<String, EnumerationError> {
    let hex = data.strip_prefix("0x").unwrap_or(data);
    let bytes = hex::decode(hex)
        .map_err(|e| EnumerationError::MalformedResponse(format!("bad hex: {e}")))?;

    let offset = word_as_usize(&bytes, 0)?;
    let len = word_as_usize(&bytes, offset)?;
    let start = offset + 32;
    let end = start
        .checked_add(len)
        .filter(|&end| end <= bytes.len())
        .ok_or_else(|| EnumerationError::MalformedResponse("string data out of bounds".into()))?;

    String::from_utf8(bytes[start..end].to_vec())
        .map_err(|e| EnumerationError::MalformedResponse(format!("non-utf8 string: {e}")))
}

/// Read a 32-byte big-endian word at `at` as usize
fn word_as_usize(bytes: &[u8], at: usize) -> Result<usize, EnumerationError> {
    let word = bytes
        .get(at..at + 32)
        .ok_or_else(|| EnumerationError::MalformedResponse("truncated ABI word".into()))?;
    if word[..24].iter().any(|&b| b != 0) {
        return Err(EnumerationError::MalformedResponse(
            "ABI word exceeds usize range".into(),
        ));
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&word[24..]);
    Ok(u64::from_be_bytes(buf) as usize)
}

/// Parse a JSON-RPC hex quantity ("0x1a") into a u64
fn parse_quantity(hex: &str) -> Result<u64, EnumerationError> {
    let digits = hex.strip_prefix("0x").unwrap_or(hex);
    if digits.is_empty() {
        return Err(EnumerationError::MalformedResponse("empty quantity".into()));
    }
    u64::from_str_radix(digits, 16)
        .map_err(|e| EnumerationError::MalformedResponse(format!("bad quantity '{hex}': {e}")))
}

/// Extract a [`MintNotice`] from one `eth_getLogs` entry
fn parse_mint_log(log: &Value) -> Result<MintNotice, EnumerationError> {
    let topics = log
        .get("topics")
        .and_then(Value::as_array)
        .ok_or_else(|| EnumerationError::MalformedResponse("log without topics".into()))?;

    // topics: [event signature, from, to, tokenId]
    let token_word = topics
        .get(3)
        .and_then(Value::as_str)
        .ok_or_else(|| EnumerationError::MalformedResponse("log without tokenId topic".into()))?;
    let token_id = decode_uint_word(token_word)?;

    let block_order = log
        .get("blockNumber")
        .and_then(Value::as_str)
        .map(parse_quantity)
        .transpose()?
        .unwrap_or(0);

    let log_index = log
        .get("logIndex")
        .and_then(Value::as_str)
        .map(parse_quantity)
        .transpose()?
        .unwrap_or(0);

    Ok(MintNotice {
        token_id,
        block_order,
        log_index,
    })
}
