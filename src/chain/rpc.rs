//! JSON-RPC chain client.
//!
//! Read calls go straight through; `send` signs locally, submits the raw
//! transaction and polls for the receipt until one confirmation or the
//! configured timeout.

use async_trait::async_trait;
use k256::ecdsa::SigningKey;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use super::error::ChainError;
use super::tx::{
    LegacyTx, erc20_balance_of_data, erc20_transfer_data, erc721_owner_of_data,
    erc721_transfer_from_data, parse_address, parse_quantity,
};
use super::{ChainClient, TransferCall};
use crate::config::ChainConfig;

pub struct RpcChainClient {
    client: reqwest::Client,
    url: String,
    chain_id: u64,
    poll_interval: Duration,
    confirm_timeout: Duration,
}

#[derive(Serialize)]
struct JsonRpcRequest<T> {
    jsonrpc: &'static str,
    method: &'static str,
    params: T,
    id: u64,
}

#[derive(Deserialize)]
struct JsonRpcResponse<T> {
    #[allow(dead_code)]
    jsonrpc: String,
    result: Option<T>,
    error: Option<JsonRpcError>,
    #[allow(dead_code)]
    id: u64,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// eth_call / eth_estimateGas parameter object
#[derive(Serialize)]
struct CallObject {
    #[serde(skip_serializing_if = "Option::is_none")]
    from: Option<String>,
    to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct TxReceipt {
    block_number: Option<String>,
    status: Option<String>,
}

impl RpcChainClient {
    pub fn new(config: &ChainConfig) -> Result<Self, ChainError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ChainError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: config.rpc_url.clone(),
            chain_id: config.chain_id,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            confirm_timeout: Duration::from_secs(config.confirm_timeout_secs),
        })
    }

    async fn rpc_call<T, R>(&self, method: &'static str, params: T) -> Result<R, ChainError>
    where
        T: Serialize,
        R: for<'de> Deserialize<'de>,
    {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: 1,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ChainError::Transport(format!("HTTP request failed: {}", e)))?;

        let rpc_response: JsonRpcResponse<R> = response
            .json()
            .await
            .map_err(|e| ChainError::Transport(format!("Failed to parse response: {}", e)))?;

        if let Some(error) = rpc_response.error {
            return Err(ChainError::Rpc(format!(
                "{}: {}",
                error.code, error.message
            )));
        }

        rpc_response
            .result
            .ok_or_else(|| ChainError::InvalidResponse("No result in RPC response".to_string()))
    }

    fn build_tx(
        &self,
        call: &TransferCall,
        nonce: u64,
        gas_price: u128,
        gas_limit: u128,
    ) -> Result<LegacyTx, ChainError> {
        let (to, value, data) = match call {
            TransferCall::Native { to, value } => (parse_address(to)?, *value, vec![]),
            TransferCall::Token {
                contract,
                to,
                amount,
            } => (
                parse_address(contract)?,
                0,
                erc20_transfer_data(&parse_address(to)?, *amount),
            ),
            TransferCall::Nft {
                contract,
                from,
                to,
                token_id,
            } => (
                parse_address(contract)?,
                0,
                erc721_transfer_from_data(&parse_address(from)?, &parse_address(to)?, *token_id),
            ),
        };
        Ok(LegacyTx {
            nonce,
            gas_price,
            gas_limit,
            to,
            value,
            data,
        })
    }

    fn call_object(&self, from: &str, call: &TransferCall) -> CallObject {
        match call {
            TransferCall::Native { to, value } => CallObject {
                from: Some(from.to_string()),
                to: to.clone(),
                value: Some(format!("0x{:x}", value)),
                data: None,
            },
            TransferCall::Token {
                contract,
                to,
                amount,
            } => CallObject {
                from: Some(from.to_string()),
                to: contract.clone(),
                value: None,
                data: parse_address(to)
                    .ok()
                    .map(|a| format!("0x{}", hex::encode(erc20_transfer_data(&a, *amount)))),
            },
            TransferCall::Nft {
                contract,
                from: nft_from,
                to,
                token_id,
            } => CallObject {
                from: Some(from.to_string()),
                to: contract.clone(),
                value: None,
                data: match (parse_address(nft_from), parse_address(to)) {
                    (Ok(f), Ok(t)) => Some(format!(
                        "0x{}",
                        hex::encode(erc721_transfer_from_data(&f, &t, *token_id))
                    )),
                    _ => None,
                },
            },
        }
    }

    async fn wait_for_receipt(&self, tx_hash: &str) -> Result<(), ChainError> {
        let deadline = tokio::time::Instant::now() + self.confirm_timeout;
        loop {
            let receipt: Option<TxReceipt> = self
                .rpc_call("eth_getTransactionReceipt", (tx_hash,))
                .await?;

            if let Some(receipt) = receipt
                && receipt.block_number.is_some()
            {
                return match receipt.status.as_deref() {
                    Some("0x0") => Err(ChainError::TxRejected(format!(
                        "transaction {} reverted",
                        tx_hash
                    ))),
                    _ => Ok(()),
                };
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(ChainError::ConfirmationTimeout(format!(
                    "transaction {} not confirmed within {:?}",
                    tx_hash, self.confirm_timeout
                )));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

/// Extract a u128 from a 32-byte ABI word returned by eth_call.
fn parse_word_u128(word_hex: &str) -> Result<u128, ChainError> {
    let stripped = word_hex.strip_prefix("0x").unwrap_or(word_hex);
    if stripped.is_empty() {
        return Ok(0);
    }
    let tail = if stripped.len() > 32 {
        let (head, tail) = stripped.split_at(stripped.len() - 32);
        if head.bytes().any(|b| b != b'0') {
            return Err(ChainError::InvalidResponse(format!(
                "value exceeds u128: {}",
                word_hex
            )));
        }
        tail
    } else {
        stripped
    };
    u128::from_str_radix(tail, 16)
        .map_err(|e| ChainError::InvalidResponse(format!("bad word {}: {}", word_hex, e)))
}

/// Extract an address from a 32-byte ABI word returned by eth_call.
fn parse_word_address(word_hex: &str) -> Result<String, ChainError> {
    let stripped = word_hex.strip_prefix("0x").unwrap_or(word_hex);
    if stripped.len() < 40 {
        return Err(ChainError::InvalidResponse(format!(
            "word too short for address: {}",
            word_hex
        )));
    }
    Ok(format!(
        "0x{}",
        stripped[stripped.len() - 40..].to_lowercase()
    ))
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn native_balance(&self, address: &str) -> Result<u128, ChainError> {
        let result: String = self.rpc_call("eth_getBalance", (address, "latest")).await?;
        parse_quantity(&result)
    }

    async fn token_balance(&self, contract: &str, owner: &str) -> Result<u128, ChainError> {
        let data = format!(
            "0x{}",
            hex::encode(erc20_balance_of_data(&parse_address(owner)?))
        );
        let call = CallObject {
            from: None,
            to: contract.to_string(),
            value: None,
            data: Some(data),
        };
        let result: String = self.rpc_call("eth_call", (call, "latest")).await?;
        parse_word_u128(&result)
    }

    async fn nft_owner(&self, contract: &str, token_id: u128) -> Result<String, ChainError> {
        let data = format!("0x{}", hex::encode(erc721_owner_of_data(token_id)));
        let call = CallObject {
            from: None,
            to: contract.to_string(),
            value: None,
            data: Some(data),
        };
        let result: String = self.rpc_call("eth_call", (call, "latest")).await?;
        parse_word_address(&result)
    }

    async fn gas_price(&self) -> Result<u128, ChainError> {
        let result: String = self.rpc_call("eth_gasPrice", ()).await?;
        parse_quantity(&result)
    }

    async fn estimate_gas(&self, from: &str, call: &TransferCall) -> Result<u128, ChainError> {
        let call_obj = self.call_object(from, call);
        let result: String = self.rpc_call("eth_estimateGas", (call_obj,)).await?;
        parse_quantity(&result)
    }

    async fn pending_nonce(&self, address: &str) -> Result<u64, ChainError> {
        let result: String = self
            .rpc_call("eth_getTransactionCount", (address, "pending"))
            .await?;
        Ok(parse_quantity(&result)? as u64)
    }

    async fn send(
        &self,
        key: &SigningKey,
        call: &TransferCall,
        nonce: u64,
        gas_price: u128,
        gas_limit: u128,
    ) -> Result<String, ChainError> {
        let tx = self.build_tx(call, nonce, gas_price, gas_limit)?;
        let raw = tx.sign(key, self.chain_id)?;
        let raw_hex = format!("0x{}", hex::encode(raw));

        debug!(nonce, gas_price, gas_limit, "submitting raw transaction");
        let tx_hash: String = self.rpc_call("eth_sendRawTransaction", (raw_hex,)).await?;

        self.wait_for_receipt(&tx_hash).await?;
        info!(tx_hash = %tx_hash, "transaction confirmed");
        Ok(tx_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_word_u128() {
        let word = "0x0000000000000000000000000000000000000000000000000de0b6b3a7640000";
        assert_eq!(parse_word_u128(word).unwrap(), 10u128.pow(18));
        assert_eq!(parse_word_u128("0x").unwrap(), 0);
        // high 16 bytes set
        let big = "0x0000000000000000000000000000000100000000000000000000000000000000";
        assert!(parse_word_u128(big).is_err());
    }

    #[test]
    fn test_parse_word_address() {
        let word = "0x000000000000000000000000D8DA6BF26964aF9D7eEd9e03E53415D37aA96045";
        assert_eq!(
            parse_word_address(word).unwrap(),
            "0xd8da6bf26964af9d7eed9e03e53415d37aa96045"
        );
        assert!(parse_word_address("0x1234").is_err());
    }

    #[test]
    fn test_build_tx_variants() {
        let config = ChainConfig {
            rpc_url: "http://127.0.0.1:8545".to_string(),
            chain_id: 43113,
            request_timeout_secs: 30,
            confirm_timeout_secs: 120,
            poll_interval_ms: 100,
        };
        let client = RpcChainClient::new(&config).unwrap();

        let native = client
            .build_tx(
                &TransferCall::Native {
                    to: "0x3535353535353535353535353535353535353535".to_string(),
                    value: 100,
                },
                0,
                1,
                21_000,
            )
            .unwrap();
        assert_eq!(native.value, 100);
        assert!(native.data.is_empty());

        let token = client
            .build_tx(
                &TransferCall::Token {
                    contract: "0x4646464646464646464646464646464646464646".to_string(),
                    to: "0x3535353535353535353535353535353535353535".to_string(),
                    amount: 100,
                },
                0,
                1,
                60_000,
            )
            .unwrap();
        assert_eq!(token.value, 0);
        assert_eq!(token.data.len(), 68);
    }
}
