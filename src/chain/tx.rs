//! Legacy (pre-EIP-1559) transaction construction and EIP-155 signing.
//!
//! Only the small RLP subset a legacy transfer needs is implemented here:
//! byte strings and flat lists. Calldata for the ERC-20/721 calls the
//! engines issue is built from hard-coded selectors, verified in tests
//! against the keccak of their canonical signatures.

use k256::ecdsa::SigningKey;
use sha3::{Digest, Keccak256};

use super::error::ChainError;

// 4-byte function selectors
pub const SEL_ERC20_TRANSFER: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb]; // transfer(address,uint256)
pub const SEL_ERC20_BALANCE_OF: [u8; 4] = [0x70, 0xa0, 0x82, 0x31]; // balanceOf(address)
pub const SEL_ERC20_DECIMALS: [u8; 4] = [0x31, 0x3c, 0xe5, 0x67]; // decimals()
pub const SEL_ERC721_OWNER_OF: [u8; 4] = [0x63, 0x52, 0x21, 0x1e]; // ownerOf(uint256)
pub const SEL_ERC721_TRANSFER_FROM: [u8; 4] = [0x23, 0xb8, 0x72, 0xdd]; // transferFrom(address,address,uint256)

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

/// RLP-encode a byte string.
fn rlp_bytes(data: &[u8], out: &mut Vec<u8>) {
    if data.len() == 1 && data[0] < 0x80 {
        out.push(data[0]);
    } else if data.len() <= 55 {
        out.push(0x80 + data.len() as u8);
        out.extend_from_slice(data);
    } else {
        let len_be = minimal_be(data.len() as u128);
        out.push(0xb7 + len_be.len() as u8);
        out.extend_from_slice(&len_be);
        out.extend_from_slice(data);
    }
}

/// RLP list header for an already-encoded payload.
fn rlp_list(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 4);
    if payload.len() <= 55 {
        out.push(0xc0 + payload.len() as u8);
    } else {
        let len_be = minimal_be(payload.len() as u128);
        out.push(0xf7 + len_be.len() as u8);
        out.extend_from_slice(&len_be);
    }
    out.extend_from_slice(payload);
    out
}

/// Minimal big-endian representation; zero encodes as the empty string.
fn minimal_be(value: u128) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let first = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    bytes[first..].to_vec()
}

fn rlp_uint(value: u128, out: &mut Vec<u8>) {
    rlp_bytes(&minimal_be(value), out);
}

#[derive(Debug, Clone)]
pub struct LegacyTx {
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u128,
    pub to: [u8; 20],
    pub value: u128,
    pub data: Vec<u8>,
}

impl LegacyTx {
    /// EIP-155 signing hash: keccak of the tx fields with
    /// (chain_id, 0, 0) appended.
    pub fn sighash(&self, chain_id: u64) -> [u8; 32] {
        let mut payload = Vec::new();
        rlp_uint(self.nonce as u128, &mut payload);
        rlp_uint(self.gas_price, &mut payload);
        rlp_uint(self.gas_limit, &mut payload);
        rlp_bytes(&self.to, &mut payload);
        rlp_uint(self.value, &mut payload);
        rlp_bytes(&self.data, &mut payload);
        rlp_uint(chain_id as u128, &mut payload);
        rlp_bytes(&[], &mut payload);
        rlp_bytes(&[], &mut payload);
        keccak256(&rlp_list(&payload))
    }

    /// Sign and serialize to the raw bytes `eth_sendRawTransaction` takes.
    pub fn sign(&self, key: &SigningKey, chain_id: u64) -> Result<Vec<u8>, ChainError> {
        let sighash = self.sighash(chain_id);
        let (signature, recovery_id) = key
            .sign_prehash_recoverable(&sighash)
            .map_err(|e| ChainError::InvalidResponse(format!("signing failed: {}", e)))?;

        let v = chain_id * 2 + 35 + recovery_id.to_byte() as u64;
        let sig_bytes = signature.to_bytes();
        let r = strip_leading_zeros(&sig_bytes[..32]);
        let s = strip_leading_zeros(&sig_bytes[32..]);

        let mut payload = Vec::new();
        rlp_uint(self.nonce as u128, &mut payload);
        rlp_uint(self.gas_price, &mut payload);
        rlp_uint(self.gas_limit, &mut payload);
        rlp_bytes(&self.to, &mut payload);
        rlp_uint(self.value, &mut payload);
        rlp_bytes(&self.data, &mut payload);
        rlp_uint(v as u128, &mut payload);
        rlp_bytes(r, &mut payload);
        rlp_bytes(s, &mut payload);
        Ok(rlp_list(&payload))
    }
}

fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let first = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    &bytes[first..]
}

pub fn parse_address(address: &str) -> Result<[u8; 20], ChainError> {
    let stripped = address.strip_prefix("0x").unwrap_or(address);
    let bytes = hex::decode(stripped)
        .map_err(|e| ChainError::InvalidResponse(format!("bad address {}: {}", address, e)))?;
    bytes
        .try_into()
        .map_err(|_| ChainError::InvalidResponse(format!("address wrong length: {}", address)))
}

/// Parse a 0x-prefixed hex quantity as returned by JSON-RPC.
pub fn parse_quantity(hex_str: &str) -> Result<u128, ChainError> {
    let stripped = hex_str.strip_prefix("0x").unwrap_or(hex_str);
    if stripped.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(stripped, 16)
        .map_err(|e| ChainError::InvalidResponse(format!("bad quantity {}: {}", hex_str, e)))
}

fn pad32_address(address: &[u8; 20]) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(address);
    word
}

fn pad32_uint(value: u128) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

pub fn erc20_transfer_data(to: &[u8; 20], amount: u128) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + 64);
    data.extend_from_slice(&SEL_ERC20_TRANSFER);
    data.extend_from_slice(&pad32_address(to));
    data.extend_from_slice(&pad32_uint(amount));
    data
}

pub fn erc20_balance_of_data(owner: &[u8; 20]) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + 32);
    data.extend_from_slice(&SEL_ERC20_BALANCE_OF);
    data.extend_from_slice(&pad32_address(owner));
    data
}

pub fn erc721_owner_of_data(token_id: u128) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + 32);
    data.extend_from_slice(&SEL_ERC721_OWNER_OF);
    data.extend_from_slice(&pad32_uint(token_id));
    data
}

pub fn erc721_transfer_from_data(from: &[u8; 20], to: &[u8; 20], token_id: u128) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + 96);
    data.extend_from_slice(&SEL_ERC721_TRANSFER_FROM);
    data.extend_from_slice(&pad32_address(from));
    data.extend_from_slice(&pad32_address(to));
    data.extend_from_slice(&pad32_uint(token_id));
    data
}
