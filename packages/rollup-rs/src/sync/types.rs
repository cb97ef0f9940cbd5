//! zkSync operator wire types
//!
//! Shapes of the JSON-RPC requests and responses exchanged with the L2
//! operator. Amounts travel as decimal strings, field names are camelCase.

use std::collections::HashMap;
use std::fmt;

use alloy::primitives::{Address, U256};
use eyre::{eyre, Result};
use serde::{Deserialize, Serialize};

/// (De)serialize a `U256` as a decimal string, accepting `0x` hex and bare
/// JSON numbers on input
pub mod u256_decimal {
    use alloy::primitives::U256;
    use serde::{de, Deserialize, Deserializer, Serializer};
    use std::str::FromStr;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Num(u64),
    }

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Str(s) => U256::from_str(s.trim()).map_err(de::Error::custom),
            Raw::Num(n) => Ok(U256::from(n)),
        }
    }

    /// Same encoding for `{symbol: amount}` maps
    pub mod map {
        use super::Raw;
        use alloy::primitives::U256;
        use serde::{de, Deserialize, Deserializer};
        use std::collections::HashMap;
        use std::str::FromStr;

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<HashMap<String, U256>, D::Error> {
            let raw = HashMap::<String, Raw>::deserialize(deserializer)?;
            raw.into_iter()
                .map(|(symbol, amount)| {
                    let value = match amount {
                        Raw::Str(s) => U256::from_str(s.trim()).map_err(de::Error::custom)?,
                        Raw::Num(n) => U256::from(n),
                    };
                    Ok((symbol, value))
                })
                .collect()
        }
    }
}

// ============================================================================
// Tokens
// ============================================================================

/// A token known to the L2 network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub id: u16,
    pub address: Address,
    pub symbol: String,
    pub decimals: u8,
}

impl Token {
    /// ETH is registered with the zero address
    pub fn is_eth(&self) -> bool {
        self.address == Address::ZERO
    }
}

/// Token registry as returned by `tokens()`, keyed by symbol
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tokens(pub HashMap<String, Token>);

impl Tokens {
    /// Look a token up by symbol (case-insensitive) or base-chain address
    pub fn resolve(&self, token: &str) -> Result<&Token> {
        if let Ok(address) = token.parse::<Address>() {
            if let Some(found) = self.0.values().find(|t| t.address == address) {
                return Ok(found);
            }
        }
        self.0
            .values()
            .find(|t| t.symbol.eq_ignore_ascii_case(token))
            .ok_or_else(|| eyre!("Token '{}' is not supported by the L2 network", token))
    }

    pub fn by_id(&self, id: u16) -> Option<&Token> {
        self.0.values().find(|t| t.id == id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ============================================================================
// Accounts
// ============================================================================

/// Hash of an account's L2 signing key, `sync:` followed by 20 hex bytes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PubKeyHash(pub String);

impl PubKeyHash {
    pub const PREFIX: &'static str = "sync:";

    /// Hash carried by accounts whose signing key was never set
    pub fn zero() -> Self {
        PubKeyHash(format!("{}{}", Self::PREFIX, "0".repeat(40)))
    }

    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        PubKeyHash(format!("{}{}", Self::PREFIX, hex::encode(bytes)))
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::zero()
    }

    /// The 20 hex bytes without prefix
    pub fn hex(&self) -> &str {
        self.0.strip_prefix(Self::PREFIX).unwrap_or(&self.0)
    }
}

impl fmt::Display for PubKeyHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which side of the committed/verified split a balance is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BalanceView {
    /// Accepted by the operator, proof not yet on the base chain
    #[default]
    Committed,
    /// Proven on the base chain
    Verified,
}

impl fmt::Display for BalanceView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BalanceView::Committed => f.write_str("committed"),
            BalanceView::Verified => f.write_str("verified"),
        }
    }
}

/// One view of an account
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSnapshot {
    #[serde(with = "u256_decimal::map", default)]
    pub balances: HashMap<String, U256>,
    pub nonce: u32,
    pub pub_key_hash: PubKeyHash,
}

impl AccountSnapshot {
    pub fn empty() -> Self {
        Self {
            balances: HashMap::new(),
            nonce: 0,
            pub_key_hash: PubKeyHash::zero(),
        }
    }

    pub fn balance(&self, symbol: &str) -> U256 {
        self.balances.get(symbol).copied().unwrap_or(U256::ZERO)
    }
}

/// Deposits seen on the base chain but not yet processed by the operator
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DepositingState {
    #[serde(default)]
    pub balances: HashMap<String, serde_json::Value>,
}

/// Response of `account_info(address)`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountState {
    pub address: Address,
    /// Assigned by the operator when the first deposit is processed
    pub id: Option<u32>,
    pub committed: AccountSnapshot,
    pub verified: AccountSnapshot,
    #[serde(default)]
    pub depositing: DepositingState,
}

impl AccountState {
    pub fn view(&self, view: BalanceView) -> &AccountSnapshot {
        match view {
            BalanceView::Committed => &self.committed,
            BalanceView::Verified => &self.verified,
        }
    }
}

/// Response of `contract_address()`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractAddress {
    pub main_contract: Address,
    #[serde(default)]
    pub gov_contract: String,
}

// ============================================================================
// Fees
// ============================================================================

/// Operation a fee is quoted for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TxFeeType {
    Transfer,
    Withdraw,
    #[serde(rename_all = "camelCase")]
    ChangePubKey { onchain_pubkey_auth: bool },
}

impl fmt::Display for TxFeeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxFeeType::Transfer => f.write_str("Transfer"),
            TxFeeType::Withdraw => f.write_str("Withdraw"),
            TxFeeType::ChangePubKey { .. } => f.write_str("ChangePubKey"),
        }
    }
}

/// Response of `get_tx_fee`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fee {
    #[serde(default)]
    pub fee_type: serde_json::Value,
    #[serde(with = "u256_decimal")]
    pub gas_tx_amount: U256,
    #[serde(with = "u256_decimal")]
    pub gas_price_wei: U256,
    #[serde(with = "u256_decimal")]
    pub gas_fee: U256,
    #[serde(with = "u256_decimal")]
    pub zkp_fee: U256,
    #[serde(with = "u256_decimal")]
    pub total_fee: U256,
}

impl Fee {
    /// A quote whose total is `total` and whose breakdown is zero
    pub fn flat(fee_type: TxFeeType, total: U256) -> Self {
        Self {
            fee_type: serde_json::to_value(fee_type).unwrap_or_default(),
            gas_tx_amount: U256::ZERO,
            gas_price_wei: U256::ZERO,
            gas_fee: U256::ZERO,
            zkp_fee: U256::ZERO,
            total_fee: total,
        }
    }
}

// ============================================================================
// Transactions
// ============================================================================

/// zk signature over a transaction, produced by a [`SyncSigner`](super::SyncSigner)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxSignature {
    pub pub_key: String,
    pub signature: String,
}

/// Ethereum co-signature sent alongside a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TxEthSignature {
    EthereumSignature { signature: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    pub account_id: u32,
    pub from: Address,
    pub to: Address,
    pub token: u16,
    #[serde(with = "u256_decimal")]
    pub amount: U256,
    #[serde(with = "u256_decimal")]
    pub fee: U256,
    pub nonce: u32,
    pub signature: Option<TxSignature>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Withdraw {
    pub account_id: u32,
    pub from: Address,
    pub to: Address,
    pub token: u16,
    #[serde(with = "u256_decimal")]
    pub amount: U256,
    #[serde(with = "u256_decimal")]
    pub fee: U256,
    pub nonce: u32,
    pub signature: Option<TxSignature>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePubKey {
    pub account_id: u32,
    pub account: Address,
    pub new_pk_hash: PubKeyHash,
    pub fee_token: u16,
    #[serde(with = "u256_decimal")]
    pub fee: U256,
    pub nonce: u32,
    pub eth_signature: Option<String>,
    pub signature: Option<TxSignature>,
}

/// An L2 transaction as submitted to `tx_submit`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SyncTx {
    Transfer(Transfer),
    Withdraw(Withdraw),
    ChangePubKey(ChangePubKey),
}

impl SyncTx {
    pub fn kind(&self) -> &'static str {
        match self {
            SyncTx::Transfer(_) => "Transfer",
            SyncTx::Withdraw(_) => "Withdraw",
            SyncTx::ChangePubKey(_) => "ChangePubKey",
        }
    }

    pub fn account_id(&self) -> u32 {
        match self {
            SyncTx::Transfer(tx) => tx.account_id,
            SyncTx::Withdraw(tx) => tx.account_id,
            SyncTx::ChangePubKey(tx) => tx.account_id,
        }
    }

    pub fn nonce(&self) -> u32 {
        match self {
            SyncTx::Transfer(tx) => tx.nonce,
            SyncTx::Withdraw(tx) => tx.nonce,
            SyncTx::ChangePubKey(tx) => tx.nonce,
        }
    }
}

/// Operator-assigned transaction hash, `sync-tx:<hex>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncTxHash(pub String);

impl fmt::Display for SyncTxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Receipts
// ============================================================================

/// Block an operation landed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockInfo {
    pub block_number: u64,
    pub committed: bool,
    pub verified: bool,
}

/// Response of `tx_info` and `ethop_info`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationReceipt {
    pub executed: bool,
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub fail_reason: Option<String>,
    #[serde(default)]
    pub block: Option<BlockInfo>,
}

impl OperationReceipt {
    pub fn is_committed(&self) -> bool {
        self.executed && self.block.is_some_and(|b| b.committed)
    }

    pub fn is_verified(&self) -> bool {
        self.executed && self.block.is_some_and(|b| b.verified)
    }

    /// The operator executed the operation and reported a failure
    pub fn failed(&self) -> bool {
        self.executed && self.success == Some(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_account_info_parses() {
        let value = json!({
            "address": "0x2d5bd25efa0ab97aaca4e888c5fbcb4866904e46",
            "id": 1,
            "committed": {
                "balances": {"GNT": "1000000000000000000000"},
                "nonce": 3,
                "pubKeyHash": "sync:0000000000000000000000000000000000000000"
            },
            "depositing": {"balances": {}},
            "verified": {
                "balances": {"GNT": "0x3635c9adc5dea00000"},
                "nonce": 2,
                "pubKeyHash": "sync:0000000000000000000000000000000000000000"
            }
        });

        let state: AccountState = serde_json::from_value(value).unwrap();
        assert_eq!(state.id, Some(1));
        assert_eq!(state.committed.nonce, 3);
        assert!(state.committed.pub_key_hash.is_zero());

        let thousand = U256::from(1000u64) * U256::from(10u64).pow(U256::from(18u64));
        assert_eq!(state.view(BalanceView::Committed).balance("GNT"), thousand);
        assert_eq!(state.view(BalanceView::Verified).balance("GNT"), thousand);
        assert_eq!(state.committed.balance("ETH"), U256::ZERO);
    }

    #[test]
    fn test_account_without_id() {
        let value = json!({
            "address": "0x2d5bd25efa0ab97aaca4e888c5fbcb4866904e46",
            "id": null,
            "committed": {"balances": {}, "nonce": 0, "pubKeyHash": "sync:0000000000000000000000000000000000000000"},
            "verified": {"balances": {}, "nonce": 0, "pubKeyHash": "sync:0000000000000000000000000000000000000000"}
        });
        let state: AccountState = serde_json::from_value(value).unwrap();
        assert!(state.id.is_none());
        assert!(state.depositing.balances.is_empty());
    }

    #[test]
    fn test_fee_type_encoding() {
        assert_eq!(serde_json::to_value(TxFeeType::Transfer).unwrap(), json!("Transfer"));
        assert_eq!(
            serde_json::to_value(TxFeeType::ChangePubKey {
                onchain_pubkey_auth: false
            })
            .unwrap(),
            json!({"ChangePubKey": {"onchainPubkeyAuth": false}})
        );
    }

    #[test]
    fn test_fee_parses_mock_operator_quote() {
        let value = json!({
            "feeType": "Withdraw",
            "gasTxAmount": "0",
            "gasPriceWei": "0",
            "gasFee": "0",
            "zkpFee": "0",
            "totalFee": "1500"
        });
        let fee: Fee = serde_json::from_value(value).unwrap();
        assert_eq!(fee.total_fee, U256::from(1500u64));
    }

    #[test]
    fn test_transfer_serializes_tagged_camel_case() {
        let tx = SyncTx::Transfer(Transfer {
            account_id: 7,
            from: Address::repeat_byte(0x01),
            to: Address::repeat_byte(0x02),
            token: 16,
            amount: U256::from(6_000u64),
            fee: U256::from(10u64),
            nonce: 1,
            signature: None,
        });

        let value = serde_json::to_value(&tx).unwrap();
        assert_eq!(value["type"], "Transfer");
        assert_eq!(value["accountId"], 7);
        assert_eq!(value["amount"], "6000");
        assert_eq!(value["fee"], "10");
        assert_eq!(value["nonce"], 1);
    }

    #[test]
    fn test_tokens_resolve() {
        let value = json!({
            "GNT": {"address": "0xFDFEF9D10d929cB3905C71400ce6be1990EA0F34", "id": 16, "symbol": "GNT", "decimals": 18},
            "ETH": {"address": "0x0000000000000000000000000000000000000000", "id": 0, "symbol": "ETH", "decimals": 18}
        });
        let tokens: Tokens = serde_json::from_value(value).unwrap();

        assert_eq!(tokens.resolve("gnt").unwrap().id, 16);
        assert_eq!(
            tokens
                .resolve("0xFDFEF9D10d929cB3905C71400ce6be1990EA0F34")
                .unwrap()
                .symbol,
            "GNT"
        );
        assert!(tokens.resolve("ETH").unwrap().is_eth());
        assert!(tokens.resolve("DAI").is_err());
        assert_eq!(tokens.by_id(0).unwrap().symbol, "ETH");
    }

    #[test]
    fn test_receipt_states() {
        let pending = OperationReceipt::default();
        assert!(!pending.is_committed());

        let committed = OperationReceipt {
            executed: true,
            success: Some(true),
            fail_reason: None,
            block: Some(BlockInfo {
                block_number: 5,
                committed: true,
                verified: false,
            }),
        };
        assert!(committed.is_committed());
        assert!(!committed.is_verified());
        assert!(!committed.failed());
    }
}
