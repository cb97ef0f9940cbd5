//! Run configuration
//!
//! Every knob comes from the environment (optionally seeded from `.env`) and
//! falls back to the Rinkeby testnet deployment. A variable that is set but
//! cannot be parsed is an error, never silently replaced by its default.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use alloy::primitives::{utils::parse_units, Address, U256};
use url::Url;

use crate::error::{PocError, PocResult};

pub const DEFAULT_ETH_RPC_URL: &str = "http://1.geth.testnet.golem.network:55555";
pub const DEFAULT_ZKSYNC_RPC_URL: &str = "https://rinkeby-api.zksync.io/jsrpc";
pub const DEFAULT_FAUCET_URL: &str = "http://faucet.testnet.golem.network:4000/donate";
pub const DEFAULT_NGNT_ADDRESS: &str = "0xd94e3DC39d4Cad1DAd634e7eb585A57A19dC7EFE";
pub const DEFAULT_FAUCET_ADDRESS: &str = "0x59259943616265A03d775145a2eC371732E2B06C";

/// Base-chain native token decimals
const ETH_DECIMALS: u8 = 18;

#[derive(Debug, Clone)]
pub struct PocConfig {
    /// Base-chain JSON-RPC endpoint
    pub eth_rpc_url: Url,
    /// L2 operator: a network name (`rinkeby`, `localhost`, ...) or a URL
    pub zksync_rpc_url: String,
    /// Base-token faucet, addresses are appended as a path segment
    pub faucet_url: Url,
    /// Secondary ERC20 token
    pub ngnt_address: Address,
    /// Contract minting the secondary token on `create()`
    pub faucet_address: Address,
    pub chain_id: u64,

    /// L2 symbol of the secondary token
    pub token_symbol: String,
    /// Token paying the signing-key activation fee; `None` activates for free
    pub fee_token: Option<String>,
    /// Human-readable token amounts, converted with the token's decimals
    pub deposit_amount: String,
    pub transfer_amount: String,
    pub max_token_balance: String,

    /// Wei thresholds
    pub min_eth_balance: U256,
    pub min_gas_balance: U256,

    pub faucet_max_attempts: u32,
    pub faucet_retry_interval: Duration,
    pub faucet_confirmation: Duration,
    pub progress_interval: Duration,
    pub receipt_poll_interval: Duration,

    /// Where `--save` writes keystores
    pub keystore_dir: PathBuf,
}

impl PocConfig {
    /// Load from the process environment after applying `.env`, if present
    pub fn from_env() -> PocResult<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded .env from {:?}", path);
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> PocResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(&lookup);

        let fee_token = vars.string("FEE_TOKEN", "GNT");
        let deposit_amount = vars.amount("DEPOSIT_AMOUNT", "10.0")?;
        let transfer_amount = vars.amount("TRANSFER_AMOUNT", "6.0")?;
        let max_token_balance = vars.amount("MAX_TOKEN_BALANCE", "100.0")?;

        let config = Self {
            eth_rpc_url: vars.parse("ETH_RPC_URL", DEFAULT_ETH_RPC_URL)?,
            zksync_rpc_url: vars.string("ZKSYNC_RPC_URL", DEFAULT_ZKSYNC_RPC_URL),
            faucet_url: vars.parse("FAUCET_URL", DEFAULT_FAUCET_URL)?,
            ngnt_address: vars.parse("NGNT_ADDRESS", DEFAULT_NGNT_ADDRESS)?,
            faucet_address: vars.parse("FAUCET_ADDRESS", DEFAULT_FAUCET_ADDRESS)?,
            chain_id: vars.parse("CHAIN_ID", "4")?,

            token_symbol: vars.string("TOKEN_SYMBOL", "GNT"),
            fee_token: (!fee_token.is_empty()).then_some(fee_token),
            deposit_amount,
            transfer_amount,
            max_token_balance,

            min_eth_balance: vars.wei("MIN_ETH_BALANCE", "0.005")?,
            min_gas_balance: vars.wei("MIN_GAS_BALANCE", "0.0001")?,

            faucet_max_attempts: vars.parse("FAUCET_MAX_ATTEMPTS", "10")?,
            faucet_retry_interval: Duration::from_millis(
                vars.parse("FAUCET_RETRY_INTERVAL_MS", "1000")?,
            ),
            faucet_confirmation: Duration::from_secs(vars.parse("FAUCET_CONFIRMATION_SECS", "25")?),
            progress_interval: Duration::from_millis(vars.parse("PROGRESS_INTERVAL_MS", "1000")?),
            receipt_poll_interval: Duration::from_millis(
                vars.parse("RECEIPT_POLL_INTERVAL_MS", "1000")?,
            ),

            keystore_dir: PathBuf::from(vars.string("KEYSTORE_DIR", ".")),
        };

        if config.faucet_max_attempts == 0 {
            return Err(PocError::Config(
                "FAUCET_MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }
        if config.token_symbol.is_empty() {
            return Err(PocError::Config("TOKEN_SYMBOL must not be empty".to_string()));
        }

        Ok(config)
    }
}

struct Vars<'a, F: Fn(&str) -> Option<String>>(&'a F);

impl<F: Fn(&str) -> Option<String>> Vars<'_, F> {
    fn string(&self, key: &str, default: &str) -> String {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .unwrap_or_else(|| default.to_string())
    }

    fn parse<T>(&self, key: &str, default: &str) -> PocResult<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = self.string(key, default);
        raw.parse::<T>()
            .map_err(|e| PocError::Config(format!("Invalid {} '{}': {}", key, raw, e)))
    }

    /// A decimal token amount; kept as text until the token's decimals are known
    fn amount(&self, key: &str, default: &str) -> PocResult<String> {
        let raw = self.string(key, default);
        parse_units(&raw, ETH_DECIMALS)
            .map_err(|e| PocError::Config(format!("Invalid {} '{}': {}", key, raw, e)))?;
        Ok(raw)
    }

    /// A decimal ETH amount converted to wei
    fn wei(&self, key: &str, default: &str) -> PocResult<U256> {
        let raw = self.amount(key, default)?;
        parse_units(&raw, ETH_DECIMALS)
            .map(|v| v.get_absolute())
            .map_err(|e| PocError::Config(format!("Invalid {} '{}': {}", key, raw, e)))
    }
}
