//! Connected collaborators
//!
//! A [`Session`] is built once at startup and handed by reference to every
//! stage. It owns the base-chain client, the L2 operator client and the
//! faucet, plus what the operator told us at connect time.

use std::sync::Arc;

use rollup_rs::sync::{
    ContractAddress, EthDerivedSigner, SyncProvider, SyncSigner, Token, Tokens, Wallet,
};
use rollup_rs::{BaseChainClient, FaucetApi, HttpBaseChain, HttpFaucet, HttpSyncProvider, Identity};
use tracing::{debug, info, warn};

use crate::config::PocConfig;
use crate::error::{PocError, PocResult};

pub struct Session {
    config: PocConfig,
    base: Arc<dyn BaseChainClient>,
    provider: Arc<dyn SyncProvider>,
    faucet: Arc<dyn FaucetApi>,
    contracts: ContractAddress,
    tokens: Tokens,
}

impl Session {
    /// Connect to the configured endpoints. Any failure is a
    /// [`PocError::Connection`]; nothing is retried.
    pub async fn connect(config: PocConfig) -> PocResult<Self> {
        let base = HttpBaseChain::connect(config.eth_rpc_url.clone(), config.chain_id)
            .await
            .map_err(|e| PocError::Connection(format!("{:#}", e)))?;
        let provider = HttpSyncProvider::get_default_provider(&config.zksync_rpc_url)
            .map_err(|e| PocError::Connection(format!("{:#}", e)))?;
        let faucet = HttpFaucet::new(config.faucet_url.clone())
            .map_err(|e| PocError::Connection(format!("{:#}", e)))?;

        Self::from_parts(config, Arc::new(base), Arc::new(provider), Arc::new(faucet)).await
    }

    /// Build a session over already constructed collaborators. If the
    /// operator metadata cannot be read or does not match the configuration,
    /// the provider is disconnected before the error is returned.
    pub async fn from_parts(
        config: PocConfig,
        base: Arc<dyn BaseChainClient>,
        provider: Arc<dyn SyncProvider>,
        faucet: Arc<dyn FaucetApi>,
    ) -> PocResult<Self> {
        let (contracts, tokens) = match operator_metadata(&config, provider.as_ref()).await {
            Ok(metadata) => metadata,
            Err(e) => {
                release(provider.as_ref()).await;
                return Err(e);
            }
        };

        info!(
            main_contract = %contracts.main_contract,
            tokens = tokens.len(),
            chain_id = base.chain_id(),
            "Connected to L2 operator"
        );

        Ok(Self {
            config,
            base,
            provider,
            faucet,
            contracts,
            tokens,
        })
    }

    pub fn config(&self) -> &PocConfig {
        &self.config
    }

    pub fn base(&self) -> &dyn BaseChainClient {
        self.base.as_ref()
    }

    pub fn provider(&self) -> &dyn SyncProvider {
        self.provider.as_ref()
    }

    pub fn faucet(&self) -> &dyn FaucetApi {
        self.faucet.as_ref()
    }

    pub fn contracts(&self) -> &ContractAddress {
        &self.contracts
    }

    pub fn tokens(&self) -> &Tokens {
        &self.tokens
    }

    /// The token the lifecycle moves
    pub fn token(&self) -> PocResult<&Token> {
        self.tokens
            .resolve(&self.config.token_symbol)
            .map_err(|e| PocError::Config(e.to_string()))
    }

    /// L2 account handle for `identity`
    pub fn wallet(&self, identity: Identity) -> PocResult<Wallet> {
        let signer = Arc::new(EthDerivedSigner::from_identity(&identity)?);
        debug!(
            role = %identity.role(),
            pub_key_hash = %signer.pub_key_hash(),
            "L2 signer derived"
        );

        Ok(Wallet::new(
            identity,
            self.base.clone(),
            self.provider.clone(),
            signer,
            self.contracts.clone(),
            self.tokens.clone(),
        )
        .with_poll_interval(self.config.receipt_poll_interval))
    }

    /// Release the operator connection. Never fails the run.
    pub async fn disconnect(&self) {
        release(self.provider.as_ref()).await;
    }
}

/// Contract addresses and token registry, checked against the configured
/// token symbols
async fn operator_metadata(
    config: &PocConfig,
    provider: &dyn SyncProvider,
) -> PocResult<(ContractAddress, Tokens)> {
    let contracts = provider
        .contract_address()
        .await
        .map_err(|e| PocError::Connection(format!("L2 operator unreachable: {:#}", e)))?;
    let tokens = provider
        .tokens()
        .await
        .map_err(|e| PocError::Connection(format!("L2 operator unreachable: {:#}", e)))?;

    let token = tokens
        .resolve(&config.token_symbol)
        .map_err(|e| PocError::Config(e.to_string()))?;
    if token.address != config.ngnt_address {
        warn!(
            configured = %config.ngnt_address,
            registered = %token.address,
            symbol = %token.symbol,
            "Configured token address differs from the L2 token registry"
        );
    }
    if let Some(fee_token) = &config.fee_token {
        tokens
            .resolve(fee_token)
            .map_err(|e| PocError::Config(e.to_string()))?;
    }

    Ok((contracts, tokens))
}

async fn release(provider: &dyn SyncProvider) {
    match provider.disconnect().await {
        Ok(()) => debug!("L2 provider disconnected"),
        Err(e) => warn!(error = %e, "Failed to disconnect L2 provider"),
    }
}
