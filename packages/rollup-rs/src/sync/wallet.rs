//! L2 account handle
//!
//! A [`Wallet`] binds an [`Identity`] to the base chain and the L2 operator.
//! Reads always go to the operator; nothing is cached apart from the
//! contract address and token registry fetched at construction.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, Bytes, Uint, U256};
use alloy::sol_types::SolCall;
use eyre::{eyre, Result, WrapErr};
use tracing::{debug, info};

use super::operation::{OperationHandle, PendingOperation};
use super::packing::{closest_packable_fee_amount, is_fee_amount_packable, is_token_amount_packable};
use super::provider::SyncProvider;
use super::signer::{eth_message, sign_eth_message, EthDerivedSigner, SyncSigner};
use super::types::{
    AccountState, BalanceView, ChangePubKey, ContractAddress, SyncTx, Token, Tokens, Transfer,
    TxEthSignature, TxFeeType, Withdraw,
};
use crate::evm::contracts::ZkSync;
use crate::evm::{BaseChainClient, BaseReceipt};
use crate::identity::Identity;

/// Receipt polling period when none is configured
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Largest amount `depositERC20` accepts (`uint104`)
fn max_deposit() -> U256 {
    (U256::from(1u64) << 104usize) - U256::from(1u64)
}

pub struct Wallet {
    identity: Identity,
    base: Arc<dyn BaseChainClient>,
    provider: Arc<dyn SyncProvider>,
    signer: Arc<dyn SyncSigner>,
    contracts: ContractAddress,
    tokens: Tokens,
    poll_interval: Duration,
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.identity.address())
            .field("role", &self.identity.role())
            .field("main_contract", &self.contracts.main_contract)
            .finish()
    }
}

impl Wallet {
    /// Wallet whose L2 key is derived from the identity's base-chain key.
    /// Fetches the contract address and token registry from the operator.
    pub async fn from_eth_signer(
        identity: Identity,
        base: Arc<dyn BaseChainClient>,
        provider: Arc<dyn SyncProvider>,
    ) -> Result<Self> {
        let contracts = provider
            .contract_address()
            .await
            .wrap_err("Failed to fetch L2 contract address")?;
        let tokens = provider
            .tokens()
            .await
            .wrap_err("Failed to fetch L2 token registry")?;
        let signer = Arc::new(EthDerivedSigner::from_identity(&identity)?);

        Ok(Self::new(identity, base, provider, signer, contracts, tokens))
    }

    pub fn new(
        identity: Identity,
        base: Arc<dyn BaseChainClient>,
        provider: Arc<dyn SyncProvider>,
        signer: Arc<dyn SyncSigner>,
        contracts: ContractAddress,
        tokens: Tokens,
    ) -> Self {
        Self {
            identity,
            base,
            provider,
            signer,
            contracts,
            tokens,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn address(&self) -> Address {
        self.identity.address()
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn contracts(&self) -> &ContractAddress {
        &self.contracts
    }

    pub fn tokens(&self) -> &Tokens {
        &self.tokens
    }

    pub fn signer(&self) -> &dyn SyncSigner {
        self.signer.as_ref()
    }

    pub fn token(&self, token: &str) -> Result<&Token> {
        self.tokens.resolve(token)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub async fn account_state(&self) -> Result<AccountState> {
        self.provider
            .account_info(self.address())
            .await
            .wrap_err_with(|| format!("Failed to fetch L2 account {}", self.address()))
    }

    /// L2 account id, assigned once the first deposit is processed
    pub async fn get_account_id(&self) -> Result<Option<u32>> {
        Ok(self.account_state().await?.id)
    }

    /// Whether the committed key hash on L2 is this wallet's
    pub async fn is_signing_key_set(&self) -> Result<bool> {
        let state = self.account_state().await?;
        Ok(state.committed.pub_key_hash == *self.signer.pub_key_hash())
    }

    pub async fn get_balance(&self, token: &str, view: BalanceView) -> Result<U256> {
        let token = self.token(token)?;
        let state = self.account_state().await?;
        Ok(state.view(view).balance(&token.symbol))
    }

    /// Fee quote for an operation paid in `token`, rounded to a packable fee
    pub async fn quote_fee(&self, tx_type: TxFeeType, token: &str) -> Result<U256> {
        let token = self.token(token)?;
        let fee = self
            .provider
            .get_tx_fee(tx_type, self.address(), &token.symbol)
            .await
            .wrap_err_with(|| format!("Failed to quote {} fee", tx_type))?;
        Ok(closest_packable_fee_amount(fee.total_fee))
    }

    async fn active_account(&self) -> Result<(u32, u32)> {
        let state = self.account_state().await?;
        let id = state
            .id
            .ok_or_else(|| eyre!("Account {} has no L2 account id yet", self.address()))?;
        Ok((id, state.committed.nonce))
    }

    // ========================================================================
    // Priority operations (sent on the base chain)
    // ========================================================================

    /// Deposit `amount` of `token` from this identity's base-chain balance to
    /// the L2 account `to`. ERC20 deposits need an allowance for the main
    /// contract first.
    pub async fn deposit_to_sync_from_ethereum(
        &self,
        to: Address,
        token: &str,
        amount: U256,
    ) -> Result<PendingOperation> {
        let token = self.token(token)?.clone();
        if amount > max_deposit() {
            return Err(eyre!("Deposit amount {} exceeds uint104", amount));
        }

        let (data, value) = if token.is_eth() {
            (ZkSync::depositETHCall { _franklinAddr: to }.abi_encode(), amount)
        } else {
            let limbs = amount.as_limbs();
            let call = ZkSync::depositERC20Call {
                _token: token.address,
                _amount: Uint::<104, 2>::from_limbs([limbs[0], limbs[1]]),
                _franklinAddr: to,
            };
            (call.abi_encode(), U256::ZERO)
        };

        info!(
            from = %self.address(),
            to = %to,
            token = %token.symbol,
            amount = %amount,
            "Depositing to L2"
        );
        self.priority_operation("Deposit", data.into(), value).await
    }

    /// Ask the settlement contract to move the whole committed balance of
    /// `token` out of L2, bypassing the operator's transaction queue
    pub async fn emergency_withdraw(&self, token: &str) -> Result<PendingOperation> {
        let token = self.token(token)?.clone();
        let (account_id, _) = self.active_account().await?;

        let data = ZkSync::fullExitCall {
            _accountId: account_id,
            _token: token.address,
        }
        .abi_encode();

        info!(
            address = %self.address(),
            account_id = account_id,
            token = %token.symbol,
            "Requesting emergency withdrawal"
        );
        self.priority_operation("FullExit", data.into(), U256::ZERO)
            .await
    }

    async fn priority_operation(
        &self,
        operation: &'static str,
        data: Bytes,
        value: U256,
    ) -> Result<PendingOperation> {
        let receipt = self
            .base
            .send_transaction(&self.identity, self.contracts.main_contract, data, value)
            .await
            .wrap_err_with(|| format!("{} transaction failed", operation))?;

        let serial_id = receipt
            .decode_logs::<ZkSync::NewPriorityRequest>()
            .first()
            .map(|event| event.serialId)
            .ok_or_else(|| {
                eyre!(
                    "{} transaction {} emitted no NewPriorityRequest",
                    operation,
                    receipt.tx_hash
                )
            })?;
        debug!(operation = operation, serial_id = serial_id, "Priority operation queued");

        Ok(PendingOperation::new(
            self.provider.clone(),
            operation,
            OperationHandle::Priority(serial_id),
            self.poll_interval,
        )
        .with_base_receipt(receipt))
    }

    // ========================================================================
    // L2 transactions
    // ========================================================================

    /// Register this wallet's L2 key, paying `fee` in `fee_token`
    pub async fn set_signing_key(&self, fee_token: &str, fee: U256) -> Result<PendingOperation> {
        let token = self.token(fee_token)?.clone();
        let (account_id, nonce) = self.active_account().await?;

        let mut change = ChangePubKey {
            account_id,
            account: self.address(),
            new_pk_hash: self.signer.pub_key_hash().clone(),
            fee_token: token.id,
            fee,
            nonce,
            eth_signature: None,
            signature: None,
        };
        let message = eth_message(&SyncTx::ChangePubKey(change.clone()), &token);
        let TxEthSignature::EthereumSignature { signature } =
            sign_eth_message(&self.identity, &message)?;
        change.eth_signature = Some(signature);

        let tx = SyncTx::ChangePubKey(change);
        self.submit(tx, &token, false).await
    }

    /// Transfer `amount` of `token` to `to` on L2. `amount` must already be
    /// packable; a missing fee is quoted.
    pub async fn sync_transfer(
        &self,
        to: Address,
        token: &str,
        amount: U256,
        fee: Option<U256>,
    ) -> Result<PendingOperation> {
        let token = self.token(token)?.clone();
        let fee = match fee {
            Some(fee) => fee,
            None => self.quote_fee(TxFeeType::Transfer, &token.symbol).await?,
        };
        self.check_packable(amount, fee)?;
        let (account_id, nonce) = self.active_account().await?;

        let tx = SyncTx::Transfer(Transfer {
            account_id,
            from: self.address(),
            to,
            token: token.id,
            amount,
            fee,
            nonce,
            signature: None,
        });
        self.submit(tx, &token, true).await
    }

    /// Withdraw `amount` of `token` from L2 to `eth_address` on the base
    /// chain; completes once verified
    pub async fn withdraw_from_sync_to_ethereum(
        &self,
        eth_address: Address,
        token: &str,
        amount: U256,
        fee: Option<U256>,
    ) -> Result<PendingOperation> {
        let token = self.token(token)?.clone();
        let fee = match fee {
            Some(fee) => fee,
            None => self.quote_fee(TxFeeType::Withdraw, &token.symbol).await?,
        };
        // Withdrawals carry the full-precision amount; only the fee is packed
        if !is_fee_amount_packable(fee) {
            return Err(eyre!("Fee {} is not packable", fee));
        }
        let (account_id, nonce) = self.active_account().await?;

        let tx = SyncTx::Withdraw(Withdraw {
            account_id,
            from: self.address(),
            to: eth_address,
            token: token.id,
            amount,
            fee,
            nonce,
            signature: None,
        });
        self.submit(tx, &token, true).await
    }

    fn check_packable(&self, amount: U256, fee: U256) -> Result<()> {
        if !is_token_amount_packable(amount) {
            return Err(eyre!("Amount {} is not packable", amount));
        }
        if !is_fee_amount_packable(fee) {
            return Err(eyre!("Fee {} is not packable", fee));
        }
        Ok(())
    }

    async fn submit(&self, mut tx: SyncTx, token: &Token, co_sign: bool) -> Result<PendingOperation> {
        let operation = tx.kind();
        let eth_signature = if co_sign {
            Some(sign_eth_message(&self.identity, &eth_message(&tx, token))?)
        } else {
            None
        };

        let signature = self.signer.sign_tx(&tx)?;
        match &mut tx {
            SyncTx::Transfer(t) => t.signature = signature,
            SyncTx::Withdraw(w) => w.signature = signature,
            SyncTx::ChangePubKey(c) => c.signature = signature,
        }

        let nonce = tx.nonce();
        let hash = self.provider.submit_tx(tx, eth_signature).await?;
        info!(
            operation = operation,
            address = %self.address(),
            nonce = nonce,
            tx_hash = %hash,
            "L2 transaction submitted"
        );

        Ok(PendingOperation::new(
            self.provider.clone(),
            operation,
            OperationHandle::Tx(hash),
            self.poll_interval,
        ))
    }

    // ========================================================================
    // Pending balance recovery (settlement contract)
    // ========================================================================

    /// Amount of `token` processed out of L2 and claimable by this identity
    pub async fn balance_to_withdraw(&self, token: &str) -> Result<U256> {
        let token = self.token(token)?;
        let data = ZkSync::getBalanceToWithdrawCall {
            _address: self.address(),
            _tokenId: token.id,
        }
        .abi_encode();

        let output = self
            .base
            .call(self.contracts.main_contract, data.into())
            .await
            .wrap_err("Failed to query balance to withdraw")?;
        let balance = ZkSync::getBalanceToWithdrawCall::abi_decode_returns(&output, true)
            .map_err(|e| eyre!("Malformed getBalanceToWithdraw output: {}", e))?;
        Ok(U256::from(balance._0))
    }

    /// Claim `amount` of `token` from the settlement contract to this identity
    pub async fn withdraw_pending_balance(&self, token: &str, amount: U256) -> Result<BaseReceipt> {
        let token = self.token(token)?;
        let amount = u128::try_from(amount)
            .map_err(|_| eyre!("Pending balance {} exceeds uint128", amount))?;

        let data = if token.is_eth() {
            ZkSync::withdrawETHCall { _amount: amount }.abi_encode()
        } else {
            ZkSync::withdrawERC20Call {
                _token: token.address,
                _amount: amount,
            }
            .abi_encode()
        };

        info!(
            address = %self.address(),
            token = %token.symbol,
            amount = amount,
            "Claiming pending balance from settlement contract"
        );
        self.base
            .send_transaction(
                &self.identity,
                self.contracts.main_contract,
                data.into(),
                U256::ZERO,
            )
            .await
            .wrap_err("Pending balance withdrawal failed")
    }
}
