//! Simulated Network
//!
//! One in-memory world that plays every collaborator of the token lifecycle:
//! the base chain (ETH balances, the secondary ERC20, its faucet contract and
//! the settlement contract), the L2 operator and the HTTP faucet.
//!
//! L2 behaviour follows the operator's contract closely enough for ordering
//! bugs to show up:
//!
//! - a priority operation (deposit, full exit) is processed on the first
//!   `ethop_info` poll and verified on the next one
//! - a transaction is validated and committed when submitted; its second
//!   `tx_info` poll verifies it
//! - verifying an operation verifies everything committed before it
//! - transactions from unknown or locked accounts, with a stale nonce, an
//!   unpackable transfer amount or an insufficient committed balance are
//!   rejected; withdrawals carry full-precision amounts

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use alloy::primitives::{address, keccak256, Address, Bytes, Log, B256, U256};
use alloy::sol_types::{SolCall, SolEvent};
use async_trait::async_trait;
use eyre::{eyre, Result};
use tracing::debug;

use crate::evm::contracts::{op_type, Faucet, ZkSync, ERC20};
use crate::evm::{BaseChainClient, BaseReceipt};
use crate::faucet::FaucetApi;
use crate::identity::Identity;
use crate::sync::provider::{SyncProvider, TxRejected};
use crate::sync::types::{
    AccountSnapshot, AccountState, BalanceView, BlockInfo, ContractAddress, DepositingState, Fee,
    OperationReceipt, PubKeyHash, SyncTx, SyncTxHash, Token, Tokens, TxEthSignature, TxFeeType,
};
use crate::sync::{is_fee_amount_packable, is_token_amount_packable};

/// Secondary token (nGNT on Rinkeby)
pub const GNT_ADDRESS: Address = address!("d94e3dc39d4cad1dad634e7eb585a57a19dc7efe");
/// Contract minting the secondary token
pub const TOKEN_FAUCET_ADDRESS: Address = address!("59259943616265a03d775145a2ec371732e2b06c");
/// Settlement contract
pub const MAIN_CONTRACT: Address = address!("82f67958a5474e40e1485742d648c0b0686b6e5d");

pub const GNT_TOKEN_ID: u16 = 16;

fn ether(whole: u64) -> U256 {
    U256::from(whole) * U256::from(10u64).pow(U256::from(18u64))
}

fn milli_ether(milli: u64) -> U256 {
    U256::from(milli) * U256::from(10u64).pow(U256::from(15u64))
}

#[derive(Debug, Clone)]
pub struct SimConfig {
    pub chain_id: u64,
    pub gas_price: u128,
    /// Gas charged for every base-chain transaction
    pub gas_per_tx: u64,
    pub transfer_fee: U256,
    pub withdraw_fee: U256,
    pub change_pub_key_fee: U256,
    /// ETH sent by one successful faucet request
    pub faucet_drip: U256,
    /// Tokens minted by one `Faucet.create()`
    pub token_faucet_mint: U256,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            chain_id: 4,
            gas_price: 1_000_000_000,
            gas_per_tx: 100_000,
            transfer_fee: milli_ether(1),
            withdraw_fee: milli_ether(2),
            change_pub_key_fee: milli_ether(1),
            faucet_drip: milli_ether(100),
            token_faucet_mint: ether(1000),
        }
    }
}

/// How the HTTP faucet answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaucetBehaviour {
    /// Sends `faucet_drip` and answers with a tx hash
    Fund,
    /// Answers that the address already has enough
    AlreadySufficient,
    /// Answers with an error text and sends nothing
    Fail,
    /// Request fails at the transport level
    Unreachable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Progress {
    Queued,
    Committed(u64),
    Verified(u64),
}

#[derive(Debug, Clone)]
enum PriorityKind {
    Deposit {
        to: Address,
        token: Token,
        amount: U256,
    },
    FullExit {
        account_id: u32,
        owner: Address,
        token: Token,
    },
}

#[derive(Debug, Clone)]
struct PriorityOp {
    kind: PriorityKind,
    progress: Progress,
}

#[derive(Debug, Clone)]
struct TxRecord {
    progress: Progress,
    polls: u32,
}

/// State change to replay on the verified view
#[derive(Debug, Clone)]
enum Effect {
    Credit {
        account: Address,
        symbol: String,
        amount: U256,
    },
    Debit {
        account: Address,
        symbol: String,
        amount: U256,
    },
    SetNonce {
        account: Address,
        nonce: u32,
    },
    SetPubKey {
        account: Address,
        hash: PubKeyHash,
    },
    /// Withdrawal leaves L2 and lands on the base chain
    PayOut {
        to: Address,
        token: Token,
        amount: U256,
    },
    /// Full exit becomes claimable from the settlement contract
    Claimable {
        owner: Address,
        token_id: u16,
        amount: U256,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum OpRef {
    Tx(String),
    Priority(u64),
}

#[derive(Debug, Clone)]
struct Unverified {
    op: OpRef,
    effects: Vec<Effect>,
}

#[derive(Debug, Clone)]
struct SimAccount {
    id: u32,
    committed: AccountSnapshot,
    verified: AccountSnapshot,
}

#[derive(Debug, Default)]
struct Erc20Ledger {
    symbol: String,
    decimals: u8,
    balances: HashMap<Address, U256>,
    allowances: HashMap<(Address, Address), U256>,
}

impl Erc20Ledger {
    fn balance(&self, account: Address) -> U256 {
        self.balances.get(&account).copied().unwrap_or(U256::ZERO)
    }

    fn credit(&mut self, account: Address, amount: U256) {
        *self.balances.entry(account).or_insert(U256::ZERO) += amount;
    }

    fn debit(&mut self, account: Address, amount: U256) {
        let balance = self.balances.entry(account).or_insert(U256::ZERO);
        *balance = balance.saturating_sub(amount);
    }
}

#[derive(Debug)]
struct State {
    config: SimConfig,
    block: u64,
    tx_counter: u64,
    eth: HashMap<Address, U256>,
    erc20: HashMap<Address, Erc20Ledger>,
    tokens: Tokens,
    accounts: HashMap<Address, SimAccount>,
    next_account_id: u32,
    next_serial: u64,
    priority: HashMap<u64, PriorityOp>,
    txs: HashMap<String, TxRecord>,
    unverified: Vec<Unverified>,
    claimable: HashMap<(Address, u16), U256>,
    faucet: FaucetBehaviour,
    faucet_calls: usize,
    token_faucet_calls: usize,
    key_change_submissions: usize,
    submitted: Vec<SyncTx>,
    rejected: usize,
    disconnects: usize,
    disconnected: bool,
}

/// In-memory base chain, L2 operator and faucet
///
/// Cheap to clone; clones share the same world.
#[derive(Debug, Clone)]
pub struct SimulatedNetwork {
    inner: Arc<Mutex<State>>,
}

impl Default for SimulatedNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedNetwork {
    pub fn new() -> Self {
        Self::with_config(SimConfig::default())
    }

    pub fn with_config(config: SimConfig) -> Self {
        let mut tokens = HashMap::new();
        tokens.insert(
            "ETH".to_string(),
            Token {
                id: 0,
                address: Address::ZERO,
                symbol: "ETH".to_string(),
                decimals: 18,
            },
        );
        tokens.insert(
            "GNT".to_string(),
            Token {
                id: GNT_TOKEN_ID,
                address: GNT_ADDRESS,
                symbol: "GNT".to_string(),
                decimals: 18,
            },
        );

        let mut erc20 = HashMap::new();
        erc20.insert(
            GNT_ADDRESS,
            Erc20Ledger {
                symbol: "GNT".to_string(),
                decimals: 18,
                ..Default::default()
            },
        );

        let state = State {
            config,
            block: 1,
            tx_counter: 0,
            eth: HashMap::new(),
            erc20,
            tokens: Tokens(tokens),
            accounts: HashMap::new(),
            next_account_id: 1,
            next_serial: 0,
            priority: HashMap::new(),
            txs: HashMap::new(),
            unverified: Vec::new(),
            claimable: HashMap::new(),
            faucet: FaucetBehaviour::Fund,
            faucet_calls: 0,
            token_faucet_calls: 0,
            key_change_submissions: 0,
            submitted: Vec::new(),
            rejected: 0,
            disconnects: 0,
            disconnected: false,
        };

        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ------------------------------------------------------------------
    // Setup
    // ------------------------------------------------------------------

    pub fn fund_eth(&self, account: Address, amount: U256) {
        *self.state().eth.entry(account).or_insert(U256::ZERO) += amount;
    }

    pub fn mint_tokens(&self, account: Address, amount: U256) {
        if let Some(ledger) = self.state().erc20.get_mut(&GNT_ADDRESS) {
            ledger.credit(account, amount);
        }
    }

    pub fn set_faucet_behaviour(&self, behaviour: FaucetBehaviour) {
        self.state().faucet = behaviour;
    }

    pub fn set_fee(&self, tx_type: TxFeeType, fee: U256) {
        let mut state = self.state();
        match tx_type {
            TxFeeType::Transfer => state.config.transfer_fee = fee,
            TxFeeType::Withdraw => state.config.withdraw_fee = fee,
            TxFeeType::ChangePubKey { .. } => state.config.change_pub_key_fee = fee,
        }
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    pub fn config(&self) -> SimConfig {
        self.state().config.clone()
    }

    pub fn main_contract(&self) -> Address {
        MAIN_CONTRACT
    }

    pub fn gnt(&self) -> Token {
        Token {
            id: GNT_TOKEN_ID,
            address: GNT_ADDRESS,
            symbol: "GNT".to_string(),
            decimals: 18,
        }
    }

    /// Wei charged for one base-chain transaction
    pub fn gas_cost_per_tx(&self) -> U256 {
        let state = self.state();
        U256::from(state.config.gas_per_tx) * U256::from(state.config.gas_price)
    }

    pub fn eth_balance(&self, account: Address) -> U256 {
        self.state()
            .eth
            .get(&account)
            .copied()
            .unwrap_or(U256::ZERO)
    }

    pub fn token_balance(&self, account: Address) -> U256 {
        self.state()
            .erc20
            .get(&GNT_ADDRESS)
            .map(|ledger| ledger.balance(account))
            .unwrap_or(U256::ZERO)
    }

    pub fn token_allowance(&self, owner: Address, spender: Address) -> U256 {
        self.state()
            .erc20
            .get(&GNT_ADDRESS)
            .and_then(|ledger| ledger.allowances.get(&(owner, spender)).copied())
            .unwrap_or(U256::ZERO)
    }

    pub fn l2_balance(&self, account: Address, symbol: &str, view: BalanceView) -> U256 {
        self.state()
            .accounts
            .get(&account)
            .map(|acc| match view {
                BalanceView::Committed => acc.committed.balance(symbol),
                BalanceView::Verified => acc.verified.balance(symbol),
            })
            .unwrap_or(U256::ZERO)
    }

    pub fn l2_account_id(&self, account: Address) -> Option<u32> {
        self.state().accounts.get(&account).map(|acc| acc.id)
    }

    /// Amount claimable from the settlement contract
    pub fn claimable(&self, account: Address, token_id: u16) -> U256 {
        self.state()
            .claimable
            .get(&(account, token_id))
            .copied()
            .unwrap_or(U256::ZERO)
    }

    pub fn faucet_calls(&self) -> usize {
        self.state().faucet_calls
    }

    pub fn token_faucet_calls(&self) -> usize {
        self.state().token_faucet_calls
    }

    /// `ChangePubKey` transactions submitted, accepted or not
    pub fn key_change_submissions(&self) -> usize {
        self.state().key_change_submissions
    }

    pub fn submitted_txs(&self) -> Vec<SyncTx> {
        self.state().submitted.clone()
    }

    pub fn rejected_txs(&self) -> usize {
        self.state().rejected
    }

    pub fn disconnect_calls(&self) -> usize {
        self.state().disconnects
    }
}

// ============================================================================
// World rules
// ============================================================================

fn committed_receipt(block: u64) -> OperationReceipt {
    OperationReceipt {
        executed: true,
        success: Some(true),
        fail_reason: None,
        block: Some(BlockInfo {
            block_number: block,
            committed: true,
            verified: false,
        }),
    }
}

fn verified_receipt(block: u64) -> OperationReceipt {
    OperationReceipt {
        executed: true,
        success: Some(true),
        fail_reason: None,
        block: Some(BlockInfo {
            block_number: block,
            committed: true,
            verified: true,
        }),
    }
}

fn revert(reason: &str) -> eyre::Report {
    eyre!("execution reverted: {}", reason)
}

fn credit(snapshot: &mut AccountSnapshot, symbol: &str, amount: U256) {
    *snapshot
        .balances
        .entry(symbol.to_string())
        .or_insert(U256::ZERO) += amount;
}

fn debit(snapshot: &mut AccountSnapshot, symbol: &str, amount: U256) {
    let balance = snapshot
        .balances
        .entry(symbol.to_string())
        .or_insert(U256::ZERO);
    *balance = balance.saturating_sub(amount);
}

impl State {
    fn next_block(&mut self) -> u64 {
        self.block += 1;
        self.block
    }

    fn next_hash(&mut self) -> B256 {
        self.tx_counter += 1;
        keccak256(self.tx_counter.to_be_bytes())
    }

    fn ensure_account(&mut self, address: Address) -> u32 {
        if let Some(account) = self.accounts.get(&address) {
            return account.id;
        }
        let id = self.next_account_id;
        self.next_account_id += 1;
        self.accounts.insert(
            address,
            SimAccount {
                id,
                committed: AccountSnapshot::empty(),
                verified: AccountSnapshot::empty(),
            },
        );
        debug!(address = %address, account_id = id, "Simulated L2 account created");
        id
    }

    fn eth_of(&self, account: Address) -> U256 {
        self.eth.get(&account).copied().unwrap_or(U256::ZERO)
    }

    fn token_by_address(&self, address: Address) -> Option<Token> {
        self.tokens.0.values().find(|t| t.address == address).cloned()
    }

    // ------------------------------------------------------------------
    // Base chain
    // ------------------------------------------------------------------

    fn queue_priority(&mut self, sender: Address, kind: PriorityKind) -> Log {
        let serial = self.next_serial;
        self.next_serial += 1;

        let op_code = match kind {
            PriorityKind::Deposit { .. } => op_type::DEPOSIT,
            PriorityKind::FullExit { .. } => op_type::FULL_EXIT,
        };
        self.priority.insert(
            serial,
            PriorityOp {
                kind,
                progress: Progress::Queued,
            },
        );

        let event = ZkSync::NewPriorityRequest {
            sender,
            serialId: serial,
            opType: op_code,
            pubData: Bytes::new(),
            expirationBlock: U256::from(self.block + 250),
        };
        Log {
            address: MAIN_CONTRACT,
            data: event.encode_log_data(),
        }
    }

    /// Run a base-chain transaction. Validation happens before any state
    /// changes, so a revert leaves the world untouched.
    fn execute(&mut self, sender: Address, to: Address, data: &[u8], value: U256) -> Result<Vec<Log>> {
        if data.len() < 4 {
            *self.eth.entry(to).or_insert(U256::ZERO) += value;
            return Ok(Vec::new());
        }
        let selector = [data[0], data[1], data[2], data[3]];
        let decode_err = |e: alloy::sol_types::Error| revert(&e.to_string());

        if to == MAIN_CONTRACT {
            return match selector {
                ZkSync::depositETHCall::SELECTOR => {
                    let call = ZkSync::depositETHCall::abi_decode(data, true).map_err(decode_err)?;
                    let token = self
                        .token_by_address(Address::ZERO)
                        .ok_or_else(|| revert("ETH not registered"))?;
                    Ok(vec![self.queue_priority(
                        sender,
                        PriorityKind::Deposit {
                            to: call._franklinAddr,
                            token,
                            amount: value,
                        },
                    )])
                }
                ZkSync::depositERC20Call::SELECTOR => {
                    let call = ZkSync::depositERC20Call::abi_decode(data, true).map_err(decode_err)?;
                    let amount = U256::from_limbs_slice(call._amount.as_limbs());
                    let token = self
                        .token_by_address(call._token)
                        .ok_or_else(|| revert("token not registered"))?;
                    let ledger = self
                        .erc20
                        .get_mut(&call._token)
                        .ok_or_else(|| revert("no such token contract"))?;

                    let allowance = ledger
                        .allowances
                        .get(&(sender, MAIN_CONTRACT))
                        .copied()
                        .unwrap_or(U256::ZERO);
                    if allowance < amount {
                        return Err(revert("ERC20: transfer amount exceeds allowance"));
                    }
                    if ledger.balance(sender) < amount {
                        return Err(revert("ERC20: transfer amount exceeds balance"));
                    }
                    ledger
                        .allowances
                        .insert((sender, MAIN_CONTRACT), allowance - amount);
                    ledger.debit(sender, amount);
                    ledger.credit(MAIN_CONTRACT, amount);

                    Ok(vec![self.queue_priority(
                        sender,
                        PriorityKind::Deposit {
                            to: call._franklinAddr,
                            token,
                            amount,
                        },
                    )])
                }
                ZkSync::fullExitCall::SELECTOR => {
                    let call = ZkSync::fullExitCall::abi_decode(data, true).map_err(decode_err)?;
                    let token = self
                        .token_by_address(call._token)
                        .ok_or_else(|| revert("token not registered"))?;
                    Ok(vec![self.queue_priority(
                        sender,
                        PriorityKind::FullExit {
                            account_id: call._accountId,
                            owner: sender,
                            token,
                        },
                    )])
                }
                ZkSync::withdrawETHCall::SELECTOR => {
                    let call = ZkSync::withdrawETHCall::abi_decode(data, true).map_err(decode_err)?;
                    let amount = U256::from(call._amount);
                    self.claim(sender, 0, amount)?;
                    *self.eth.entry(sender).or_insert(U256::ZERO) += amount;
                    Ok(Vec::new())
                }
                ZkSync::withdrawERC20Call::SELECTOR => {
                    let call = ZkSync::withdrawERC20Call::abi_decode(data, true).map_err(decode_err)?;
                    let amount = U256::from(call._amount);
                    let token = self
                        .token_by_address(call._token)
                        .ok_or_else(|| revert("token not registered"))?;
                    self.claim(sender, token.id, amount)?;
                    if let Some(ledger) = self.erc20.get_mut(&call._token) {
                        ledger.debit(MAIN_CONTRACT, amount);
                        ledger.credit(sender, amount);
                    }
                    Ok(Vec::new())
                }
                _ => Err(revert("unknown settlement contract method")),
            };
        }

        if to == TOKEN_FAUCET_ADDRESS && selector == Faucet::createCall::SELECTOR {
            let mint = self.config.token_faucet_mint;
            self.token_faucet_calls += 1;
            if let Some(ledger) = self.erc20.get_mut(&GNT_ADDRESS) {
                ledger.credit(sender, mint);
            }
            return Ok(Vec::new());
        }

        let ledger = self
            .erc20
            .get_mut(&to)
            .ok_or_else(|| revert("no contract at target address"))?;
        match selector {
            ERC20::increaseAllowanceCall::SELECTOR => {
                let call = ERC20::increaseAllowanceCall::abi_decode(data, true).map_err(decode_err)?;
                *ledger
                    .allowances
                    .entry((sender, call.spender))
                    .or_insert(U256::ZERO) += call.addedValue;
                Ok(Vec::new())
            }
            ERC20::approveCall::SELECTOR => {
                let call = ERC20::approveCall::abi_decode(data, true).map_err(decode_err)?;
                ledger
                    .allowances
                    .insert((sender, call.spender), call.amount);
                Ok(Vec::new())
            }
            _ => Err(revert("unknown token method")),
        }
    }

    fn claim(&mut self, owner: Address, token_id: u16, amount: U256) -> Result<()> {
        let pending = self
            .claimable
            .get(&(owner, token_id))
            .copied()
            .unwrap_or(U256::ZERO);
        if pending < amount {
            return Err(revert("amount exceeds balance to withdraw"));
        }
        self.claimable.insert((owner, token_id), pending - amount);
        Ok(())
    }

    fn read(&self, to: Address, data: &[u8]) -> Result<Bytes> {
        if data.len() < 4 {
            return Err(revert("empty calldata"));
        }
        let selector = [data[0], data[1], data[2], data[3]];
        let decode_err = |e: alloy::sol_types::Error| revert(&e.to_string());

        if to == MAIN_CONTRACT && selector == ZkSync::getBalanceToWithdrawCall::SELECTOR {
            let call = ZkSync::getBalanceToWithdrawCall::abi_decode(data, true).map_err(decode_err)?;
            let pending = self
                .claimable
                .get(&(call._address, call._tokenId))
                .copied()
                .unwrap_or(U256::ZERO);
            let pending = u128::try_from(pending).map_err(|_| revert("uint128 overflow"))?;
            return Ok(ZkSync::getBalanceToWithdrawCall::abi_encode_returns(&(pending,)).into());
        }

        let ledger = self
            .erc20
            .get(&to)
            .ok_or_else(|| revert("no contract at target address"))?;
        let output = match selector {
            ERC20::balanceOfCall::SELECTOR => {
                let call = ERC20::balanceOfCall::abi_decode(data, true).map_err(decode_err)?;
                ERC20::balanceOfCall::abi_encode_returns(&(ledger.balance(call.account),))
            }
            ERC20::allowanceCall::SELECTOR => {
                let call = ERC20::allowanceCall::abi_decode(data, true).map_err(decode_err)?;
                let allowance = ledger
                    .allowances
                    .get(&(call.owner, call.spender))
                    .copied()
                    .unwrap_or(U256::ZERO);
                ERC20::allowanceCall::abi_encode_returns(&(allowance,))
            }
            ERC20::decimalsCall::SELECTOR => {
                ERC20::decimalsCall::abi_encode_returns(&(ledger.decimals,))
            }
            ERC20::symbolCall::SELECTOR => {
                ERC20::symbolCall::abi_encode_returns(&(ledger.symbol.clone(),))
            }
            _ => return Err(revert("unknown token method")),
        };
        Ok(output.into())
    }

    // ------------------------------------------------------------------
    // L2 operator
    // ------------------------------------------------------------------

    fn commit_priority(&mut self, serial: u64) -> u64 {
        let Some(kind) = self.priority.get(&serial).map(|op| op.kind.clone()) else {
            return self.block;
        };

        let effects = match kind {
            PriorityKind::Deposit { to, token, amount } => {
                self.ensure_account(to);
                if let Some(account) = self.accounts.get_mut(&to) {
                    credit(&mut account.committed, &token.symbol, amount);
                }
                vec![Effect::Credit {
                    account: to,
                    symbol: token.symbol,
                    amount,
                }]
            }
            PriorityKind::FullExit {
                account_id,
                owner,
                token,
            } => match self.accounts.get_mut(&owner) {
                Some(account) if account.id == account_id => {
                    let amount = account.committed.balance(&token.symbol);
                    debit(&mut account.committed, &token.symbol, amount);
                    vec![
                        Effect::Debit {
                            account: owner,
                            symbol: token.symbol.clone(),
                            amount,
                        },
                        Effect::Claimable {
                            owner,
                            token_id: token.id,
                            amount,
                        },
                    ]
                }
                // Full exit for someone else's account id exits nothing
                _ => Vec::new(),
            },
        };

        let block = self.next_block();
        if let Some(op) = self.priority.get_mut(&serial) {
            op.progress = Progress::Committed(block);
        }
        self.unverified.push(Unverified {
            op: OpRef::Priority(serial),
            effects,
        });
        block
    }

    /// Verify `op` and everything committed before it
    fn verify(&mut self, op: &OpRef) {
        let Some(position) = self.unverified.iter().position(|u| &u.op == op) else {
            return;
        };
        let batch: Vec<Unverified> = self.unverified.drain(..=position).collect();

        for entry in batch {
            for effect in entry.effects {
                self.apply_verified(effect);
            }
            let progress = match &entry.op {
                OpRef::Tx(hash) => self.txs.get_mut(hash).map(|r| &mut r.progress),
                OpRef::Priority(serial) => self.priority.get_mut(serial).map(|p| &mut p.progress),
            };
            if let Some(progress) = progress {
                if let Progress::Committed(block) = *progress {
                    *progress = Progress::Verified(block);
                }
            }
        }
    }

    fn apply_verified(&mut self, effect: Effect) {
        match effect {
            Effect::Credit {
                account,
                symbol,
                amount,
            } => {
                if let Some(acc) = self.accounts.get_mut(&account) {
                    credit(&mut acc.verified, &symbol, amount);
                }
            }
            Effect::Debit {
                account,
                symbol,
                amount,
            } => {
                if let Some(acc) = self.accounts.get_mut(&account) {
                    debit(&mut acc.verified, &symbol, amount);
                }
            }
            Effect::SetNonce { account, nonce } => {
                if let Some(acc) = self.accounts.get_mut(&account) {
                    acc.verified.nonce = nonce;
                }
            }
            Effect::SetPubKey { account, hash } => {
                if let Some(acc) = self.accounts.get_mut(&account) {
                    acc.verified.pub_key_hash = hash;
                }
            }
            Effect::PayOut { to, token, amount } => {
                if token.is_eth() {
                    *self.eth.entry(to).or_insert(U256::ZERO) += amount;
                } else if let Some(ledger) = self.erc20.get_mut(&token.address) {
                    ledger.debit(MAIN_CONTRACT, amount);
                    ledger.credit(to, amount);
                }
            }
            Effect::Claimable {
                owner,
                token_id,
                amount,
            } => {
                *self
                    .claimable
                    .entry((owner, token_id))
                    .or_insert(U256::ZERO) += amount;
            }
        }
    }

    /// Validate `tx` against committed state and apply it there. Returns the
    /// effects to replay on verification, or the rejection reason.
    fn apply_tx(&mut self, tx: &SyncTx, co_signed: bool) -> std::result::Result<Vec<Effect>, String> {
        match tx {
            SyncTx::Transfer(t) => {
                if !co_signed {
                    return Err("Eth signature is missing".into());
                }
                let token = self.tokens.by_id(t.token).cloned().ok_or("Token not found")?;
                self.check_spend(t.from, t.account_id, t.nonce, true, t.amount, t.fee, &token)?;
                // Withdrawals carry full-precision amounts, transfers do not
                if !is_token_amount_packable(t.amount) {
                    return Err("Amount is not packable".into());
                }

                let total = t.amount + t.fee;
                let next_nonce = t.nonce + 1;
                if let Some(from) = self.accounts.get_mut(&t.from) {
                    debit(&mut from.committed, &token.symbol, total);
                    from.committed.nonce = next_nonce;
                }
                self.ensure_account(t.to);
                if let Some(to) = self.accounts.get_mut(&t.to) {
                    credit(&mut to.committed, &token.symbol, t.amount);
                }

                Ok(vec![
                    Effect::Debit {
                        account: t.from,
                        symbol: token.symbol.clone(),
                        amount: total,
                    },
                    Effect::SetNonce {
                        account: t.from,
                        nonce: next_nonce,
                    },
                    Effect::Credit {
                        account: t.to,
                        symbol: token.symbol,
                        amount: t.amount,
                    },
                ])
            }
            SyncTx::Withdraw(w) => {
                if !co_signed {
                    return Err("Eth signature is missing".into());
                }
                let token = self.tokens.by_id(w.token).cloned().ok_or("Token not found")?;
                self.check_spend(w.from, w.account_id, w.nonce, true, w.amount, w.fee, &token)?;

                let total = w.amount + w.fee;
                let next_nonce = w.nonce + 1;
                if let Some(from) = self.accounts.get_mut(&w.from) {
                    debit(&mut from.committed, &token.symbol, total);
                    from.committed.nonce = next_nonce;
                }

                Ok(vec![
                    Effect::Debit {
                        account: w.from,
                        symbol: token.symbol.clone(),
                        amount: total,
                    },
                    Effect::SetNonce {
                        account: w.from,
                        nonce: next_nonce,
                    },
                    Effect::PayOut {
                        to: w.to,
                        token,
                        amount: w.amount,
                    },
                ])
            }
            SyncTx::ChangePubKey(c) => {
                if c.eth_signature.is_none() {
                    return Err("Eth signature is missing".into());
                }
                let token = self
                    .tokens
                    .by_id(c.fee_token)
                    .cloned()
                    .ok_or("Token not found")?;
                self.check_spend(c.account, c.account_id, c.nonce, false, U256::ZERO, c.fee, &token)?;

                let next_nonce = c.nonce + 1;
                if let Some(account) = self.accounts.get_mut(&c.account) {
                    debit(&mut account.committed, &token.symbol, c.fee);
                    account.committed.nonce = next_nonce;
                    account.committed.pub_key_hash = c.new_pk_hash.clone();
                }

                Ok(vec![
                    Effect::Debit {
                        account: c.account,
                        symbol: token.symbol,
                        amount: c.fee,
                    },
                    Effect::SetNonce {
                        account: c.account,
                        nonce: next_nonce,
                    },
                    Effect::SetPubKey {
                        account: c.account,
                        hash: c.new_pk_hash.clone(),
                    },
                ])
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn check_spend(
        &self,
        address: Address,
        account_id: u32,
        nonce: u32,
        needs_key: bool,
        amount: U256,
        fee: U256,
        token: &Token,
    ) -> std::result::Result<(), String> {
        let account = self
            .accounts
            .get(&address)
            .ok_or("Account does not exist")?;
        if account.id != account_id {
            return Err("Account id mismatch".into());
        }
        if needs_key && account.committed.pub_key_hash.is_zero() {
            return Err("Account is locked".into());
        }
        if account.committed.nonce != nonce {
            return Err(format!(
                "Nonce mismatch: expected {}, got {}",
                account.committed.nonce, nonce
            ));
        }
        if !is_fee_amount_packable(fee) {
            return Err("Fee is not packable".into());
        }
        if account.committed.balance(&token.symbol) < amount + fee {
            return Err("Not enough balance".into());
        }
        Ok(())
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.disconnected {
            return Err(eyre!("L2 provider is disconnected"));
        }
        Ok(())
    }
}

// ============================================================================
// Seams
// ============================================================================

#[async_trait]
impl BaseChainClient for SimulatedNetwork {
    fn chain_id(&self) -> u64 {
        self.state().config.chain_id
    }

    async fn get_balance(&self, address: Address) -> Result<U256> {
        Ok(self.state().eth_of(address))
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes> {
        self.state().read(to, &data)
    }

    async fn send_transaction(
        &self,
        from: &Identity,
        to: Address,
        data: Bytes,
        value: U256,
    ) -> Result<BaseReceipt> {
        let mut state = self.state();
        let sender = from.address();
        let gas_cost = U256::from(state.config.gas_per_tx) * U256::from(state.config.gas_price);

        if state.eth_of(sender) < gas_cost + value {
            return Err(eyre!(
                "insufficient funds for gas * price + value: address {} have {} want {}",
                sender,
                state.eth_of(sender),
                gas_cost + value
            ));
        }

        let logs = state.execute(sender, to, &data, value)?;
        let balance = state.eth_of(sender);
        state.eth.insert(sender, balance - gas_cost - value);

        let block = state.next_block();
        let tx_hash = state.next_hash();
        debug!(tx_hash = %tx_hash, from = %sender, to = %to, "Simulated base-chain transaction mined");

        Ok(BaseReceipt {
            tx_hash,
            block_number: Some(block),
            gas_used: state.config.gas_per_tx,
            effective_gas_price: state.config.gas_price,
            status: true,
            logs,
        })
    }
}

#[async_trait]
impl SyncProvider for SimulatedNetwork {
    async fn contract_address(&self) -> Result<ContractAddress> {
        self.state().ensure_connected()?;
        Ok(ContractAddress {
            main_contract: MAIN_CONTRACT,
            gov_contract: String::new(),
        })
    }

    async fn tokens(&self) -> Result<Tokens> {
        let state = self.state();
        state.ensure_connected()?;
        Ok(state.tokens.clone())
    }

    async fn account_info(&self, address: Address) -> Result<AccountState> {
        let state = self.state();
        state.ensure_connected()?;
        Ok(match state.accounts.get(&address) {
            Some(account) => AccountState {
                address,
                id: Some(account.id),
                committed: account.committed.clone(),
                verified: account.verified.clone(),
                depositing: DepositingState::default(),
            },
            None => AccountState {
                address,
                id: None,
                committed: AccountSnapshot::empty(),
                verified: AccountSnapshot::empty(),
                depositing: DepositingState::default(),
            },
        })
    }

    async fn get_tx_fee(&self, tx_type: TxFeeType, _address: Address, token: &str) -> Result<Fee> {
        let state = self.state();
        state.ensure_connected()?;
        state.tokens.resolve(token)?;
        let total = match tx_type {
            TxFeeType::Transfer => state.config.transfer_fee,
            TxFeeType::Withdraw => state.config.withdraw_fee,
            TxFeeType::ChangePubKey { .. } => state.config.change_pub_key_fee,
        };
        Ok(Fee::flat(tx_type, total))
    }

    async fn submit_tx(
        &self,
        tx: SyncTx,
        eth_signature: Option<TxEthSignature>,
    ) -> Result<SyncTxHash> {
        let mut state = self.state();
        state.ensure_connected()?;

        if matches!(tx, SyncTx::ChangePubKey(_)) {
            state.key_change_submissions += 1;
        }
        state.submitted.push(tx.clone());

        match state.apply_tx(&tx, eth_signature.is_some()) {
            Ok(effects) => {
                let hash = format!("sync-tx:{}", hex::encode(state.next_hash()));
                let block = state.next_block();
                state.txs.insert(
                    hash.clone(),
                    TxRecord {
                        progress: Progress::Committed(block),
                        polls: 0,
                    },
                );
                state.unverified.push(Unverified {
                    op: OpRef::Tx(hash.clone()),
                    effects,
                });
                Ok(SyncTxHash(hash))
            }
            Err(reason) => {
                state.rejected += 1;
                debug!(kind = tx.kind(), reason = %reason, "Simulated operator rejected transaction");
                Err(TxRejected::new(tx.kind(), reason).into())
            }
        }
    }

    async fn tx_info(&self, hash: &SyncTxHash) -> Result<OperationReceipt> {
        let mut state = self.state();
        state.ensure_connected()?;

        let Some(record) = state.txs.get_mut(&hash.0) else {
            return Ok(OperationReceipt::default());
        };
        record.polls += 1;
        let (progress, polls) = (record.progress, record.polls);

        Ok(match progress {
            Progress::Queued => OperationReceipt::default(),
            Progress::Committed(block) if polls < 2 => committed_receipt(block),
            Progress::Committed(block) => {
                state.verify(&OpRef::Tx(hash.0.clone()));
                verified_receipt(block)
            }
            Progress::Verified(block) => verified_receipt(block),
        })
    }

    async fn ethop_info(&self, serial_id: u64) -> Result<OperationReceipt> {
        let mut state = self.state();
        state.ensure_connected()?;

        let Some(progress) = state.priority.get(&serial_id).map(|op| op.progress) else {
            return Ok(OperationReceipt::default());
        };

        Ok(match progress {
            Progress::Queued => committed_receipt(state.commit_priority(serial_id)),
            Progress::Committed(block) => {
                state.verify(&OpRef::Priority(serial_id));
                verified_receipt(block)
            }
            Progress::Verified(block) => verified_receipt(block),
        })
    }

    async fn disconnect(&self) -> Result<()> {
        let mut state = self.state();
        state.disconnected = true;
        state.disconnects += 1;
        Ok(())
    }
}

#[async_trait]
impl FaucetApi for SimulatedNetwork {
    async fn request_funds(&self, address: Address) -> Result<String> {
        let mut state = self.state();
        state.faucet_calls += 1;

        match state.faucet {
            FaucetBehaviour::Fund => {
                let drip = state.config.faucet_drip;
                *state.eth.entry(address).or_insert(U256::ZERO) += drip;
                let hash = state.next_hash();
                Ok(format!("{{\"txhash\":\"{}\"}}", hash))
            }
            FaucetBehaviour::AlreadySufficient => {
                Ok("Address already has sufficient funds".to_string())
            }
            FaucetBehaviour::Fail => Ok("Faucet error: out of funds, try later".to_string()),
            FaucetBehaviour::Unreachable => Err(eyre!("Connection refused")),
        }
    }
}
