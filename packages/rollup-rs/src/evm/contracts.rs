//! Base-chain contract ABI definitions
//!
//! Uses alloy's sol! macro to generate call and event types. Calls are
//! encoded here and sent through [`BaseChainClient`](super::BaseChainClient)
//! so the same bindings serve the HTTP client and the simulated network.
//!
//! Only the subset of each ABI the token lifecycle touches is declared.

use alloy::sol;

sol! {
    /// ERC20 interface of the secondary token (nGNT on Rinkeby)
    #[derive(Debug)]
    contract ERC20 {
        function balanceOf(address account) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
        function increaseAllowance(address spender, uint256 addedValue) external returns (bool);
        function decimals() external view returns (uint8);
        function symbol() external view returns (string);
    }

    /// Testnet faucet that mints secondary tokens to the caller
    #[derive(Debug)]
    contract Faucet {
        function create() external;
    }

    /// zkSync settlement contract on the base chain
    #[derive(Debug)]
    contract ZkSync {
        // ========================================================================
        // Priority operations (deposit, exodus)
        // ========================================================================

        /// Deposit ETH to the L2 account `_franklinAddr`
        function depositETH(address _franklinAddr) external payable;

        /// Deposit ERC20 to the L2 account `_franklinAddr` (needs allowance)
        function depositERC20(address _token, uint104 _amount, address _franklinAddr) external;

        /// Request a full exit of `_token` for `_accountId`, bypassing the operator
        function fullExit(uint32 _accountId, address _token) external;

        // ========================================================================
        // Pending balance recovery
        // ========================================================================

        /// Amount processed out of L2 and claimable on the base chain
        function getBalanceToWithdraw(address _address, uint16 _tokenId) external view returns (uint128);

        /// Claim pending ETH
        function withdrawETH(uint128 _amount) external;

        /// Claim pending ERC20
        function withdrawERC20(address _token, uint128 _amount) external;

        // ========================================================================
        // Events
        // ========================================================================

        /// Emitted for every priority operation; `serialId` tracks it on L2
        event NewPriorityRequest(
            address sender,
            uint64 serialId,
            uint8 opType,
            bytes pubData,
            uint256 expirationBlock
        );
    }
}

/// Priority operation type codes carried by `NewPriorityRequest.opType`
pub mod op_type {
    pub const DEPOSIT: u8 = 1;
    pub const FULL_EXIT: u8 = 6;
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Address, U256};
    use alloy::sol_types::SolCall;

    #[test]
    fn test_selectors_match_deployed_contracts() {
        assert_eq!(ERC20::balanceOfCall::SELECTOR, [0x70, 0xa0, 0x82, 0x31]);
        assert_eq!(ERC20::approveCall::SELECTOR, [0x09, 0x5e, 0xa7, 0xb3]);
        assert_eq!(ERC20::increaseAllowanceCall::SELECTOR, [0x39, 0x50, 0x93, 0x51]);
        assert_eq!(Faucet::createCall::SELECTOR, [0xef, 0xc8, 0x1a, 0x8c]);
    }

    #[test]
    fn test_call_encoding_decodes_back() {
        let owner = Address::repeat_byte(0x11);
        let data = ERC20::increaseAllowanceCall {
            spender: owner,
            addedValue: U256::from(7u64),
        }
        .abi_encode();

        let decoded = ERC20::increaseAllowanceCall::abi_decode(&data, true).unwrap();
        assert_eq!(decoded.spender, owner);
        assert_eq!(decoded.addedValue, U256::from(7u64));
    }
}
