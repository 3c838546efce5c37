//! ABI of the rollup contract on L1.

#![allow(missing_docs)]

use alloy_sol_types::sol;

sol! {
    /// Rollup contract events and views consumed by the indexer.
    #[derive(Debug, PartialEq, Eq)]
    interface IRollup {
        event L2BlockProposed(
            uint256 indexed blockNumber,
            bytes32 indexed archive,
            bytes32[] versionedBlobHashes
        );

        event L2ProofVerified(uint256 indexed blockNumber, address indexed proverId);

        struct AttesterView {
            uint8 status;
            uint256 effectiveBalance;
            address withdrawer;
            address proposer;
        }

        function getActiveAttesterCount() external view returns (uint256);

        function getAttesterAtIndex(uint256 index) external view returns (address);

        function getAttesterView(address attester) external view returns (AttesterView memory);
    }
}
