//! ABI of the query contract.

alloy::sol! {
    #[derive(Debug, PartialEq, Eq)]
    struct AxiomV2ComputeQuery {
        uint8 k;
        uint16 resultLen;
        bytes32[] vkey;
        bytes computeProof;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct AxiomV2Callback {
        address target;
        bytes extraData;
    }

    #[derive(Debug, PartialEq, Eq)]
    interface IAxiomV2Query {
        function sendQuery(
            uint64 sourceChainId,
            bytes32 dataQueryHash,
            AxiomV2ComputeQuery calldata computeQuery,
            AxiomV2Callback calldata callback,
            bytes32 userSalt,
            uint64 maxFeePerGas,
            uint32 callbackGasLimit,
            address refundee,
            bytes calldata dataQuery
        ) external payable returns (uint256 queryId);
    }
}
