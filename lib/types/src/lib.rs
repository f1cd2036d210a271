//! Data model shared by the proof-to-query pipeline components.

mod artifact;
pub use artifact::{CallbackDescriptor, EncodedComputeArtifact, ProofArtifact};

mod subquery;
pub use subquery::{
    AccountSubquery, HeaderSubquery, KindOrderError, PartialReceiptSubquery, PartialTxSubquery,
    RawSubqueryBatch, ReceiptSubquery, ResolvedSubqueryList, SUBQUERY_KIND_ORDER,
    SolidityNestedMappingSubquery, StorageSubquery, Subquery, SubqueryKind, TxSubquery,
};
