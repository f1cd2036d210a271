use alloy::primitives::{Address, B256, U256};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of an external-chain data reference.
///
/// Discriminants are the type tags used by the on-chain query schema.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    IntoPrimitive,
    TryFromPrimitive,
    Serialize,
    Deserialize,
)]
#[repr(u16)]
#[serde(rename_all = "snake_case")]
pub enum SubqueryKind {
    Header = 1,
    Account = 2,
    Storage = 3,
    Transaction = 4,
    Receipt = 5,
    SolidityNestedMapping = 6,
}

/// Order in which subquery kinds appear in a data query.
///
/// Both the wire encoding and the data query hash are computed over a list flattened in this
/// order, so it must match what the query contract expects.
pub const SUBQUERY_KIND_ORDER: [SubqueryKind; 6] = [
    SubqueryKind::Header,
    SubqueryKind::Account,
    SubqueryKind::Storage,
    SubqueryKind::Transaction,
    SubqueryKind::Receipt,
    SubqueryKind::SolidityNestedMapping,
];

impl SubqueryKind {
    pub fn type_tag(self) -> u16 {
        self.into()
    }

    /// Position of this kind in [`SUBQUERY_KIND_ORDER`].
    pub fn order_position(self) -> usize {
        match self {
            Self::Header => 0,
            Self::Account => 1,
            Self::Storage => 2,
            Self::Transaction => 3,
            Self::Receipt => 4,
            Self::SolidityNestedMapping => 5,
        }
    }
}

impl fmt::Display for SubqueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Header => "header",
            Self::Account => "account",
            Self::Storage => "storage",
            Self::Transaction => "transaction",
            Self::Receipt => "receipt",
            Self::SolidityNestedMapping => "solidity_nested_mapping",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderSubquery {
    pub block_number: u32,
    pub field_idx: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSubquery {
    pub block_number: u32,
    pub addr: Address,
    pub field_idx: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageSubquery {
    pub block_number: u32,
    pub addr: Address,
    pub slot: U256,
}

/// Transaction reference as produced by the computation: it points at a transaction by its
/// position in a block and still has to be resolved into a transaction hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialTxSubquery {
    pub block_number: u32,
    pub tx_idx: u32,
    pub field_or_calldata_idx: u32,
}

/// Receipt reference addressed by block position, see [`PartialTxSubquery`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialReceiptSubquery {
    pub block_number: u32,
    pub tx_idx: u32,
    pub field_or_log_idx: u32,
    pub topic_or_data_or_address_idx: u32,
    pub event_schema: B256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolidityNestedMappingSubquery {
    pub block_number: u32,
    pub addr: Address,
    pub mapping_slot: U256,
    pub mapping_depth: u8,
    pub keys: Vec<B256>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxSubquery {
    pub tx_hash: B256,
    pub field_or_calldata_idx: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptSubquery {
    pub tx_hash: B256,
    pub field_or_log_idx: u32,
    pub topic_or_data_or_address_idx: u32,
    pub event_schema: B256,
}

/// Subqueries collected while running the computation, grouped by kind.
///
/// Transaction and receipt entries are partial and must go through the resolver before the
/// batch can be turned into a data query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawSubqueryBatch {
    pub header_subqueries: Vec<HeaderSubquery>,
    pub account_subqueries: Vec<AccountSubquery>,
    pub storage_subqueries: Vec<StorageSubquery>,
    pub tx_subqueries: Vec<PartialTxSubquery>,
    pub receipt_subqueries: Vec<PartialReceiptSubquery>,
    pub solidity_nested_mapping_subqueries: Vec<SolidityNestedMappingSubquery>,
}

impl RawSubqueryBatch {
    pub fn kind_len(&self, kind: SubqueryKind) -> usize {
        match kind {
            SubqueryKind::Header => self.header_subqueries.len(),
            SubqueryKind::Account => self.account_subqueries.len(),
            SubqueryKind::Storage => self.storage_subqueries.len(),
            SubqueryKind::Transaction => self.tx_subqueries.len(),
            SubqueryKind::Receipt => self.receipt_subqueries.len(),
            SubqueryKind::SolidityNestedMapping => self.solidity_nested_mapping_subqueries.len(),
        }
    }

    pub fn len(&self) -> usize {
        SUBQUERY_KIND_ORDER
            .iter()
            .map(|kind| self.kind_len(*kind))
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Block numbers that have to be fetched to resolve transaction and receipt entries.
    pub fn referenced_blocks(&self) -> impl Iterator<Item = u32> + '_ {
        self.tx_subqueries
            .iter()
            .map(|tx| tx.block_number)
            .chain(self.receipt_subqueries.iter().map(|r| r.block_number))
    }
}

/// Fully resolved subquery, ready to be encoded into a data query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Subquery {
    Header(HeaderSubquery),
    Account(AccountSubquery),
    Storage(StorageSubquery),
    Transaction(TxSubquery),
    Receipt(ReceiptSubquery),
    SolidityNestedMapping(SolidityNestedMappingSubquery),
}

impl Subquery {
    pub fn kind(&self) -> SubqueryKind {
        match self {
            Self::Header(_) => SubqueryKind::Header,
            Self::Account(_) => SubqueryKind::Account,
            Self::Storage(_) => SubqueryKind::Storage,
            Self::Transaction(_) => SubqueryKind::Transaction,
            Self::Receipt(_) => SubqueryKind::Receipt,
            Self::SolidityNestedMapping(_) => SubqueryKind::SolidityNestedMapping,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("subquery #{index} of kind {kind} follows a {previous} subquery")]
pub struct KindOrderError {
    pub index: usize,
    pub kind: SubqueryKind,
    pub previous: SubqueryKind,
}

/// Subqueries flattened in [`SUBQUERY_KIND_ORDER`], with every transaction hash populated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ResolvedSubqueryList(Vec<Subquery>);

impl ResolvedSubqueryList {
    /// Wraps already ordered subqueries. Fails if kinds are not grouped in
    /// [`SUBQUERY_KIND_ORDER`]; intra-kind order is kept as is.
    pub fn from_ordered(subqueries: Vec<Subquery>) -> Result<Self, KindOrderError> {
        for (index, pair) in subqueries.windows(2).enumerate() {
            let (previous, kind) = (pair[0].kind(), pair[1].kind());
            if kind.order_position() < previous.order_position() {
                return Err(KindOrderError {
                    index: index + 1,
                    kind,
                    previous,
                });
            }
        }
        Ok(Self(subqueries))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Subquery> {
        self.0.iter()
    }

    pub fn kinds(&self) -> impl Iterator<Item = SubqueryKind> + '_ {
        self.0.iter().map(Subquery::kind)
    }

    pub fn into_inner(self) -> Vec<Subquery> {
        self.0
    }
}

impl<'a> IntoIterator for &'a ResolvedSubqueryList {
    type Item = &'a Subquery;
    type IntoIter = std::slice::Iter<'a, Subquery>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(block_number: u32) -> Subquery {
        Subquery::Header(HeaderSubquery {
            block_number,
            field_idx: 0,
        })
    }

    fn tx(byte: u8) -> Subquery {
        Subquery::Transaction(TxSubquery {
            tx_hash: B256::repeat_byte(byte),
            field_or_calldata_idx: 0,
        })
    }

    #[test]
    fn kind_order_matches_type_tags() {
        let tags: Vec<u16> = SUBQUERY_KIND_ORDER.iter().map(|k| k.type_tag()).collect();
        assert_eq!(tags, vec![1, 2, 3, 4, 5, 6]);
        for (position, kind) in SUBQUERY_KIND_ORDER.iter().enumerate() {
            assert_eq!(kind.order_position(), position);
        }
    }

    #[test]
    fn ordered_list_is_accepted() {
        let list = ResolvedSubqueryList::from_ordered(vec![header(2), header(1), tx(1), tx(2)])
            .unwrap();
        assert_eq!(list.len(), 4);
        assert_eq!(
            list.kinds().collect::<Vec<_>>(),
            vec![
                SubqueryKind::Header,
                SubqueryKind::Header,
                SubqueryKind::Transaction,
                SubqueryKind::Transaction
            ]
        );
    }

    #[test]
    fn out_of_order_list_is_rejected() {
        let err = ResolvedSubqueryList::from_ordered(vec![header(1), tx(1), header(2)]).unwrap_err();
        assert_eq!(
            err,
            KindOrderError {
                index: 2,
                kind: SubqueryKind::Header,
                previous: SubqueryKind::Transaction,
            }
        );
    }

    #[test]
    fn raw_batch_deserializes_with_missing_kinds() {
        let batch: RawSubqueryBatch = serde_json::from_str(
            r#"{"txSubqueries":[{"blockNumber":100,"txIdx":2,"fieldOrCalldataIdx":7}]}"#,
        )
        .unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.kind_len(SubqueryKind::Transaction), 1);
        assert_eq!(batch.referenced_blocks().collect::<Vec<_>>(), vec![100]);
    }
}
