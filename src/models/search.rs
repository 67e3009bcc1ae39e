use serde::{Deserialize, Serialize};

use super::document::{DocId, StoredDocument};

/// One sorted hit with its stored projection
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub doc_id: DocId,
    pub fields: StoredDocument,
}

/// A page of results plus the number of matches before truncation
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TopDocs {
    pub total_hits: u64,
    pub hits: Vec<SearchHit>,
}

impl TopDocs {
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn doc_ids(&self) -> Vec<DocId> {
        self.hits.iter().map(|h| h.doc_id).collect()
    }
}

/// Sort on the value of one field
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortField {
    pub field: String,
    /// Descending when set. Ties still break by ascending document id.
    pub reverse: bool,
}

/// Result ordering
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sort {
    /// Ascending document id
    IndexOrder,
    Field(SortField),
}

impl Sort {
    /// Ascending sort on `field`
    pub fn by(field: impl Into<String>) -> Self {
        Sort::Field(SortField {
            field: field.into(),
            reverse: false,
        })
    }

    /// Flip a field sort to descending. No effect on index order.
    pub fn reverse(self) -> Self {
        match self {
            Sort::Field(mut sf) => {
                sf.reverse = !sf.reverse;
                Sort::Field(sf)
            }
            Sort::IndexOrder => Sort::IndexOrder,
        }
    }
}

impl Default for Sort {
    fn default() -> Self {
        Sort::IndexOrder
    }
}
