// 🏷️ Category dictionary
// Resolves plan categories by exact name and classifies payment types by kind
//
// The production dictionary is written in Ukrainian; English names are
// accepted as aliases for every kind.

use crate::models::CategoryEntry;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Dictionary id of the credit issuance plan category.
pub const ISSUANCE_CATEGORY_ID: i64 = 3;

/// Dictionary id of the payment collection plan category.
pub const COLLECTION_CATEGORY_ID: i64 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CategoryKind {
    /// Plan category: credit principal handed out
    Issuance,
    /// Plan category: payments received
    Collection,
    /// Payment type: principal repayment
    Principal,
    /// Payment type: interest repayment
    Interest,
}

impl CategoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryKind::Issuance => "issuance",
            CategoryKind::Collection => "collection",
            CategoryKind::Principal => "principal",
            CategoryKind::Interest => "interest",
        }
    }

    fn aliases(&self) -> &'static [&'static str] {
        match self {
            CategoryKind::Issuance => &["issuance", "видача"],
            CategoryKind::Collection => &["collection", "збір"],
            CategoryKind::Principal => &["principal", "тіло"],
            CategoryKind::Interest => &["interest", "відсотки"],
        }
    }

    /// Case-insensitive classification of a dictionary name.
    pub fn from_name(name: &str) -> Option<CategoryKind> {
        let lowered = name.trim().to_lowercase();
        [
            CategoryKind::Issuance,
            CategoryKind::Collection,
            CategoryKind::Principal,
            CategoryKind::Interest,
        ]
        .into_iter()
        .find(|kind| kind.aliases().contains(&lowered.as_str()))
    }
}

/// In-memory copy of the dictionary table.
#[derive(Debug, Clone, Default)]
pub struct CategoryDictionary {
    by_id: HashMap<i64, CategoryEntry>,
}

impl CategoryDictionary {
    pub fn new(entries: Vec<CategoryEntry>) -> Self {
        CategoryDictionary {
            by_id: entries.into_iter().map(|e| (e.id, e)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn get(&self, id: i64) -> Option<&CategoryEntry> {
        self.by_id.get(&id)
    }

    pub fn name_of(&self, id: i64) -> Option<&str> {
        self.get(id).map(|e| e.name.as_str())
    }

    /// Exact, case-sensitive lookup used when resolving uploaded plan rows.
    pub fn find_exact(&self, name: &str) -> Option<&CategoryEntry> {
        self.by_id.values().find(|e| e.name == name)
    }

    pub fn kind_of(&self, id: i64) -> Option<CategoryKind> {
        self.name_of(id).and_then(CategoryKind::from_name)
    }
}
