//! Stock checks run before a request is submitted or a line approved.
//!
//! Only lines whose owning department the acting store user can see are
//! checked; items without a stock figure are not checked at all. Drafts skip
//! the guard entirely.
use crate::catalog::CatalogItem;
use crate::error::RequestError;
use crate::line::{Line, NormalizedStatus};
use std::collections::HashMap;

pub trait StockLookup {
    fn available(&self, item_id: &str) -> Option<u64>;
}

impl StockLookup for HashMap<String, u64> {
    fn available(&self, item_id: &str) -> Option<u64> {
        self.get(item_id).copied()
    }
}

/// Catalog items loaded for one editing session.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    items: HashMap<String, CatalogItem>,
}

impl CatalogSnapshot {
    pub fn new(items: impl IntoIterator<Item = CatalogItem>) -> Self {
        Self {
            items: items
                .into_iter()
                .map(|item| (item.item_code.clone(), item))
                .collect(),
        }
    }

    pub fn get(&self, item_id: &str) -> Option<&CatalogItem> {
        self.items.get(item_id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl StockLookup for CatalogSnapshot {
    fn available(&self, item_id: &str) -> Option<u64> {
        self.items.get(item_id).and_then(|item| item.qty)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryViolation {
    pub item_id: String,
    pub item_name: String,
    pub requested: u64,
    pub available: u64,
}

impl From<InventoryViolation> for RequestError {
    fn from(v: InventoryViolation) -> Self {
        RequestError::InventoryViolation {
            item_id: v.item_id,
            item_name: v.item_name,
            requested: v.requested,
            available: v.available,
        }
    }
}

/// Compares one requested quantity with stock.
pub fn check_quantity(
    item_id: &str,
    item_name: &str,
    requested: u64,
    stock: &dyn StockLookup,
) -> Result<(), InventoryViolation> {
    match stock.available(item_id) {
        Some(available) if requested > available => Err(InventoryViolation {
            item_id: item_id.to_string(),
            item_name: item_name.to_string(),
            requested,
            available,
        }),
        _ => Ok(()),
    }
}

/// First active, non-rejected line asking for more than is in stock.
pub fn find_inventory_violation<F>(
    lines: &[Line],
    stock: &dyn StockLookup,
    store_can_see_dept: F,
) -> Option<InventoryViolation>
where
    F: Fn(&str) -> bool,
{
    lines
        .iter()
        .filter(|line| {
            !matches!(
                line.normalized_status(),
                NormalizedStatus::Deleted | NormalizedStatus::OwnerRejected
            )
        })
        .filter(|line| store_can_see_dept(&line.owner_dept_id))
        .find_map(|line| {
            check_quantity(&line.item_id, &line.item_name, u64::from(line.qty), stock).err()
        })
}
