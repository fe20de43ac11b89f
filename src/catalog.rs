//! Reference documents read by the core: catalog items, projects, engineers.
//!
//! Only `CatalogItem::qty` is ever written back, and only when the store
//! marks a request ready.
use crate::units::normalize_unit_code;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Default, PartialEq)]
pub struct CatalogItem {
    #[n(0)]
    pub item_code: String,
    #[n(1)]
    pub name: String,
    #[n(2)]
    pub owner_dept_id: String,
    #[n(3)]
    pub unit: String,
    #[n(4)]
    pub allowed_units: Vec<String>,
    #[n(5)]
    pub qty: Option<u64>, // stock in base units, absent when never counted
}

impl CatalogItem {
    pub fn new(item_code: &str) -> Self {
        Self {
            item_code: item_code.to_string(),
            ..Self::default()
        }
    }
    pub fn set_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }
    pub fn set_owner_dept(mut self, dept: &str) -> Self {
        self.owner_dept_id = dept.trim().to_string();
        self
    }
    pub fn set_unit(mut self, unit: &str) -> Self {
        self.unit = normalize_unit_code(unit);
        self
    }
    pub fn add_allowed_unit(mut self, unit: &str) -> Self {
        self.allowed_units.push(normalize_unit_code(unit));
        self
    }
    pub fn set_qty(mut self, qty: u64) -> Self {
        self.qty = Some(qty);
        self
    }

    /// Display name, falling back to the item code.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.item_code
        } else {
            &self.name
        }
    }

    /// Unit preselected when the item is added to a request.
    pub fn default_unit(&self) -> &str {
        self.allowed_units
            .first()
            .map(String::as_str)
            .unwrap_or(self.unit.as_str())
    }
}

/// A project or an engineer: looked up for labels only.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Default, PartialEq, Eq)]
pub struct Reference {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub name: String,
    #[n(2)]
    pub active: bool,
}

impl Reference {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            active: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_unit_prefers_allowed_units() {
        let item = CatalogItem::new("HSE-001").set_unit("pcs");
        assert_eq!(item.default_unit(), "PCS");

        let item = item.add_allowed_unit("box");
        assert_eq!(item.default_unit(), "BOX");
    }
}
