//! Unit-of-measure table.
//!
//! Each unit carries a multiplier relative to the item's base unit
//! (`per_base` units make up one base unit). Unknown codes and zero
//! multipliers convert as the identity, so conversion never fails.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitOption {
    pub code: &'static str,
    pub label: &'static str,
}

pub const UNIT_OPTIONS: &[UnitOption] = &[
    UnitOption { code: "PCS", label: "Piece" },
    UnitOption { code: "EA", label: "Each" },
    UnitOption { code: "PR", label: "Pair" },
    UnitOption { code: "SET", label: "Set" },
    UnitOption { code: "BOX", label: "Box" },
    UnitOption { code: "PACK", label: "Pack" },
    UnitOption { code: "KG", label: "Kilogram" },
    UnitOption { code: "L", label: "Liter" },
    UnitOption { code: "M", label: "Meter" },
];

#[derive(Debug, Clone, PartialEq)]
pub struct ItemUnit {
    pub code: String,
    pub label: String,
    pub per_base: f64,
}

impl ItemUnit {
    pub fn new(code: &str, label: &str, per_base: f64) -> Self {
        Self {
            code: normalize_unit_code(code),
            label: label.to_string(),
            per_base,
        }
    }
}

/// Conversion table to and from a base unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnitTable {
    units: Vec<ItemUnit>,
}

impl UnitTable {
    pub fn new(units: Vec<ItemUnit>) -> Self {
        Self { units }
    }

    /// Every known unit option with multiplier 1.
    pub fn standard() -> Self {
        Self::new(
            UNIT_OPTIONS
                .iter()
                .map(|u| ItemUnit::new(u.code, u.label, 1.0))
                .collect(),
        )
    }

    pub fn units(&self) -> &[ItemUnit] {
        &self.units
    }

    fn multiplier(&self, unit: &str) -> f64 {
        let code = normalize_unit_code(unit);
        match self.units.iter().find(|u| u.code == code) {
            Some(found) if found.per_base != 0.0 && found.per_base.is_finite() => found.per_base,
            _ => 1.0,
        }
    }

    pub fn to_base(&self, qty: f64, unit: &str) -> f64 {
        qty / self.multiplier(unit)
    }

    pub fn from_base(&self, base_qty: f64, unit: &str) -> f64 {
        base_qty * self.multiplier(unit)
    }
}

pub fn normalize_unit_code(code: &str) -> String {
    code.trim().to_uppercase()
}

pub fn unit_option(code: &str) -> Option<&'static UnitOption> {
    let code = normalize_unit_code(code);
    UNIT_OPTIONS.iter().find(|u| u.code == code)
}

/// `Label (CODE)` for known units, the raw code otherwise.
pub fn unit_label(code: &str) -> String {
    match unit_option(code) {
        Some(found) => format!("{} ({})", found.label, found.code),
        None => code.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boxes_of_twelve() -> UnitTable {
        UnitTable::new(vec![
            ItemUnit::new("pcs", "Piece", 1.0),
            ItemUnit::new("BOX", "Box", 1.0 / 12.0),
            ItemUnit::new("PACK", "Pack", 0.0),
        ])
    }

    #[test]
    fn converts_through_the_multiplier() {
        let table = boxes_of_twelve();

        assert_eq!(table.to_base(24.0, "PCS"), 24.0);
        assert!((table.to_base(2.0, "BOX") - 24.0).abs() < 1e-9);
        assert!((table.from_base(24.0, "box") - 2.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_and_zero_units_pass_through() {
        let table = boxes_of_twelve();

        assert_eq!(table.to_base(7.0, "DRUM"), 7.0);
        assert_eq!(table.from_base(7.0, "PACK"), 7.0);
    }

    #[test]
    fn labels_known_units() {
        assert_eq!(unit_label("kg"), "Kilogram (KG)");
        assert_eq!(unit_label("DRUM"), "DRUM");
    }
}
