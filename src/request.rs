//! The request aggregate: header, embedded lines and the activity log.
use crate::activity::ActivityLog;
use crate::actor::ActorStamp;
use crate::lifecycle::RequestStatus;
use crate::line::Line;
use crate::revision::Revision;
use chrono::{Datelike, NaiveDate};
use std::collections::BTreeMap;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Default, PartialEq, Eq)]
pub struct Creator {
    #[n(0)]
    pub uid: String,
    #[n(1)]
    pub full_name: String,
    #[n(2)]
    pub department_id: Option<String>,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct RequestDoc {
    #[n(0)]
    pub rq_code: String,
    #[n(1)]
    pub status: RequestStatus,
    #[n(2)]
    pub project_id: String,
    #[n(3)]
    pub engineer_id: String,
    #[n(4)]
    pub urgent: bool,
    #[n(5)]
    pub note: String,
    #[n(6)]
    pub created_by: Creator,
    #[n(7)]
    pub created_at_ms: u64,
    #[n(8)]
    pub line_dept_ids: Vec<String>, // derived, kept for department queries
    #[n(9)]
    pub updated_at: Revision,
    #[n(10)]
    pub lines: Vec<Line>,
    #[n(11)]
    pub activity_log: ActivityLog,
    #[n(12)]
    pub canceled_by: Option<ActorStamp>,
}

impl RequestDoc {
    pub fn new(rq_code: &str, created_by: Creator, created_at_ms: u64) -> Self {
        Self {
            rq_code: rq_code.to_string(),
            status: RequestStatus::Draft,
            project_id: String::new(),
            engineer_id: String::new(),
            urgent: false,
            note: String::new(),
            created_by,
            created_at_ms,
            line_dept_ids: Vec::new(),
            updated_at: Revision::NONE,
            lines: Vec::new(),
            activity_log: ActivityLog::default(),
            canceled_by: None,
        }
    }

    /// Department the request originates from.
    pub fn from_dept(&self) -> Option<&str> {
        self.created_by.department_id.as_deref()
    }

    pub fn active_lines(&self) -> impl Iterator<Item = &Line> {
        self.lines.iter().filter(|l| !l.is_deleted())
    }

    pub fn line(&self, key: &str) -> Option<&Line> {
        self.lines.iter().find(|l| l.key == key)
    }

    /// True when any active line, or the recorded department index, belongs
    /// to one of `depts`.
    pub fn touches_any_department(&self, depts: &[String]) -> bool {
        let wanted: Vec<String> = depts.iter().map(|d| d.to_uppercase()).collect();
        let hit = |dept: &str| wanted.contains(&dept.to_uppercase());
        self.active_lines().any(|l| hit(&l.owner_dept_id))
            || self.line_dept_ids.iter().any(|d| hit(d))
    }
}

/// Unique owner departments of the active lines, plus the origin department.
pub fn derive_line_dept_ids(lines: &[Line], from_dept: Option<&str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let owners = lines
        .iter()
        .filter(|l| !l.is_deleted())
        .map(|l| l.owner_dept_id.trim());
    for dept in owners.chain(from_dept.map(str::trim)) {
        if !dept.is_empty() && !out.iter().any(|d| d == dept) {
            out.push(dept.to_string());
        }
    }
    out
}

/// Requested quantity per catalog item over the lines the store must fulfil.
pub fn aggregate_quantities(lines: &[Line]) -> BTreeMap<String, u64> {
    let mut totals = BTreeMap::new();
    for line in lines {
        if line.item_id.is_empty() || line.qty == 0 || !line.counts_toward_fulfilment() {
            continue;
        }
        *totals.entry(line.item_id.clone()).or_insert(0) += u64::from(line.qty);
    }
    totals
}

/// Three letter code used as the request code prefix.
pub fn dept_code(from_dept: Option<&str>, store_dept_name: &str, default_code: &str) -> String {
    match from_dept.map(str::trim).filter(|d| !d.is_empty()) {
        Some(dept) if dept == store_dept_name => "STR".to_string(),
        Some(dept) => dept.chars().take(3).collect::<String>().to_uppercase(),
        None => default_code.to_string(),
    }
}

/// One sequence per department per day.
pub fn counter_id(dept_code: &str, date: NaiveDate) -> String {
    format!("{dept_code}-{}", date.format("%Y%m%d"))
}

/// `TRP-0312007`: department, month, day, zero padded sequence.
pub fn format_rq_code(dept_code: &str, date: NaiveDate, seq: u64, digits: usize) -> String {
    format!(
        "{dept_code}-{:02}{:02}{seq:0digits$}",
        date.month(),
        date.day()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::ActorStamp;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 12).unwrap()
    }

    #[test]
    fn request_code_matches_house_format() {
        let code = dept_code(Some("Transport"), "Store", "GEN");
        assert_eq!(code, "TRA");
        assert_eq!(counter_id("TRP", date()), "TRP-20250312");
        assert_eq!(format_rq_code("TRP", date(), 7, 3), "TRP-0312007");
        assert_eq!(dept_code(Some("Store"), "Store", "GEN"), "STR");
        assert_eq!(dept_code(None, "Store", "GEN"), "GEN");
    }

    #[test]
    fn line_departments_skip_removed_lines_and_include_origin() {
        let lines = vec![
            Line::new("a", "HSE-001", "HSE", "PCS", 1),
            Line::new("b", "IT-001", "IT", "PCS", 1).removed(None),
            Line::new("c", "HSE-002", "HSE", "PCS", 1),
        ];
        assert_eq!(derive_line_dept_ids(&lines, Some("TRP")), ["HSE", "TRP"]);
    }

    #[test]
    fn aggregation_skips_rejected_and_removed_lines() {
        let stamp = ActorStamp::default();
        let lines = vec![
            Line::new("a", "HSE-001", "HSE", "PCS", 4),
            Line::new("b", "HSE-001", "HSE", "PCS", 6).approved(stamp.clone()),
            Line::new("c", "IT-001", "IT", "PCS", 3).rejected(stamp.clone()),
            Line::new("d", "IT-002", "IT", "PCS", 3).removed(None),
            Line::new("e", "IT-003", "IT", "PCS", 0),
        ];
        let totals = aggregate_quantities(&lines);

        assert_eq!(totals.len(), 1);
        assert_eq!(totals.get("HSE-001"), Some(&10));
    }
}
