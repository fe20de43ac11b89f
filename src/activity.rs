//! Activity journal for requests.
//!
//! Every accepted write prepends exactly one entry describing what changed
//! between the stored document and the one being written. Entries are never
//! edited; the log only keeps the newest [`ACTIVITY_LOG_LIMIT`] of them.
use crate::actor::Actor;
use crate::lifecycle::RequestStatus;
use crate::line::{Line, stable_key};
use crate::request::RequestDoc;
use crate::utils::new_event_id;
use std::collections::HashMap;

pub const ACTIVITY_LOG_LIMIT: usize = 50;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cbor(index_only)]
pub enum ActivityKind {
    #[n(0)]
    RequestCreated,
    #[n(1)]
    RequestUpdated,
    #[n(2)]
    RequestSaved,
    #[n(3)]
    StatusTransition,
    #[n(4)]
    RequestCanceled,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::RequestCreated => "request_created",
            ActivityKind::RequestUpdated => "request_updated",
            ActivityKind::RequestSaved => "request_saved",
            ActivityKind::StatusTransition => "status_transition",
            ActivityKind::RequestCanceled => "request_canceled",
        }
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityActor {
    #[n(0)]
    pub uid: Option<String>,
    #[n(1)]
    pub full_name: Option<String>,
    #[n(2)]
    pub dept_id: Option<String>,
}

impl ActivityActor {
    pub fn from_actor(actor: &Actor, dept_id: Option<&str>) -> Self {
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
        Self {
            uid: non_empty(&actor.uid),
            full_name: non_empty(&actor.full_name),
            dept_id: dept_id.and_then(non_empty),
        }
    }

    fn name(&self) -> Option<&str> {
        self.full_name.as_deref().or(self.uid.as_deref())
    }

    /// `Name (DEPT)`, used in entry summaries.
    pub fn summary_label(&self) -> String {
        let name = self.name().unwrap_or("User");
        match &self.dept_id {
            Some(dept) => format!("{name} ({dept})"),
            None => name.to_string(),
        }
    }

    /// `Name - DEPT`, used when listing entries.
    pub fn label(&self) -> String {
        let name = self.name().unwrap_or("Unknown user");
        match &self.dept_id {
            Some(dept) => format!("{name} - {dept}"),
            None => name.to_string(),
        }
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct ActivityEntry {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub kind: ActivityKind,
    #[n(2)]
    pub summary: String,
    #[n(3)]
    pub details: String,
    #[n(4)]
    pub actor: ActivityActor,
    #[n(5)]
    pub created_at_ms: u64,
    #[n(6)]
    pub status_key: Option<RequestStatus>,
}

impl ActivityEntry {
    pub fn new(
        kind: ActivityKind,
        summary: String,
        details: String,
        actor: ActivityActor,
        created_at_ms: u64,
        status_key: Option<RequestStatus>,
    ) -> Self {
        Self {
            id: new_event_id(created_at_ms),
            kind,
            summary,
            details,
            actor,
            created_at_ms,
            status_key,
        }
    }

    /// Status the request had after this entry, recovered from the details
    /// text for entries written without a status key.
    pub fn resolved_status(&self) -> Option<RequestStatus> {
        self.status_key
            .or_else(|| extract_status_from_details(&self.details))
    }
}

/// Newest first, capped.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityLog {
    #[n(0)]
    entries: Vec<ActivityEntry>,
}

impl ActivityLog {
    pub fn entries(&self) -> &[ActivityEntry] {
        &self.entries
    }
    pub fn latest(&self) -> Option<&ActivityEntry> {
        self.entries.first()
    }
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns a new log with `entry` on top; the oldest entries past `limit`
    /// are discarded for good.
    pub fn prepended(&self, entry: ActivityEntry, limit: usize) -> Self {
        let mut entries = Vec::with_capacity(limit.min(self.entries.len() + 1));
        entries.push(entry);
        entries.extend(self.entries.iter().cloned());
        entries.truncate(limit);
        Self { entries }
    }
}

/// Looks up display names for ids referenced by a request.
pub trait Labels {
    fn project_name(&self, id: &str) -> Option<String>;
    fn engineer_name(&self, id: &str) -> Option<String>;
}

/// Labels every id as itself.
pub struct NoLabels;

impl Labels for NoLabels {
    fn project_name(&self, _id: &str) -> Option<String> {
        None
    }
    fn engineer_name(&self, _id: &str) -> Option<String> {
        None
    }
}

#[derive(Debug, Clone, Default)]
pub struct LabelIndex {
    pub projects: HashMap<String, String>,
    pub engineers: HashMap<String, String>,
}

impl Labels for LabelIndex {
    fn project_name(&self, id: &str) -> Option<String> {
        self.projects.get(id).cloned()
    }
    fn engineer_name(&self, id: &str) -> Option<String> {
        self.engineers.get(id).cloned()
    }
}

fn describe(id: &str, name: Option<String>) -> String {
    if id.is_empty() {
        return "Unassigned".to_string();
    }
    name.filter(|n| !n.is_empty())
        .unwrap_or_else(|| id.to_string())
}

#[derive(Debug, Default)]
struct ChangeDetails {
    lines: Vec<String>,
}

impl ChangeDetails {
    fn add(&mut self, label: &str, body: &str) {
        if body.is_empty() {
            self.lines.push(label.to_string());
        } else {
            self.lines.push(format!("{label}: {body}"));
        }
    }

    fn add_list(&mut self, label: &str, items: &[String]) {
        if items.is_empty() {
            return;
        }
        self.lines
            .push(format!("{label}:\n - {}", items.join("\n - ")));
    }
}

/// How the note moved between two saves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteChange {
    Added(String),
    Cleared(String),
    Appended(String),
    Updated(String),
}

impl NoteChange {
    pub fn between(prev: &str, next: &str) -> Option<Self> {
        if prev == next {
            return None;
        }
        let appended = if !prev.is_empty() && next.starts_with(prev) {
            next[prev.len()..].trim()
        } else {
            ""
        };
        let change = if prev.is_empty() && !next.is_empty() {
            NoteChange::Added(next.to_string())
        } else if !prev.is_empty() && next.is_empty() {
            NoteChange::Cleared(prev.to_string())
        } else if !appended.is_empty() {
            NoteChange::Appended(appended.to_string())
        } else {
            NoteChange::Updated(next.to_string())
        };
        Some(change)
    }

    fn render(&self, details: &mut ChangeDetails) {
        match self {
            NoteChange::Added(text) => details.add("Note added", text),
            NoteChange::Cleared(text) => details.add("Note cleared", text),
            NoteChange::Appended(text) => details.add("Note appended", text),
            NoteChange::Updated(text) => details.add("Note updated", text),
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct LineDiff {
    pub added: Vec<String>,
    pub updated: Vec<String>,
    pub removed: Vec<String>,
}

impl LineDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }
}

/// Three-way diff of two line lists matched by [`stable_key`].
pub fn diff_lines(prev: &[Line], next: &[Line]) -> LineDiff {
    let mut order: Vec<String> = Vec::new();
    let mut remaining: HashMap<String, &Line> = HashMap::new();
    for (idx, line) in prev.iter().enumerate() {
        let key = stable_key(line, idx);
        if remaining.insert(key.clone(), line).is_none() {
            order.push(key);
        }
    }

    let mut diff = LineDiff::default();
    for (idx, line) in next.iter().enumerate() {
        let key = stable_key(line, idx);
        let Some(before) = remaining.remove(&key) else {
            diff.added
                .push(format!("{} ({})", line.label(), line.qty_label()));
            continue;
        };

        let mut parts = Vec::new();
        if before.qty != line.qty {
            parts.push(format!("qty {}->{}", before.qty, line.qty));
        }
        if before.unit != line.unit {
            parts.push(format!("unit {}->{}", dash(&before.unit), dash(&line.unit)));
        }
        let (was, now) = (before.normalized_status(), line.normalized_status());
        if was != now {
            parts.push(format!("status {was}->{now}"));
        }
        if before.is_deleted() != line.is_deleted() {
            parts.push(if line.is_deleted() { "marked removed" } else { "restored" }.to_string());
        }
        if !parts.is_empty() {
            diff.updated
                .push(format!("{} ({})", line.label(), parts.join(", ")));
        }
    }

    for key in order {
        if let Some(line) = remaining.get(&key) {
            diff.removed
                .push(format!("{} ({})", line.label(), line.qty_label()));
        }
    }
    diff
}

fn dash(value: &str) -> &str {
    if value.is_empty() { "-" } else { value }
}

fn on_off(flag: bool) -> &'static str {
    if flag { "On" } else { "Off" }
}

/// Detail lines describing the move from `prev` to `next`.
pub fn describe_changes(
    prev: Option<&RequestDoc>,
    next: &RequestDoc,
    labels: &dyn Labels,
) -> Vec<String> {
    let mut details = ChangeDetails::default();
    let project = |id: &str| describe(id, labels.project_name(id));
    let engineer = |id: &str| describe(id, labels.engineer_name(id));

    match prev {
        None => details.add("Initial status", next.status.as_str()),
        Some(prev) if prev.status != next.status => {
            details.add("Status", &format!("{} -> {}", prev.status, next.status))
        }
        Some(_) => {}
    }

    let prev_note = prev.map(|p| p.note.as_str()).unwrap_or("");
    if let Some(change) = NoteChange::between(prev_note, &next.note) {
        change.render(&mut details);
    }

    match prev {
        Some(prev) => {
            if prev.project_id != next.project_id {
                details.add(
                    "Project",
                    &format!("{} -> {}", project(&prev.project_id), project(&next.project_id)),
                );
            }
            if prev.engineer_id != next.engineer_id {
                details.add(
                    "Engineer",
                    &format!(
                        "{} -> {}",
                        engineer(&prev.engineer_id),
                        engineer(&next.engineer_id)
                    ),
                );
            }
            if prev.urgent != next.urgent {
                details.add(
                    "Urgent flag",
                    &format!("{} -> {}", on_off(prev.urgent), on_off(next.urgent)),
                );
            }
            let diff = diff_lines(&prev.lines, &next.lines);
            details.add_list("Items added", &diff.added);
            details.add_list("Items updated", &diff.updated);
            details.add_list("Items removed", &diff.removed);
        }
        None => {
            details.add("Project", &project(&next.project_id));
            details.add("Engineer", &engineer(&next.engineer_id));
            details.add("Items", &next.lines.len().to_string());
        }
    }
    details.lines
}

/// Journal entry for a save of `next` over `prev`.
pub fn build_save_entry(
    prev: Option<&RequestDoc>,
    next: &RequestDoc,
    actor: ActivityActor,
    labels: &dyn Labels,
    now_ms: u64,
) -> ActivityEntry {
    let changes = describe_changes(prev, next, labels);
    let who = actor.summary_label();
    let (kind, summary) = if prev.is_none() {
        (ActivityKind::RequestCreated, format!("{who} created the request"))
    } else if !changes.is_empty() {
        (ActivityKind::RequestUpdated, format!("{who} updated the request"))
    } else {
        (ActivityKind::RequestSaved, format!("{who} saved the request"))
    };
    ActivityEntry::new(
        kind,
        summary,
        changes.join("\n"),
        actor,
        now_ms,
        Some(next.status),
    )
}

pub fn transition_entry(
    kind: ActivityKind,
    summary: &str,
    from: RequestStatus,
    to: RequestStatus,
    actor: ActivityActor,
    now_ms: u64,
) -> ActivityEntry {
    ActivityEntry::new(
        kind,
        summary.to_string(),
        format!("Status: {from} -> {to}"),
        actor,
        now_ms,
        Some(to),
    )
}

/// Reads `Status: A -> B` (yielding B) or `Initial status: S` from details.
pub fn extract_status_from_details(details: &str) -> Option<RequestStatus> {
    for line in details.lines().map(str::trim) {
        let lower = line.to_lowercase();
        if let Some(rest) = lower.strip_prefix("status:") {
            let (_, after) = rest.split_once("->")?;
            return first_token(after)?.parse().ok();
        }
        if let Some(rest) = lower.strip_prefix("initial status") {
            return first_token(rest.trim_start_matches(':'))?.parse().ok();
        }
    }
    None
}

fn first_token(text: &str) -> Option<&str> {
    text.split_whitespace().next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Creator;

    fn doc() -> RequestDoc {
        let mut doc = RequestDoc::new("TRP-0312007", Creator::default(), 1);
        doc.project_id = "p1".into();
        doc.engineer_id = "e1".into();
        doc.lines = vec![Line::new("a", "HSE-001", "HSE", "PCS", 2).set_item_name("Gloves")];
        doc
    }

    fn entry(n: u64) -> ActivityEntry {
        ActivityEntry::new(
            ActivityKind::RequestSaved,
            format!("entry {n}"),
            String::new(),
            ActivityActor::default(),
            n,
            None,
        )
    }

    #[test]
    fn log_is_capped_newest_first() {
        let mut log = ActivityLog::default();
        for n in 0..51 {
            log = log.prepended(entry(n), ACTIVITY_LOG_LIMIT);
        }

        assert_eq!(log.len(), 50);
        assert_eq!(log.latest().map(|e| e.created_at_ms), Some(50));
        assert_eq!(log.entries().last().map(|e| e.created_at_ms), Some(1));
    }

    #[test]
    fn note_changes_are_classified() {
        assert_eq!(NoteChange::between("", ""), None);
        assert_eq!(
            NoteChange::between("", "hi"),
            Some(NoteChange::Added("hi".into()))
        );
        assert_eq!(
            NoteChange::between("hi", ""),
            Some(NoteChange::Cleared("hi".into()))
        );
        assert_eq!(
            NoteChange::between("hi", "hi\nstore: packed"),
            Some(NoteChange::Appended("store: packed".into()))
        );
        assert_eq!(
            NoteChange::between("hi", "bye"),
            Some(NoteChange::Updated("bye".into()))
        );
    }

    #[test]
    fn line_diff_reports_each_kind_of_change() {
        let prev = vec![
            Line::new("a", "HSE-001", "HSE", "PCS", 2).set_item_name("Gloves"),
            Line::new("b", "HSE-002", "HSE", "PCS", 1).set_item_name("Boots"),
            Line::new("c", "IT-001", "IT", "PCS", 1).set_item_name("Mouse"),
        ];
        let mut changed = prev[0].clone();
        changed.qty = 5;
        changed.unit = "BOX".into();
        let next = vec![
            changed,
            prev[1].clone().removed(None),
            Line::new("d", "IT-002", "IT", "EA", 3).set_item_name("Cable"),
        ];

        let diff = diff_lines(&prev, &next);
        assert_eq!(diff.added, ["Cable (IT-002) - IT (3 EA)"]);
        assert_eq!(
            diff.updated,
            [
                "Gloves (HSE-001) - HSE (qty 2->5, unit PCS->BOX)",
                "Boots (HSE-002) - HSE (status PENDING_OWNER->DELETED, marked removed)",
            ]
        );
        assert_eq!(diff.removed, ["Mouse (IT-001) - IT (1 PCS)"]);
    }

    #[test]
    fn creation_entry_lists_initial_values() {
        let next = doc();
        let actor = ActivityActor {
            uid: Some("u1".into()),
            full_name: Some("Mona".into()),
            dept_id: Some("TRP".into()),
        };
        let entry = build_save_entry(None, &next, actor, &NoLabels, 10);

        assert_eq!(entry.kind, ActivityKind::RequestCreated);
        assert_eq!(entry.summary, "Mona (TRP) created the request");
        assert_eq!(
            entry.details,
            "Initial status: DRAFT\nProject: p1\nEngineer: e1\nItems: 1"
        );
        assert_eq!(entry.status_key, Some(RequestStatus::Draft));
    }

    #[test]
    fn identical_save_is_a_plain_save() {
        let prev = doc();
        let entry = build_save_entry(Some(&prev), &prev.clone(), ActivityActor::default(), &NoLabels, 10);

        assert_eq!(entry.kind, ActivityKind::RequestSaved);
        assert_eq!(entry.summary, "User saved the request");
        assert!(entry.details.is_empty());
    }

    #[test]
    fn header_changes_use_labels() {
        let prev = doc();
        let mut next = prev.clone();
        next.status = RequestStatus::Submitted;
        next.project_id = "p2".into();
        next.urgent = true;
        let mut labels = LabelIndex::default();
        labels.projects.insert("p1".into(), "Tower A".into());
        labels.projects.insert("p2".into(), "Tower B".into());

        let changes = describe_changes(Some(&prev), &next, &labels);
        assert_eq!(
            changes,
            [
                "Status: DRAFT -> SUBMITTED",
                "Project: Tower A -> Tower B",
                "Urgent flag: Off -> On",
            ]
        );
    }

    #[test]
    fn status_is_recovered_from_details() {
        assert_eq!(
            extract_status_from_details("Status: FULLY_APPROVED -> STORE_PREPARING"),
            Some(RequestStatus::StorePreparing)
        );
        assert_eq!(
            extract_status_from_details("Initial status: DRAFT\nItems: 1"),
            Some(RequestStatus::Draft)
        );
        assert_eq!(extract_status_from_details("Items: 1"), None);
    }
}
