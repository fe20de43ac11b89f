//! In-memory editing session over one request.
//!
//! The editor holds the request as loaded plus the user's pending changes.
//! Every mutation is checked against the actor's permissions for the stored
//! stage; nothing touches the store until the service commits the document
//! returned by [`RequestEditor::prepare_save`].
use crate::activity::{ActivityActor, Labels, build_save_entry};
use crate::actor::{Actor, ActorStamp};
use crate::catalog::CatalogItem;
use crate::error::{RequestError, Result, ValidationError};
use crate::inventory::{CatalogSnapshot, StockLookup, check_quantity, find_inventory_violation};
use crate::lifecycle::{RequestStatus, derive_lifecycle_status};
use crate::line::{Line, LineStatus};
use crate::notes::NoteAccess;
use crate::permissions::Permissions;
use crate::request::{Creator, RequestDoc, derive_line_dept_ids};
use crate::revision::Revision;
use crate::units::normalize_unit_code;
use crate::utils::{new_line_key, now_ms};
use std::collections::{HashMap, HashSet};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveMode {
    Draft,
    Submit,
}

/// Single-line actions that are also committed on their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineAction {
    Approve,
    Unapprove,
    Reject,
    Remove,
    Restore,
}

/// Saved removals and rejections stay put until an owner undoes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lock {
    Removed,
    Rejected,
}

#[derive(Debug, Clone)]
pub struct RequestEditor {
    actor: Actor,
    store_department: String,
    base: Option<RequestDoc>,
    expected: Revision,
    project_id: String,
    engineer_id: String,
    urgent: bool,
    note: String,
    lines: Vec<Line>,
    locks: HashMap<String, Lock>,
}

impl RequestEditor {
    /// Session for a request that does not exist yet.
    pub fn create(actor: Actor, store_department: &str) -> Self {
        Self {
            actor,
            store_department: store_department.to_string(),
            base: None,
            expected: Revision::NONE,
            project_id: String::new(),
            engineer_id: String::new(),
            urgent: false,
            note: String::new(),
            lines: Vec::new(),
            locks: HashMap::new(),
        }
    }

    /// Session over a stored request, remembering its revision.
    pub fn open(actor: Actor, doc: RequestDoc, store_department: &str) -> Self {
        let locks = doc
            .lines
            .iter()
            .filter_map(|line| {
                let lock = if line.is_deleted() {
                    Lock::Removed
                } else if line.status() == LineStatus::OwnerRejected {
                    Lock::Rejected
                } else {
                    return None;
                };
                Some((line.key.clone(), lock))
            })
            .collect();
        Self {
            actor,
            store_department: store_department.to_string(),
            expected: doc.updated_at,
            project_id: doc.project_id.clone(),
            engineer_id: doc.engineer_id.clone(),
            urgent: doc.urgent,
            note: doc.note.clone(),
            lines: doc.lines.clone(),
            locks,
            base: Some(doc),
        }
    }

    /// Adopts the document just written as the new base.
    pub fn mark_saved(&mut self, doc: RequestDoc) {
        let actor = std::mem::take(&mut self.actor);
        *self = Self::open(actor, doc, &self.store_department);
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }
    pub fn base(&self) -> Option<&RequestDoc> {
        self.base.as_ref()
    }
    pub fn rq_code(&self) -> Option<&str> {
        self.base.as_ref().map(|b| b.rq_code.as_str())
    }
    pub fn expected_revision(&self) -> Revision {
        self.expected
    }
    pub fn project_id(&self) -> &str {
        &self.project_id
    }
    pub fn engineer_id(&self) -> &str {
        &self.engineer_id
    }
    pub fn urgent(&self) -> bool {
        self.urgent
    }
    pub fn note(&self) -> &str {
        &self.note
    }
    pub fn lines(&self) -> &[Line] {
        &self.lines
    }
    pub fn line(&self, key: &str) -> Option<&Line> {
        self.lines.iter().find(|l| l.key == key)
    }
    pub fn is_locked(&self, key: &str) -> bool {
        self.locks.contains_key(key)
    }

    pub fn permissions(&self) -> Permissions<'_> {
        Permissions::new(&self.actor, self.base.as_ref(), &self.store_department)
    }

    /// Stored status, DRAFT while composing.
    pub fn status(&self) -> RequestStatus {
        self.permissions().base_status()
    }

    /// Status the request would take if saved now, when it differs from the
    /// stored one. Only stages whose status follows the lines preview.
    pub fn preview_status(&self) -> Option<RequestStatus> {
        let base = self.base.as_ref()?;
        if !base.status.in_approval_window() {
            return None;
        }
        let derived = derive_lifecycle_status(&self.lines, base.status);
        (derived != base.status).then_some(derived)
    }

    fn position(&self, key: &str) -> Result<usize> {
        self.lines
            .iter()
            .position(|l| l.key == key)
            .ok_or_else(|| ValidationError::UnknownLine(key.to_string()).into())
    }

    fn stamp(&self, dept: Option<&str>) -> ActorStamp {
        self.actor.stamp(dept, now_ms())
    }

    fn header_guard(&self) -> Result<()> {
        if self.permissions().can_edit_header() {
            Ok(())
        } else {
            Err(RequestError::denied("you cannot change this request's header"))
        }
    }

    pub fn set_project(&mut self, project_id: &str) -> Result<()> {
        self.header_guard()?;
        self.project_id = project_id.trim().to_string();
        Ok(())
    }

    pub fn set_engineer(&mut self, engineer_id: &str) -> Result<()> {
        self.header_guard()?;
        self.engineer_id = engineer_id.trim().to_string();
        Ok(())
    }

    pub fn set_urgent(&mut self, urgent: bool) -> Result<()> {
        self.header_guard()?;
        self.urgent = urgent;
        Ok(())
    }

    pub fn note_access(&self) -> NoteAccess {
        let perms = self.permissions();
        if perms.can_fully_edit_notes() {
            NoteAccess::Full
        } else if perms.can_append_notes(&self.lines) {
            NoteAccess::AppendOnly {
                locked_prefix: self.base.as_ref().map(|b| b.note.clone()).unwrap_or_default(),
            }
        } else {
            NoteAccess::ReadOnly
        }
    }

    /// Applies a note edit and returns the note as kept.
    pub fn edit_note(&mut self, value: &str) -> Result<&str> {
        let kept = self
            .note_access()
            .apply(value)
            .ok_or_else(|| RequestError::denied("you cannot edit the note"))?;
        self.note = kept;
        Ok(&self.note)
    }

    /// Validates a line's item, unit and quantity. `editing` is the index of
    /// the line being replaced, which does not count as a duplicate.
    fn checked_item<'c>(
        &self,
        catalog: &'c CatalogSnapshot,
        item_id: &str,
        unit: &str,
        qty: u32,
        editing: Option<usize>,
    ) -> Result<(&'c CatalogItem, String)> {
        let item = catalog
            .get(item_id)
            .ok_or_else(|| ValidationError::UnknownItem(item_id.to_string()))?;
        let name = item.display_name();
        if item.owner_dept_id.is_empty() {
            return Err(ValidationError::MissingOwnerDept(name.to_string()).into());
        }
        let unit = match normalize_unit_code(unit) {
            u if u.is_empty() => item.default_unit().to_string(),
            u => u,
        };
        if unit.is_empty() {
            return Err(ValidationError::MissingUnit(name.to_string()).into());
        }
        if qty == 0 {
            return Err(ValidationError::ZeroQuantity(name.to_string()).into());
        }
        // removed lines keep their item; bring them back instead of re-adding
        let duplicate = self
            .lines
            .iter()
            .enumerate()
            .any(|(idx, l)| Some(idx) != editing && l.item_id == item.item_code);
        if duplicate {
            return Err(ValidationError::DuplicateItem(name.to_string()).into());
        }

        let perms = self.permissions();
        if !perms.can_edit_header() && !self.actor.in_department(&item.owner_dept_id) {
            return Err(RequestError::denied(format!(
                "{name} belongs to {}, which is not one of your departments",
                item.owner_dept_id
            )));
        }
        if perms.store_team_can_see_dept(&item.owner_dept_id) {
            check_quantity(&item.item_code, name, u64::from(qty), catalog)?;
        }
        Ok((item, unit))
    }

    /// Adds a line for a catalog item and returns its key.
    pub fn add_line(
        &mut self,
        catalog: &CatalogSnapshot,
        item_id: &str,
        unit: &str,
        qty: u32,
    ) -> Result<String> {
        if !self.permissions().can_add_lines() {
            return Err(RequestError::denied("lines can only be added to a draft"));
        }
        let (item, unit) = self.checked_item(catalog, item_id, unit, qty, None)?;
        let key = new_line_key();
        let line = Line::new(&key, &item.item_code, &item.owner_dept_id, &unit, qty)
            .set_item_name(item.display_name());
        self.lines.push(line);
        Ok(key)
    }

    /// Replaces a line's item, unit and quantity. Any owner decision on the
    /// line is dropped.
    pub fn edit_line(
        &mut self,
        catalog: &CatalogSnapshot,
        key: &str,
        item_id: &str,
        unit: &str,
        qty: u32,
    ) -> Result<()> {
        let idx = self.position(key)?;
        if self.is_locked(key) || self.lines[idx].is_deleted() {
            return Err(ValidationError::LockedLine(key.to_string()).into());
        }
        if !self.permissions().can_edit_lines(&self.lines) {
            return Err(RequestError::denied("you cannot edit lines on this request"));
        }
        let (item, unit) = self.checked_item(catalog, item_id, unit, qty, Some(idx))?;
        let (item_code, owner, name) = (
            item.item_code.clone(),
            item.owner_dept_id.clone(),
            item.display_name().to_string(),
        );

        let line = &mut self.lines[idx];
        line.item_id = item_code;
        line.item_name = name;
        line.owner_dept_id = owner;
        line.unit = unit;
        line.qty = qty;
        line.reset_approval();
        Ok(())
    }

    /// Drafts drop the line outright. Past DRAFT the line is marked removed,
    /// or brought back if it was removed in this session.
    pub fn toggle_delete_line(&mut self, key: &str) -> Result<()> {
        let idx = self.position(key)?;
        let locked = self.locks.get(key) == Some(&Lock::Removed);
        if locked {
            return Err(ValidationError::LockedLine(key.to_string()).into());
        }
        let perms = self.permissions();
        if !perms.can_delete_line(locked, &self.lines) {
            return Err(RequestError::denied("you cannot remove lines from this request"));
        }
        if perms.is_draft_server() {
            self.lines.remove(idx);
            return Ok(());
        }
        if self.lines[idx].is_deleted() {
            self.ensure_unique_active(idx)?;
            self.lines[idx].restore();
        } else {
            let stamp = self.stamp(self.actor.primary_department());
            self.lines[idx].remove(Some(stamp));
        }
        Ok(())
    }

    /// Brings back a removed line as pending.
    pub fn restore_line(&mut self, key: &str) -> Result<()> {
        let idx = self.position(key)?;
        let line = &self.lines[idx];
        if !line.is_deleted() {
            return Err(ValidationError::Unchanged(key.to_string()).into());
        }
        if !self.permissions().can_restore_line(line) {
            return Err(RequestError::denied("only the owning department can restore a line"));
        }
        self.ensure_unique_active(idx)?;
        self.lines[idx].restore();
        self.locks.remove(key);
        Ok(())
    }

    /// Approves a line. A removed line is brought back approved.
    pub fn approve_line(&mut self, key: &str, stock: &dyn StockLookup) -> Result<()> {
        let idx = self.position(key)?;
        let perms = self.permissions();
        let line = &self.lines[idx];
        if !perms.can_approve_line(line) {
            return Err(RequestError::denied(format!(
                "you cannot approve lines owned by {}",
                line.owner_dept_id
            )));
        }
        if line.is_deleted() {
            self.ensure_unique_active(idx)?;
        }
        if perms.store_team_can_see_dept(&line.owner_dept_id) {
            check_quantity(&line.item_id, &line.item_name, u64::from(line.qty), stock)?;
        }
        let stamp = self.stamp(Some(&line.owner_dept_id));
        self.lines[idx].approve(stamp);
        self.locks.remove(key);
        Ok(())
    }

    pub fn unapprove_line(&mut self, key: &str) -> Result<()> {
        let idx = self.position(key)?;
        let line = &self.lines[idx];
        if line.status() != LineStatus::OwnerApproved {
            return Err(ValidationError::Unchanged(key.to_string()).into());
        }
        if !self.permissions().can_approve_line(line) {
            return Err(RequestError::denied(format!(
                "you cannot change approvals of lines owned by {}",
                line.owner_dept_id
            )));
        }
        self.lines[idx].reset_approval();
        Ok(())
    }

    /// Rejects a line; rejecting an already rejected line sets it back to
    /// pending. A removed line is brought back rejected.
    pub fn reject_line(&mut self, key: &str) -> Result<()> {
        let idx = self.position(key)?;
        let line = &self.lines[idx];
        if !self.permissions().can_reject_line(line) {
            return Err(RequestError::denied("you cannot reject this line"));
        }
        let was_removed = line.is_deleted();
        if was_removed {
            self.ensure_unique_active(idx)?;
        }
        if line.status() == LineStatus::OwnerRejected {
            self.lines[idx].reset_approval();
            self.locks.remove(key);
        } else {
            let stamp = self.stamp(Some(&line.owner_dept_id));
            self.lines[idx].reject(stamp);
            if was_removed {
                self.locks.insert(key.to_string(), Lock::Rejected);
            }
        }
        Ok(())
    }

    pub fn apply(&mut self, key: &str, action: LineAction, stock: &dyn StockLookup) -> Result<()> {
        match action {
            LineAction::Approve => self.approve_line(key, stock),
            LineAction::Unapprove => self.unapprove_line(key),
            LineAction::Reject => self.reject_line(key),
            LineAction::Remove => self.toggle_delete_line(key),
            LineAction::Restore => self.restore_line(key),
        }
    }

    /// A line may only come back while no other active line holds its item.
    fn ensure_unique_active(&self, idx: usize) -> Result<()> {
        let line = &self.lines[idx];
        let taken = self
            .lines
            .iter()
            .enumerate()
            .any(|(i, l)| i != idx && !l.is_deleted() && l.item_id == line.item_id);
        if taken {
            return Err(ValidationError::DuplicateItem(line.item_name.clone()).into());
        }
        Ok(())
    }

    fn from_dept(&self) -> Option<String> {
        self.permissions()
            .from_dept()
            .map(str::to_string)
            .or_else(|| self.lines.first().map(|l| l.owner_dept_id.clone()))
            .filter(|d| !d.is_empty())
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.project_id.is_empty() {
            return Err(ValidationError::MissingProject);
        }
        if self.engineer_id.is_empty() {
            return Err(ValidationError::MissingEngineer);
        }
        if self.lines.is_empty() {
            return Err(ValidationError::NoLines);
        }
        let mut seen = HashSet::new();
        for line in self.lines.iter().filter(|l| !l.is_deleted()) {
            if !seen.insert(line.item_id.as_str()) {
                return Err(ValidationError::DuplicateItem(line.item_name.clone()));
            }
            if line.owner_dept_id.is_empty() {
                return Err(ValidationError::MissingOwnerDept(line.item_name.clone()));
            }
            if line.unit.is_empty() {
                return Err(ValidationError::MissingUnit(line.item_name.clone()));
            }
            if line.qty == 0 {
                return Err(ValidationError::ZeroQuantity(line.item_name.clone()));
            }
        }
        Ok(())
    }

    /// Status written by a non-draft save or a line action.
    fn next_status(&self, lines: &[Line], first_submit: bool) -> RequestStatus {
        let perms = self.permissions();
        let stored = perms.base_status();
        if first_submit && perms.is_draft_server() {
            return RequestStatus::Submitted;
        }
        if !stored.in_approval_window() || !perms.allow_lifecycle_change(lines) {
            return stored;
        }
        let derived = derive_lifecycle_status(lines, stored);
        debug!(from = %stored, to = %derived, "derived request status");
        derived
    }

    fn assemble(&self, status: RequestStatus, lines: Vec<Line>) -> RequestDoc {
        let from_dept = self.from_dept();
        let created_by = match &self.base {
            Some(base) => base.created_by.clone(),
            None => Creator {
                uid: self.actor.uid.clone(),
                full_name: self.actor.display_name().to_string(),
                department_id: from_dept.clone(),
            },
        };
        let mut next = match &self.base {
            Some(base) => base.clone(),
            None => RequestDoc::new("", created_by.clone(), now_ms()),
        };
        next.created_by = created_by;
        next.project_id = self.project_id.clone();
        next.engineer_id = self.engineer_id.clone();
        next.urgent = self.urgent;
        next.note = self.note.clone();
        next.line_dept_ids = derive_line_dept_ids(&lines, from_dept.as_deref());
        next.lines = lines;
        if status == RequestStatus::Canceled && next.status != RequestStatus::Canceled {
            next.canceled_by = Some(self.stamp(self.actor.primary_department()));
        }
        next.status = status;
        next
    }

    /// Builds the document to commit for a save. Revision and activity log
    /// are filled in by [`finalize_write`] inside the store transaction.
    pub fn prepare_save(&self, mode: SaveMode, stock: &dyn StockLookup) -> Result<RequestDoc> {
        let perms = self.permissions();
        match &self.base {
            None if !perms.can_initiate_request() => {
                return Err(RequestError::denied("you cannot create requests"));
            }
            Some(_) if !perms.can_persist(&self.lines) => {
                // append-only note savers keep everything else as stored
                if !perms.can_append_notes(&self.lines) {
                    return Err(RequestError::denied("you cannot modify this request"));
                }
                return self.prepare_note_save();
            }
            _ => {}
        }
        self.validate()?;

        match mode {
            SaveMode::Draft => {
                if !perms.is_draft_server() {
                    return Err(RequestError::InvalidTransition {
                        from: perms.base_status(),
                        to: RequestStatus::Draft,
                    });
                }
                let lines = self
                    .lines
                    .iter()
                    .filter(|l| !l.is_deleted())
                    .cloned()
                    .map(|mut l| {
                        l.reset_approval();
                        l
                    })
                    .collect();
                Ok(self.assemble(RequestStatus::Draft, lines))
            }
            SaveMode::Submit => {
                if let Some(violation) = find_inventory_violation(&self.lines, stock, |dept| {
                    perms.store_team_can_see_dept(dept)
                }) {
                    return Err(violation.into());
                }
                let status = self.next_status(&self.lines, true);
                Ok(self.assemble(status, self.lines.clone()))
            }
        }
    }

    fn prepare_note_save(&self) -> Result<RequestDoc> {
        let mut next = self
            .base
            .clone()
            .ok_or_else(|| RequestError::denied("nothing to save"))?;
        next.note = self.note.clone();
        Ok(next)
    }

    /// Builds the document to commit after line actions on a stored request.
    /// Unlike a full save the header is not revalidated.
    pub fn prepare_line_update(&self) -> Result<RequestDoc> {
        if self.base.is_none() {
            return Err(RequestError::denied("line actions need a saved request"));
        }
        let status = self.next_status(&self.lines, false);
        Ok(self.assemble(status, self.lines.clone()))
    }
}

/// Stamps `next` with its new revision and prepends the save entry to the
/// log of `prev`, the live document it replaces.
pub fn finalize_write(
    prev: Option<&RequestDoc>,
    mut next: RequestDoc,
    actor: &Actor,
    labels: &dyn Labels,
    revision: Revision,
    now_ms: u64,
    log_limit: usize,
) -> RequestDoc {
    next.updated_at = revision;
    let entry = build_save_entry(
        prev,
        &next,
        ActivityActor::from_actor(actor, actor.primary_department()),
        labels,
        now_ms,
    );
    let log = prev.map(|p| p.activity_log.clone()).unwrap_or_default();
    next.activity_log = log.prepended(entry, log_limit);
    next
}
