//! Role-derived predicates for one actor looking at one request.
//!
//! `base` is the request as stored; `None` while composing a new request.
//! Predicates that depend on the lines being edited take the working lines
//! explicitly, since those differ from the stored ones until saved.
use crate::actor::Actor;
use crate::lifecycle::RequestStatus;
use crate::line::Line;
use crate::request::RequestDoc;

#[derive(Debug, Clone, Copy)]
pub struct Permissions<'a> {
    actor: &'a Actor,
    base: Option<&'a RequestDoc>,
    store_department: &'a str,
}

impl<'a> Permissions<'a> {
    pub fn new(actor: &'a Actor, base: Option<&'a RequestDoc>, store_department: &'a str) -> Self {
        Self {
            actor,
            base,
            store_department,
        }
    }

    pub fn actor(&self) -> &'a Actor {
        self.actor
    }

    fn view_mode(&self) -> bool {
        self.base.is_some()
    }

    /// Status as stored, DRAFT for a new request.
    pub fn base_status(&self) -> RequestStatus {
        self.base.map(|b| b.status).unwrap_or(RequestStatus::Draft)
    }

    pub fn is_draft_server(&self) -> bool {
        self.base_status() == RequestStatus::Draft
    }

    pub fn is_my_request(&self) -> bool {
        match self.base {
            None => true,
            Some(base) => base.created_by.uid.is_empty() || base.created_by.uid == self.actor.uid,
        }
    }

    /// Origin department: the stored one, or the actor's primary department
    /// for a new request.
    pub fn from_dept(&self) -> Option<&'a str> {
        match self.base {
            Some(base) => base.from_dept().or(self.actor.primary_department()),
            None => self.actor.primary_department(),
        }
    }

    pub fn is_my_from_dept(&self) -> bool {
        self.from_dept()
            .map(|d| self.actor.in_department(d))
            .unwrap_or(false)
    }

    fn roles(&self) -> crate::actor::Roles {
        self.actor.roles
    }

    pub fn stage_allows_edits(&self) -> bool {
        !self.view_mode() || self.base_status().is_editable()
    }

    pub fn is_store_dept_user(&self) -> bool {
        self.actor.in_department(self.store_department)
    }

    /// Store department users see every department; store officers only
    /// their own.
    pub fn store_team_can_see_dept(&self, dept: &str) -> bool {
        if self.is_store_dept_user() {
            return true;
        }
        if !self.roles().store_officer {
            return false;
        }
        self.actor.in_department(dept)
    }

    pub fn can_initiate_request(&self) -> bool {
        let r = self.roles();
        r.requester || r.dept_manager || r.admin
    }

    fn can_requester_edit(&self) -> bool {
        self.roles().requester && self.is_my_request()
    }

    fn can_dept_manager_edit(&self) -> bool {
        self.roles().dept_manager && self.is_my_from_dept()
    }

    fn has_lines_from_my_dept(&self, lines: &[Line]) -> bool {
        lines
            .iter()
            .any(|l| self.actor.in_department(&l.owner_dept_id))
            || self.base.is_some_and(|b| {
                b.line_dept_ids
                    .iter()
                    .any(|d| self.actor.in_department(d))
            })
    }

    pub fn dept_manager_on_owned_lines(&self, lines: &[Line]) -> bool {
        self.roles().dept_manager && self.has_lines_from_my_dept(lines)
    }

    pub fn can_edit_header(&self) -> bool {
        self.stage_allows_edits()
            && (self.roles().admin || self.can_requester_edit() || self.can_dept_manager_edit())
    }

    pub fn can_persist(&self, lines: &[Line]) -> bool {
        self.stage_allows_edits()
            && (self.roles().admin
                || self.can_requester_edit()
                || self.can_dept_manager_edit()
                || self.dept_manager_on_owned_lines(lines))
    }

    pub fn can_edit_lines(&self, lines: &[Line]) -> bool {
        self.can_persist(lines)
    }

    pub fn can_add_lines(&self) -> bool {
        let r = self.roles();
        self.is_draft_server()
            && (r.admin
                || (r.requester && self.is_my_request())
                || (r.dept_manager && self.is_my_from_dept()))
    }

    pub fn can_approve_lines(&self) -> bool {
        self.roles().dept_manager && self.base_status().in_approval_window()
    }

    pub fn can_approve_line(&self, line: &Line) -> bool {
        self.can_approve_lines() && self.actor.in_department(&line.owner_dept_id)
    }

    fn allow_reject_window(&self) -> bool {
        !self.is_draft_server() && self.base_status().is_editable()
    }

    pub fn can_reject_line(&self, line: &Line) -> bool {
        self.allow_reject_window()
            && self.roles().dept_manager
            && (self.is_my_from_dept() || self.actor.in_department(&line.owner_dept_id))
    }

    pub fn can_delete_line(&self, line_locked: bool, lines: &[Line]) -> bool {
        if !self.can_edit_lines(lines) || line_locked {
            return false;
        }
        if self.roles().admin {
            return true;
        }
        if !self.is_my_request() {
            return false;
        }
        self.is_draft_server() || self.roles().requester
    }

    /// Explicitly undoing a locked removal.
    pub fn can_restore_line(&self, line: &Line) -> bool {
        self.stage_allows_edits()
            && (self.roles().admin
                || (self.roles().dept_manager && self.actor.in_department(&line.owner_dept_id)))
    }

    pub fn can_cancel_request(&self) -> bool {
        let r = self.roles();
        self.view_mode()
            && self.base_status().is_cancelable()
            && (r.admin
                || (r.requester && self.is_my_request())
                || (r.dept_manager && self.is_my_from_dept()))
    }

    /// Store-driven phase changes on this request.
    pub fn store_can_act(&self) -> bool {
        self.view_mode()
            && (self.roles().admin
                || self
                    .from_dept()
                    .is_some_and(|d| self.store_team_can_see_dept(d)))
    }

    pub fn can_close(&self, lines: &[Line]) -> bool {
        let r = self.roles();
        self.view_mode()
            && self.base_status() == RequestStatus::Ready
            && (r.admin
                || (r.dept_manager
                    && (self.is_my_from_dept() || self.dept_manager_on_owned_lines(lines))))
    }

    pub fn can_fully_edit_notes(&self) -> bool {
        self.stage_allows_edits() && (self.roles().admin || self.can_requester_edit())
    }

    fn can_append_dept_notes(&self, lines: &[Line]) -> bool {
        self.stage_allows_edits()
            && !self.can_fully_edit_notes()
            && self.roles().dept_manager
            && (self.is_my_from_dept() || self.dept_manager_on_owned_lines(lines))
    }

    fn can_append_store_notes(&self, lines: &[Line]) -> bool {
        let store_note_append_allowed = self.view_mode()
            && self
                .from_dept()
                .is_some_and(|d| self.store_team_can_see_dept(d));
        self.base_status() != RequestStatus::Closed
            && !self.can_fully_edit_notes()
            && !self.can_append_dept_notes(lines)
            && store_note_append_allowed
    }

    /// Append-only note access, for actors who may not rewrite the note.
    pub fn can_append_notes(&self, lines: &[Line]) -> bool {
        self.can_append_dept_notes(lines) || self.can_append_store_notes(lines)
    }

    /// Whether a save by this actor may move the derived status. Without it
    /// the stored status is kept.
    pub fn allow_lifecycle_change(&self, lines: &[Line]) -> bool {
        let r = self.roles();
        !self.view_mode()
            || r.admin
            || (r.requester && self.is_my_request())
            || (r.dept_manager && (self.is_my_from_dept() || self.dept_manager_on_owned_lines(lines)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::Role;
    use crate::request::Creator;

    fn stored(status: RequestStatus) -> RequestDoc {
        let creator = Creator {
            uid: "req-1".into(),
            full_name: "Requester".into(),
            department_id: Some("TRP".into()),
        };
        let mut doc = RequestDoc::new("TRP-0312001", creator, 1);
        doc.status = status;
        doc.lines = vec![Line::new("a", "HSE-001", "HSE", "PCS", 1)];
        doc.line_dept_ids = vec!["HSE".into(), "TRP".into()];
        doc
    }

    #[test]
    fn requester_edits_own_request_only() {
        let doc = stored(RequestStatus::Submitted);
        let owner = Actor::new("req-1").with_role(Role::Requester).add_department("TRP");
        let other = Actor::new("req-2").with_role(Role::Requester).add_department("TRP");

        assert!(Permissions::new(&owner, Some(&doc), "STORE").can_edit_header());
        assert!(!Permissions::new(&other, Some(&doc), "STORE").can_edit_header());
        assert!(!Permissions::new(&owner, Some(&doc), "STORE").can_add_lines());
    }

    #[test]
    fn managers_approve_only_their_lines_in_the_window() {
        let doc = stored(RequestStatus::Submitted);
        let hse = Actor::new("m1").with_role(Role::DeptManager).add_department("HSE");
        let it = Actor::new("m2").with_role(Role::DeptManager).add_department("IT");
        let line = &doc.lines[0];

        assert!(Permissions::new(&hse, Some(&doc), "STORE").can_approve_line(line));
        assert!(!Permissions::new(&it, Some(&doc), "STORE").can_approve_line(line));

        let draft = stored(RequestStatus::Draft);
        assert!(!Permissions::new(&hse, Some(&draft), "STORE").can_approve_line(line));
    }

    #[test]
    fn store_team_visibility() {
        let doc = stored(RequestStatus::FullyApproved);
        let store_user = Actor::new("s1").add_department("store");
        let officer_elsewhere = Actor::new("s2").with_role(Role::StoreOfficer).add_department("IT");
        let officer_here = Actor::new("s3").with_role(Role::StoreOfficer).add_department("TRP");

        assert!(Permissions::new(&store_user, Some(&doc), "STORE").store_can_act());
        assert!(!Permissions::new(&officer_elsewhere, Some(&doc), "STORE").store_can_act());
        assert!(Permissions::new(&officer_here, Some(&doc), "STORE").store_can_act());
    }

    #[test]
    fn notes_are_append_only_for_owning_managers() {
        let doc = stored(RequestStatus::Submitted);
        let manager = Actor::new("m1").with_role(Role::DeptManager).add_department("HSE");
        let perms = Permissions::new(&manager, Some(&doc), "STORE");

        assert!(!perms.can_fully_edit_notes());
        assert!(perms.can_append_notes(&doc.lines));
    }

    #[test]
    fn close_requires_ready_and_admin_or_owning_manager() {
        let ready = stored(RequestStatus::Ready);
        let admin = Actor::new("a1").with_role(Role::Admin);
        let manager = Actor::new("m1").with_role(Role::DeptManager).add_department("HSE");
        let requester = Actor::new("req-1").with_role(Role::Requester).add_department("TRP");

        assert!(Permissions::new(&admin, Some(&ready), "STORE").can_close(&ready.lines));
        assert!(Permissions::new(&manager, Some(&ready), "STORE").can_close(&ready.lines));
        assert!(!Permissions::new(&requester, Some(&ready), "STORE").can_close(&ready.lines));

        let preparing = stored(RequestStatus::StorePreparing);
        assert!(!Permissions::new(&admin, Some(&preparing), "STORE").can_close(&preparing.lines));
    }
}
