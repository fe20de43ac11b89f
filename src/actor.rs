//! The acting user and the stamps they leave on documents.
//!
//! Role flags and department memberships are supplied by the caller; how
//! they are stored is outside this crate.
use crate::utils::normalize_dept_id;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Roles {
    pub admin: bool,
    pub dept_manager: bool,
    pub store_officer: bool,
    pub requester: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    DeptManager,
    StoreOfficer,
    Requester,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Actor {
    pub uid: String,
    pub full_name: String,
    pub roles: Roles,
    department_ids: Vec<String>,
}

/// Who did something, and when.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Default, PartialEq, Eq)]
pub struct ActorStamp {
    #[n(0)]
    pub uid: String,
    #[n(1)]
    pub full_name: String,
    #[n(2)]
    pub dept_id: Option<String>,
    #[n(3)]
    pub at_ms: u64,
}

impl Actor {
    pub fn new(uid: &str) -> Self {
        Self {
            uid: uid.to_string(),
            ..Self::default()
        }
    }
    pub fn set_full_name(mut self, name: &str) -> Self {
        self.full_name = name.to_string();
        self
    }
    pub fn with_role(mut self, role: Role) -> Self {
        match role {
            Role::Admin => self.roles.admin = true,
            Role::DeptManager => self.roles.dept_manager = true,
            Role::StoreOfficer => self.roles.store_officer = true,
            Role::Requester => self.roles.requester = true,
        }
        self
    }
    pub fn add_department(mut self, dept: &str) -> Self {
        if let Some(dept) = normalize_dept_id(dept) {
            if !self.department_ids.contains(&dept) {
                self.department_ids.push(dept);
            }
        }
        self
    }

    pub fn department_ids(&self) -> &[String] {
        &self.department_ids
    }

    pub fn primary_department(&self) -> Option<&str> {
        self.department_ids.first().map(String::as_str)
    }

    /// Case-insensitive department membership.
    pub fn in_department(&self, dept: &str) -> bool {
        let wanted = dept.trim().to_uppercase();
        !wanted.is_empty()
            && self
                .department_ids
                .iter()
                .any(|d| d.to_uppercase() == wanted)
    }

    /// Name shown in logs and stamps, falling back to the uid.
    pub fn display_name(&self) -> &str {
        if self.full_name.is_empty() {
            if self.uid.is_empty() { "User" } else { &self.uid }
        } else {
            &self.full_name
        }
    }

    pub fn stamp(&self, dept_id: Option<&str>, at_ms: u64) -> ActorStamp {
        ActorStamp {
            uid: self.uid.clone(),
            full_name: self.display_name().to_string(),
            dept_id: dept_id.map(str::to_string),
            at_ms,
        }
    }
}

impl ActorStamp {
    /// `Full Name - DEPT`, as shown in the history panel.
    pub fn label(&self) -> String {
        let base: &str = if self.full_name.is_empty() {
            if self.uid.is_empty() { "Unknown user" } else { &self.uid }
        } else {
            &self.full_name
        };
        match &self.dept_id {
            Some(dept) => format!("{base} - {dept}"),
            None => base.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn department_membership_ignores_case_and_blanks() {
        let actor = Actor::new("u1")
            .add_department(" hse ")
            .add_department("")
            .add_department("hse");

        assert_eq!(actor.department_ids(), ["hse"]);
        assert!(actor.in_department("HSE"));
        assert!(!actor.in_department(""));
    }

    #[test]
    fn stamp_label_includes_department() {
        let actor = Actor::new("u1").set_full_name("Mona");
        assert_eq!(actor.stamp(Some("HSE"), 5).label(), "Mona - HSE");
        assert_eq!(Actor::new("u2").stamp(None, 5).label(), "u2");
    }
}
