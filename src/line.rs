//! Request lines and their approval state.
//!
//! A line is never physically removed from a submitted request: removal is a
//! state carrying the remover's stamp, so the history survives in the
//! document itself.
use crate::actor::ActorStamp;
use std::fmt;

/// Owner decision on a line, as stored.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cbor(index_only)]
pub enum LineStatus {
    #[n(0)]
    PendingOwner,
    #[n(1)]
    OwnerApproved,
    #[n(2)]
    OwnerRejected,
}

/// The single status tag the rest of the core works with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NormalizedStatus {
    PendingOwner,
    OwnerApproved,
    OwnerRejected,
    Deleted,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    #[n(0)]
    Pending,
    #[n(1)]
    Approved {
        #[n(0)]
        by: ActorStamp,
    },
    #[n(2)]
    Rejected {
        #[n(0)]
        by: ActorStamp,
    },
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub enum LineState {
    #[n(0)]
    Active {
        #[n(0)]
        decision: Decision,
    },
    #[n(1)]
    Removed {
        #[n(0)]
        by: Option<ActorStamp>,
    },
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Line {
    #[n(0)]
    pub key: String,
    #[n(1)]
    pub item_id: String,
    #[n(2)]
    pub item_name: String, // display only, the catalog is the source of truth
    #[n(3)]
    pub owner_dept_id: String,
    #[n(4)]
    pub unit: String,
    #[n(5)]
    pub qty: u32,
    #[n(6)]
    pub state: LineState,
}

impl LineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineStatus::PendingOwner => "PENDING_OWNER",
            LineStatus::OwnerApproved => "OWNER_APPROVED",
            LineStatus::OwnerRejected => "OWNER_REJECTED",
        }
    }

    /// Total parse of a raw status field: absent or unrecognised values are
    /// pending.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_uppercase()).as_deref() {
            Some("OWNER_APPROVED") => LineStatus::OwnerApproved,
            Some("OWNER_REJECTED") => LineStatus::OwnerRejected,
            _ => LineStatus::PendingOwner,
        }
    }
}

impl From<LineStatus> for NormalizedStatus {
    fn from(value: LineStatus) -> Self {
        match value {
            LineStatus::PendingOwner => NormalizedStatus::PendingOwner,
            LineStatus::OwnerApproved => NormalizedStatus::OwnerApproved,
            LineStatus::OwnerRejected => NormalizedStatus::OwnerRejected,
        }
    }
}

impl NormalizedStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NormalizedStatus::PendingOwner => "PENDING_OWNER",
            NormalizedStatus::OwnerApproved => "OWNER_APPROVED",
            NormalizedStatus::OwnerRejected => "OWNER_REJECTED",
            NormalizedStatus::Deleted => "DELETED",
        }
    }
}

impl fmt::Display for NormalizedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalizes raw `deleted`/`status` fields. `deleted` always wins.
pub fn normalize_fields(deleted: bool, status: Option<&str>) -> NormalizedStatus {
    if deleted {
        return NormalizedStatus::Deleted;
    }
    LineStatus::parse(status).into()
}

impl Line {
    pub fn new(key: &str, item_id: &str, owner_dept_id: &str, unit: &str, qty: u32) -> Self {
        Self {
            key: key.to_string(),
            item_id: item_id.to_string(),
            item_name: item_id.to_string(),
            owner_dept_id: owner_dept_id.trim().to_string(),
            unit: unit.to_string(),
            qty,
            state: LineState::Active {
                decision: Decision::Pending,
            },
        }
    }
    pub fn set_item_name(mut self, name: &str) -> Self {
        self.item_name = name.to_string();
        self
    }
    pub fn approved(mut self, by: ActorStamp) -> Self {
        self.approve(by);
        self
    }
    pub fn rejected(mut self, by: ActorStamp) -> Self {
        self.reject(by);
        self
    }
    pub fn removed(mut self, by: Option<ActorStamp>) -> Self {
        self.remove(by);
        self
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self.state, LineState::Removed { .. })
    }

    /// Stored owner status. Removed lines persist as pending.
    pub fn status(&self) -> LineStatus {
        match &self.state {
            LineState::Active {
                decision: Decision::Approved { .. },
            } => LineStatus::OwnerApproved,
            LineState::Active {
                decision: Decision::Rejected { .. },
            } => LineStatus::OwnerRejected,
            _ => LineStatus::PendingOwner,
        }
    }

    pub fn normalized_status(&self) -> NormalizedStatus {
        normalize_fields(self.is_deleted(), Some(self.status().as_str()))
    }

    pub fn owner_approved_by(&self) -> Option<&ActorStamp> {
        match &self.state {
            LineState::Active {
                decision: Decision::Approved { by },
            } => Some(by),
            _ => None,
        }
    }

    pub fn owner_rejected_by(&self) -> Option<&ActorStamp> {
        match &self.state {
            LineState::Active {
                decision: Decision::Rejected { by },
            } => Some(by),
            _ => None,
        }
    }

    pub fn removed_by(&self) -> Option<&ActorStamp> {
        match &self.state {
            LineState::Removed { by } => by.as_ref(),
            _ => None,
        }
    }

    pub fn approve(&mut self, by: ActorStamp) {
        self.state = LineState::Active {
            decision: Decision::Approved { by },
        };
    }

    pub fn reject(&mut self, by: ActorStamp) {
        self.state = LineState::Active {
            decision: Decision::Rejected { by },
        };
    }

    pub fn remove(&mut self, by: Option<ActorStamp>) {
        self.state = LineState::Removed { by };
    }

    pub fn restore(&mut self) {
        self.state = LineState::Active {
            decision: Decision::Pending,
        };
    }

    /// Drops any owner decision. Removed lines stay removed.
    pub fn reset_approval(&mut self) {
        if !self.is_deleted() {
            self.restore();
        }
    }

    /// Active and not rejected: the lines the store has to fulfil.
    pub fn counts_toward_fulfilment(&self) -> bool {
        !self.is_deleted() && self.status() != LineStatus::OwnerRejected
    }

    /// `name (code) - DEPT`
    pub fn label(&self) -> String {
        let name = if self.item_name.is_empty() {
            if self.item_id.is_empty() { "Item" } else { self.item_id.as_str() }
        } else {
            self.item_name.as_str()
        };
        let code = if self.item_id.is_empty() {
            String::new()
        } else {
            format!(" ({})", self.item_id)
        };
        if self.owner_dept_id.is_empty() {
            format!("{name}{code}")
        } else {
            format!("{name}{code} - {}", self.owner_dept_id)
        }
    }

    pub fn qty_label(&self) -> String {
        if self.unit.is_empty() {
            self.qty.to_string()
        } else {
            format!("{} {}", self.qty, self.unit)
        }
    }
}

/// Key used to match a line across two versions of a request.
pub fn stable_key(line: &Line, idx: usize) -> String {
    if !line.key.is_empty() {
        return line.key.clone();
    }
    let item: &str = if line.item_id.is_empty() { "item" } else { &line.item_id };
    let owner: &str = if line.owner_dept_id.is_empty() {
        "dept"
    } else {
        &line.owner_dept_id
    };
    format!("{item}-{owner}-{idx}")
}
