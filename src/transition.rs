//! Store-driven phase changes after approval.
//!
//! These are the only edges into STORE_PREPARING, READY and CLOSED. Marking a
//! request READY also consumes stock; the stock arithmetic lives here and the
//! store runs it inside the same transaction as the status write.
use crate::activity::{ActivityActor, ActivityKind, transition_entry};
use crate::actor::Actor;
use crate::error::{RequestError, Result};
use crate::lifecycle::RequestStatus;
use crate::permissions::Permissions;
use crate::request::{RequestDoc, aggregate_quantities};
use crate::revision::Revision;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreTransition {
    StartPreparing,
    CancelPreparing,
    MarkReady,
    Close,
}

impl StoreTransition {
    pub const ALL: [StoreTransition; 4] = [
        StoreTransition::StartPreparing,
        StoreTransition::CancelPreparing,
        StoreTransition::MarkReady,
        StoreTransition::Close,
    ];

    pub fn from(&self) -> RequestStatus {
        match self {
            StoreTransition::StartPreparing => RequestStatus::FullyApproved,
            StoreTransition::CancelPreparing | StoreTransition::MarkReady => {
                RequestStatus::StorePreparing
            }
            StoreTransition::Close => RequestStatus::Ready,
        }
    }

    pub fn to(&self) -> RequestStatus {
        match self {
            StoreTransition::StartPreparing => RequestStatus::StorePreparing,
            StoreTransition::CancelPreparing => RequestStatus::FullyApproved,
            StoreTransition::MarkReady => RequestStatus::Ready,
            StoreTransition::Close => RequestStatus::Closed,
        }
    }

    pub fn summary(&self) -> &'static str {
        match self {
            StoreTransition::StartPreparing => "Store started preparing the request",
            StoreTransition::CancelPreparing => "Store canceled preparing",
            StoreTransition::MarkReady => "Store marked the request READY",
            StoreTransition::Close => "Request closed",
        }
    }

    pub fn moves_stock(&self) -> bool {
        matches!(self, StoreTransition::MarkReady)
    }

    /// The transition connecting two statuses, if there is one.
    pub fn between(from: RequestStatus, to: RequestStatus) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.from() == from && t.to() == to)
    }

    /// Transitions `actor` could run on `doc` right now.
    pub fn available(doc: &RequestDoc, actor: &Actor, store_department: &str) -> Vec<Self> {
        let perms = Permissions::new(actor, Some(doc), store_department);
        Self::ALL
            .into_iter()
            .filter(|t| t.authorize(&perms, doc).is_ok())
            .collect()
    }

    /// Checks the stored status and the actor's right to run this transition.
    pub fn authorize(&self, perms: &Permissions<'_>, doc: &RequestDoc) -> Result<()> {
        if doc.status != self.from() {
            return Err(RequestError::InvalidTransition {
                from: doc.status,
                to: self.to(),
            });
        }
        let allowed = match self {
            StoreTransition::Close => perms.can_close(&doc.lines),
            _ => perms.store_can_act(),
        };
        if !allowed {
            return Err(RequestError::denied(format!(
                "{} cannot move {} from {} to {}",
                perms.actor().display_name(),
                doc.rq_code,
                self.from(),
                self.to()
            )));
        }
        Ok(())
    }

    /// The document as it is written back: new status, revision and one
    /// `status_transition` entry on top of the log.
    pub fn apply(
        &self,
        doc: &RequestDoc,
        actor: &Actor,
        revision: Revision,
        now_ms: u64,
        log_limit: usize,
    ) -> RequestDoc {
        let mut next = doc.clone();
        next.status = self.to();
        next.updated_at = revision;
        let entry = transition_entry(
            ActivityKind::StatusTransition,
            self.summary(),
            doc.status,
            self.to(),
            ActivityActor::from_actor(actor, actor.primary_department()),
            now_ms,
        );
        next.activity_log = doc.activity_log.prepended(entry, log_limit);
        next
    }
}

/// Stock left per item once `doc` is fulfilled.
///
/// `stock` holds the current quantity of every item read in the same
/// transaction, `None` for items without stock information. The first item
/// that is missing or short fails the whole plan, so callers never write a
/// partial set of decrements.
pub fn plan_fulfilment(
    doc: &RequestDoc,
    stock: &BTreeMap<String, Option<u64>>,
) -> Result<BTreeMap<String, u64>> {
    let mut remaining = BTreeMap::new();
    for (item_id, needed) in aggregate_quantities(&doc.lines) {
        let available = stock
            .get(&item_id)
            .copied()
            .flatten()
            .ok_or_else(|| RequestError::MissingStock(item_id.clone()))?;
        if available < needed {
            return Err(RequestError::StockShortage {
                item_id,
                needed,
                available,
            });
        }
        remaining.insert(item_id, available - needed);
    }
    Ok(remaining)
}
