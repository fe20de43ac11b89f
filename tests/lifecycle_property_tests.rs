//! Property-based tests for lifecycle derivation and its guards
//!
//! The status of a request is a pure function of its lines, so the
//! interesting properties are about what the function ignores (line order,
//! stale status strings on deleted lines) and which outcome wins when several
//! could apply. The activity log cap and the revision guard are checked the
//! same way.

use inventory_requests::{
    activity::{ActivityActor, ActivityEntry, ActivityKind, ActivityLog},
    actor::ActorStamp,
    inventory::find_inventory_violation,
    lifecycle::{RequestStatus, derive_from_statuses, derive_lifecycle_status},
    line::{Line, NormalizedStatus, normalize_fields},
    revision::{Revision, ensure_revision_unchanged},
};
use proptest::prelude::*;
use std::collections::HashMap;

// PROPERTY TEST STRATEGIES

fn stamp() -> ActorStamp {
    ActorStamp {
        uid: "mgr-1".into(),
        full_name: "Hadi".into(),
        dept_id: Some("HSE".into()),
        at_ms: 1,
    }
}

/// Strategy to generate normalized line statuses
fn status_strategy() -> impl Strategy<Value = NormalizedStatus> {
    prop_oneof![
        Just(NormalizedStatus::PendingOwner),
        Just(NormalizedStatus::OwnerApproved),
        Just(NormalizedStatus::OwnerRejected),
        Just(NormalizedStatus::Deleted),
    ]
}

/// Strategy to generate raw status strings, including junk and odd casing
fn raw_status_strategy() -> impl Strategy<Value = Option<String>> {
    prop::option::of(prop_oneof![
        Just("OWNER_APPROVED".to_string()),
        Just("owner_rejected".to_string()),
        Just("PENDING_OWNER".to_string()),
        "[A-Z_]{0,12}",
    ])
}

/// Strategy to generate fallback statuses
fn fallback_strategy() -> impl Strategy<Value = RequestStatus> {
    prop_oneof![
        Just(RequestStatus::Submitted),
        Just(RequestStatus::PartiallyApproved),
        Just(RequestStatus::FullyApproved),
        Just(RequestStatus::Draft),
    ]
}

fn line_with(idx: usize, status: NormalizedStatus, qty: u32) -> Line {
    let line = Line::new(&format!("ln-{idx}"), &format!("HSE-{idx:03}"), "HSE", "PCS", qty);
    match status {
        NormalizedStatus::PendingOwner => line,
        NormalizedStatus::OwnerApproved => line.approved(stamp()),
        NormalizedStatus::OwnerRejected => line.rejected(stamp()),
        NormalizedStatus::Deleted => line.removed(None),
    }
}

fn entry(n: u64) -> ActivityEntry {
    ActivityEntry::new(
        ActivityKind::RequestSaved,
        format!("save {n}"),
        String::new(),
        ActivityActor::default(),
        n,
        None,
    )
}

// PROPERTY TESTS
proptest! {
    /// Property: Derivation only depends on the multiset of line statuses
    #[test]
    fn prop_derivation_ignores_line_order(
        statuses in prop::collection::vec(status_strategy(), 0..12),
        fallback in fallback_strategy(),
        seed in any::<u64>(),
    ) {
        let lines: Vec<Line> = statuses
            .iter()
            .enumerate()
            .map(|(idx, status)| line_with(idx, *status, 1))
            .collect();
        let mut shuffled = lines.clone();
        let len = shuffled.len().max(1);
        shuffled.rotate_left((seed as usize) % len);
        shuffled.reverse();

        prop_assert_eq!(
            derive_lifecycle_status(&lines, fallback),
            derive_lifecycle_status(&shuffled, fallback)
        );
    }

    /// Property: A deleted flag overrides whatever status string is stored
    #[test]
    fn prop_deleted_flag_always_wins(raw in raw_status_strategy()) {
        prop_assert_eq!(normalize_fields(true, raw.as_deref()), NormalizedStatus::Deleted);
        prop_assert_ne!(normalize_fields(false, raw.as_deref()), NormalizedStatus::Deleted);
    }

    /// Property: The derived status follows the priority chain
    ///
    /// No active lines cancels; all rejected beats fully approved; nothing
    /// pending with an approval is fully approved; any approval is partial;
    /// otherwise the request is still waiting on owners.
    #[test]
    fn prop_derivation_follows_priority_chain(
        statuses in prop::collection::vec(status_strategy(), 0..12),
        fallback in fallback_strategy(),
    ) {
        let count = |wanted: NormalizedStatus| statuses.iter().filter(|s| **s == wanted).count();
        let approved = count(NormalizedStatus::OwnerApproved);
        let rejected = count(NormalizedStatus::OwnerRejected);
        let pending = count(NormalizedStatus::PendingOwner);
        let active = approved + rejected + pending;

        let expected = if active == 0 {
            RequestStatus::Canceled
        } else if rejected == active {
            RequestStatus::Rejected
        } else if pending == 0 {
            RequestStatus::FullyApproved
        } else if approved > 0 {
            RequestStatus::PartiallyApproved
        } else {
            RequestStatus::Submitted
        };

        prop_assert_eq!(derive_from_statuses(statuses.iter().copied(), fallback), expected);
    }

    /// Property: The log never exceeds its cap and keeps the newest entries first
    #[test]
    fn prop_activity_log_is_capped_newest_first(writes in 1u64..120, limit in 1usize..60) {
        let mut log = ActivityLog::default();
        for n in 1..=writes {
            log = log.prepended(entry(n), limit);
        }

        let kept = (writes as usize).min(limit);
        prop_assert_eq!(log.len(), kept);
        let stamps: Vec<u64> = log.entries().iter().map(|e| e.created_at_ms).collect();
        let expected: Vec<u64> = (1..=writes).rev().take(kept).collect();
        prop_assert_eq!(stamps, expected);
    }

    /// Property: The guard passes exactly when the writer saw the live revision
    /// or no revision exists yet
    #[test]
    fn prop_revision_guard_rejects_moved_documents(
        expected in prop_oneof![Just(0u64), 1u64..1_000_000],
        live in prop_oneof![Just(0u64), 1u64..1_000_000],
    ) {
        let outcome = ensure_revision_unchanged(Revision::new(expected), Revision::new(live));
        let should_pass = live == 0 || expected == live;
        prop_assert_eq!(outcome.is_ok(), should_pass);
        if let Err(err) = outcome {
            prop_assert!(err.is_revision_conflict());
        }
    }

    /// Property: The inventory guard flags a line exactly when an active,
    /// non-rejected line asks for more than is in stock
    #[test]
    fn prop_inventory_guard_matches_stock(
        requests in prop::collection::vec((status_strategy(), 1u32..20), 1..8),
        available in 0u64..20,
    ) {
        let lines: Vec<Line> = requests
            .iter()
            .enumerate()
            .map(|(idx, (status, qty))| line_with(idx, *status, *qty))
            .collect();
        let stock: HashMap<String, u64> = lines
            .iter()
            .map(|line| (line.item_id.clone(), available))
            .collect();

        let expected = requests.iter().any(|(status, qty)| {
            matches!(status, NormalizedStatus::PendingOwner | NormalizedStatus::OwnerApproved)
                && u64::from(*qty) > available
        });
        let found = find_inventory_violation(&lines, &stock, |_| true);
        prop_assert_eq!(found.is_some(), expected);

        // departments hidden from the store are never checked
        prop_assert!(find_inventory_violation(&lines, &stock, |_| false).is_none());
    }
}
