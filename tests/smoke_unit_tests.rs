//! Smoke screen unit tests for the request core components
//!
//! These tests span the codebase, exercising each component in isolation
//! from the store. They mostly cover the happy path and the worked examples
//! the lifecycle rules are usually explained with.
//!

use inventory_requests::{
    activity::{ActivityActor, ActivityKind, LabelIndex, NoLabels, build_save_entry, diff_lines},
    actor::{Actor, ActorStamp, Role},
    lifecycle::{RequestStatus, derive_lifecycle_status},
    line::{Line, NormalizedStatus, normalize_fields},
    request::{Creator, RequestDoc},
    revision::{Revision, RevisionClock, ensure_revision_unchanged},
    units::{ItemUnit, UnitTable, unit_label},
};

fn stamp() -> ActorStamp {
    ActorStamp {
        uid: "mgr-1".into(),
        full_name: "Hadi".into(),
        dept_id: Some("HSE".into()),
        at_ms: 1,
    }
}

// UNITS MODULE TESTS
#[cfg(test)]
mod units_tests {
    use super::*;

    /// Conversions divide into and multiply out of the base unit
    #[test]
    fn converts_through_the_base_unit() {
        let table = UnitTable::new(vec![ItemUnit::new("BOX", "Box", 0.5)]);
        assert_eq!(table.to_base(2.0, "BOX"), 4.0);
        assert_eq!(table.from_base(4.0, "BOX"), 2.0);
    }

    /// Unknown units pass quantities through unchanged
    #[test]
    fn unknown_unit_is_identity() {
        let table = UnitTable::standard();
        assert_eq!(table.to_base(7.0, "CRATE"), 7.0);
        assert_eq!(table.from_base(7.0, "CRATE"), 7.0);
    }

    #[test]
    fn labels_known_codes() {
        assert_eq!(unit_label("kg"), "Kilogram (KG)");
    }
}

// LINE MODULE TESTS
#[cfg(test)]
mod line_tests {
    use super::*;

    /// The deleted flag wins over whatever status is stored
    #[test]
    fn deleted_always_normalizes_to_deleted() {
        for status in [Some("OWNER_APPROVED"), Some("owner_rejected"), Some(""), None] {
            assert_eq!(normalize_fields(true, status), NormalizedStatus::Deleted);
        }
    }

    #[test]
    fn removed_line_reports_deleted() {
        let line = Line::new("a", "HSE-001", "HSE", "PR", 1)
            .approved(stamp())
            .removed(None);
        assert_eq!(line.normalized_status(), NormalizedStatus::Deleted);
        assert_eq!(line.owner_approved_by(), None);
    }

    #[test]
    fn labels_read_like_the_history_panel() {
        let line = Line::new("a", "HSE-001", "HSE", "PR", 3).set_item_name("Gloves");
        assert_eq!(line.label(), "Gloves (HSE-001) - HSE");
        assert_eq!(line.qty_label(), "3 PR");
    }
}

// LIFECYCLE MODULE TESTS
#[cfg(test)]
mod lifecycle_tests {
    use super::*;

    fn line(key: &str) -> Line {
        Line::new(key, &format!("ITEM-{key}"), "HSE", "PCS", 1)
    }

    #[test]
    fn all_rejected_is_rejected() {
        let lines = vec![
            line("a").rejected(stamp()),
            line("b").rejected(stamp()),
            line("c").rejected(stamp()),
        ];
        assert_eq!(
            derive_lifecycle_status(&lines, RequestStatus::Submitted),
            RequestStatus::Rejected
        );
    }

    /// Any approval beats the pending check
    #[test]
    fn mixed_lines_are_partially_approved() {
        let lines = vec![line("a").approved(stamp()), line("b"), line("c").rejected(stamp())];
        assert_eq!(
            derive_lifecycle_status(&lines, RequestStatus::Submitted),
            RequestStatus::PartiallyApproved
        );
    }

    #[test]
    fn all_approved_is_fully_approved() {
        let lines = vec![line("a").approved(stamp()), line("b").approved(stamp())];
        assert_eq!(
            derive_lifecycle_status(&lines, RequestStatus::Submitted),
            RequestStatus::FullyApproved
        );
    }

    #[test]
    fn all_deleted_is_canceled() {
        let lines = vec![line("a").removed(None), line("b").removed(Some(stamp()))];
        assert_eq!(
            derive_lifecycle_status(&lines, RequestStatus::FullyApproved),
            RequestStatus::Canceled
        );
    }

    /// Approved and rejected only, with nothing pending, is fully approved
    #[test]
    fn rejections_do_not_block_full_approval() {
        let lines = vec![line("a").approved(stamp()), line("b").rejected(stamp())];
        assert_eq!(
            derive_lifecycle_status(&lines, RequestStatus::Submitted),
            RequestStatus::FullyApproved
        );
    }

    #[test]
    fn status_names_parse_back() {
        assert_eq!(
            "store_preparing".parse::<RequestStatus>(),
            Ok(RequestStatus::StorePreparing)
        );
        assert!("SHIPPED".parse::<RequestStatus>().is_err());
    }
}

// REVISION MODULE TESTS
#[cfg(test)]
mod revision_tests {
    use super::*;

    #[test]
    fn matching_or_fresh_revisions_pass() {
        assert!(ensure_revision_unchanged(Revision::new(1_000), Revision::new(1_000)).is_ok());
        assert!(ensure_revision_unchanged(Revision::NONE, Revision::NONE).is_ok());
        assert!(ensure_revision_unchanged(Revision::new(1_000), Revision::NONE).is_ok());
    }

    #[test]
    fn moved_revisions_conflict() {
        let err = ensure_revision_unchanged(Revision::new(1_000), Revision::new(2_000)).unwrap_err();
        assert!(err.is_revision_conflict());
        assert!(ensure_revision_unchanged(Revision::NONE, Revision::new(2_000)).is_err());
    }

    #[test]
    fn clock_outruns_future_revisions() {
        let clock = RevisionClock::new();
        let far = Revision::new(u64::MAX / 2);
        let next = clock.next_after(far);
        assert!(next > far);
        assert!(clock.next_after(Revision::NONE) > next);
    }
}

// ACTIVITY MODULE TESTS
#[cfg(test)]
mod activity_tests {
    use super::*;

    fn doc() -> RequestDoc {
        let creator = Creator {
            uid: "req-1".into(),
            full_name: "Rana".into(),
            department_id: Some("TRP".into()),
        };
        let mut doc = RequestDoc::new("TRP-0312001", creator, 1);
        doc.status = RequestStatus::Submitted;
        doc.project_id = "p1".into();
        doc.engineer_id = "e1".into();
        doc.lines = vec![Line::new("a", "HSE-001", "HSE", "PR", 2).set_item_name("Gloves")];
        doc
    }

    fn actor() -> ActivityActor {
        let actor = Actor::new("mgr-1")
            .set_full_name("Hadi")
            .with_role(Role::DeptManager)
            .add_department("HSE");
        ActivityActor::from_actor(&actor, actor.primary_department())
    }

    #[test]
    fn creation_names_project_and_item_count() {
        let mut labels = LabelIndex::default();
        labels.projects.insert("p1".into(), "North Yard".into());
        let entry = build_save_entry(None, &doc(), actor(), &labels, 5);

        assert_eq!(entry.kind, ActivityKind::RequestCreated);
        assert_eq!(
            entry.details,
            "Initial status: SUBMITTED\nProject: North Yard\nEngineer: e1\nItems: 1"
        );
        assert_eq!(entry.resolved_status(), Some(RequestStatus::Submitted));
        assert!(entry.id.starts_with("evt-5-"));
    }

    #[test]
    fn identical_save_is_a_plain_save() {
        let entry = build_save_entry(Some(&doc()), &doc(), actor(), &NoLabels, 5);
        assert_eq!(entry.kind, ActivityKind::RequestSaved);
        assert_eq!(entry.summary, "Hadi (HSE) saved the request");
        assert!(entry.details.is_empty());
    }

    #[test]
    fn line_updates_list_only_what_changed() {
        let prev = doc();
        let mut next = doc();
        next.lines[0].qty = 5;
        next.lines[0].approve(stamp());
        next.status = RequestStatus::FullyApproved;

        let diff = diff_lines(&prev.lines, &next.lines);
        assert_eq!(
            diff.updated,
            ["Gloves (HSE-001) - HSE (qty 2->5, status PENDING_OWNER->OWNER_APPROVED)"]
        );

        let entry = build_save_entry(Some(&prev), &next, actor(), &NoLabels, 5);
        assert_eq!(entry.kind, ActivityKind::RequestUpdated);
        assert!(entry.details.starts_with("Status: SUBMITTED -> FULLY_APPROVED\n"));
    }
}
