//! Request status and its derivation from line states.
//!
//! Outside of DRAFT, explicit cancellation and the store-driven phases
//! (STORE_PREPARING, READY, CLOSED), a request's status is never set by hand:
//! it is whatever [`derive_lifecycle_status`] says about its lines.
use crate::line::{Line, NormalizedStatus};
use std::fmt;
use std::str::FromStr;

#[derive(
    minicbor::Encode,
    minicbor::Decode,
    serde::Serialize,
    serde::Deserialize,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
)]
#[cbor(index_only)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    #[n(0)]
    Draft,
    #[n(1)]
    Submitted,
    #[n(2)]
    PartiallyApproved,
    #[n(3)]
    FullyApproved,
    #[n(4)]
    StorePreparing,
    #[n(5)]
    Ready,
    #[n(6)]
    Closed,
    #[n(7)]
    Rejected,
    #[n(8)]
    Canceled,
}

pub const ALL_STATUSES: [RequestStatus; 9] = [
    RequestStatus::Draft,
    RequestStatus::Submitted,
    RequestStatus::PartiallyApproved,
    RequestStatus::FullyApproved,
    RequestStatus::StorePreparing,
    RequestStatus::Ready,
    RequestStatus::Closed,
    RequestStatus::Rejected,
    RequestStatus::Canceled,
];

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Draft => "DRAFT",
            RequestStatus::Submitted => "SUBMITTED",
            RequestStatus::PartiallyApproved => "PARTIALLY_APPROVED",
            RequestStatus::FullyApproved => "FULLY_APPROVED",
            RequestStatus::StorePreparing => "STORE_PREPARING",
            RequestStatus::Ready => "READY",
            RequestStatus::Closed => "CLOSED",
            RequestStatus::Rejected => "REJECTED",
            RequestStatus::Canceled => "CANCELED",
        }
    }

    /// Stages in which header and lines may still be edited.
    pub fn is_editable(&self) -> bool {
        matches!(
            self,
            RequestStatus::Draft
                | RequestStatus::Submitted
                | RequestStatus::PartiallyApproved
                | RequestStatus::FullyApproved
        )
    }

    /// Stages in which owners approve or reject lines. Also the stages whose
    /// status is derived from the lines.
    pub fn in_approval_window(&self) -> bool {
        matches!(
            self,
            RequestStatus::Submitted
                | RequestStatus::PartiallyApproved
                | RequestStatus::FullyApproved
        )
    }

    pub fn is_cancelable(&self) -> bool {
        matches!(
            self,
            RequestStatus::Submitted
                | RequestStatus::PartiallyApproved
                | RequestStatus::FullyApproved
                | RequestStatus::StorePreparing
        )
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("unknown request status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for RequestStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_uppercase();
        ALL_STATUSES
            .into_iter()
            .find(|status| status.as_str() == wanted)
            .ok_or(UnknownStatus(s.to_string()))
    }
}

/// Tally of a request's active lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineTally {
    pub active: usize,
    pub approved: usize,
    pub rejected: usize,
}

impl LineTally {
    pub fn pending(&self) -> usize {
        self.active - self.approved - self.rejected
    }

    pub fn from_statuses<I>(statuses: I) -> (usize, Self)
    where
        I: IntoIterator<Item = NormalizedStatus>,
    {
        let mut total = 0;
        let mut tally = LineTally::default();
        for status in statuses {
            total += 1;
            match status {
                NormalizedStatus::Deleted => continue,
                NormalizedStatus::OwnerApproved => tally.approved += 1,
                NormalizedStatus::OwnerRejected => tally.rejected += 1,
                NormalizedStatus::PendingOwner => {}
            }
            tally.active += 1;
        }
        (total, tally)
    }
}

/// Derives the request status from normalized line statuses.
///
/// The checks form a priority chain: no lines or no active lines cancels,
/// all-rejected beats full approval, full approval beats partial approval,
/// and any approval beats plain pending. Order of the lines is irrelevant.
pub fn derive_from_statuses<I>(statuses: I, fallback: RequestStatus) -> RequestStatus
where
    I: IntoIterator<Item = NormalizedStatus>,
{
    let (total, tally) = LineTally::from_statuses(statuses);
    if total == 0 || tally.active == 0 {
        return RequestStatus::Canceled;
    }
    let pending = tally.pending();

    if tally.rejected == tally.active {
        RequestStatus::Rejected
    } else if pending == 0 && tally.approved > 0 {
        RequestStatus::FullyApproved
    } else if tally.approved > 0 {
        RequestStatus::PartiallyApproved
    } else if pending > 0 {
        RequestStatus::Submitted
    } else {
        fallback
    }
}

pub fn derive_lifecycle_status(lines: &[Line], fallback: RequestStatus) -> RequestStatus {
    derive_from_statuses(lines.iter().map(Line::normalized_status), fallback)
}
