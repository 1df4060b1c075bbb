//! Matching-status enum mapping to the `matching_statuses` lookup table.
//!
//! Variant discriminants match the seed data order (1-based) in the
//! migration.

/// Status ID type matching SMALLINT/SMALLSERIAL in the database.
pub type StatusId = i16;

/// Lifecycle of an owned card's match verdict.
///
/// `Pending` is the only valid creation state; `Matched` and `Failed`
/// are terminal and only left by an explicit re-trigger.
#[repr(i16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchingStatus {
    Pending = 1,
    Matched = 2,
    Failed = 3,
}

impl MatchingStatus {
    /// Return the database status ID.
    pub fn id(self) -> StatusId {
        self as StatusId
    }

    /// Map a raw status ID back to the enum, if it is a known value.
    pub fn from_id(id: StatusId) -> Option<Self> {
        match id {
            1 => Some(Self::Pending),
            2 => Some(Self::Matched),
            3 => Some(Self::Failed),
            _ => None,
        }
    }
}

impl From<MatchingStatus> for StatusId {
    fn from(value: MatchingStatus) -> Self {
        value as StatusId
    }
}
