use std::fmt;

/// Review workflow states. Upload lands in `PendingReview`; `Approved` and
/// `Rejected` are terminal until a new version forces the document back to
/// `PendingReview`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentStatus {
    Draft,
    PendingReview,
    UnderReview,
    Approved,
    Rejected,
}

impl DocumentStatus {
    pub const ALL: [DocumentStatus; 5] = [
        DocumentStatus::Draft,
        DocumentStatus::PendingReview,
        DocumentStatus::UnderReview,
        DocumentStatus::Approved,
        DocumentStatus::Rejected,
    ];

    pub fn initial() -> Self {
        DocumentStatus::PendingReview
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DocumentStatus::Draft => "Draft",
            DocumentStatus::PendingReview => "Pending Review",
            DocumentStatus::UnderReview => "Under Review",
            DocumentStatus::Approved => "Approved",
            DocumentStatus::Rejected => "Rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == value)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, DocumentStatus::Approved | DocumentStatus::Rejected)
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentPriority {
    Low,
    Medium,
    High,
}

impl DocumentPriority {
    pub const ALL: [DocumentPriority; 3] = [
        DocumentPriority::Low,
        DocumentPriority::Medium,
        DocumentPriority::High,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DocumentPriority::Low => "Low",
            DocumentPriority::Medium => "Medium",
            DocumentPriority::High => "High",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|priority| priority.as_str() == value)
    }
}

/// Who may list/view a document. `SelfOnly` limits visibility to the uploader
/// plus explicit per-user grants; `Department` opens it to the owning
/// department; `CrossDepartment` shares it with the admins of the listed
/// departments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessLevel {
    SelfOnly,
    Department,
    CrossDepartment,
}

impl AccessLevel {
    pub const ALL: [AccessLevel; 3] = [
        AccessLevel::SelfOnly,
        AccessLevel::Department,
        AccessLevel::CrossDepartment,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AccessLevel::SelfOnly => "self",
            AccessLevel::Department => "department",
            AccessLevel::CrossDepartment => "cross-department",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|level| level.as_str() == value)
    }
}

/// Version numbers are dense and monotonically increasing; the document row
/// caches the highest one.
pub fn next_version(current_version: i32) -> i32 {
    current_version + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_wire_strings() {
        for status in DocumentStatus::ALL {
            assert_eq!(DocumentStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(DocumentStatus::parse("approved"), None);
    }

    #[test]
    fn initial_status_is_pending_review() {
        assert_eq!(DocumentStatus::initial(), DocumentStatus::PendingReview);
    }

    #[test]
    fn only_review_outcomes_are_terminal() {
        assert!(DocumentStatus::Approved.is_terminal());
        assert!(DocumentStatus::Rejected.is_terminal());
        assert!(!DocumentStatus::PendingReview.is_terminal());
        assert!(!DocumentStatus::UnderReview.is_terminal());
        assert!(!DocumentStatus::Draft.is_terminal());
    }

    #[test]
    fn access_levels_parse_their_wire_form() {
        assert_eq!(AccessLevel::parse("self"), Some(AccessLevel::SelfOnly));
        assert_eq!(
            AccessLevel::parse("cross-department"),
            Some(AccessLevel::CrossDepartment)
        );
        assert_eq!(AccessLevel::parse("public"), None);
    }

    #[test]
    fn versions_increase_monotonically() {
        assert_eq!(next_version(1), 2);
        assert_eq!(next_version(41), 42);
    }
}
