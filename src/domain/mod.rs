pub mod access;
pub mod compliance;
pub mod document;
pub mod similarity;

pub use access::{Actor, Role};
pub use compliance::{CompliancePriority, ComplianceStatus};
pub use document::{AccessLevel, DocumentPriority, DocumentStatus};
