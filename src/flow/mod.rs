//! User-facing flows built on the gateways.

pub mod submission;
pub mod verification;

pub use submission::{
    HistoryEntry, Progress, Step, SubmissionFlow, SubmissionState, ALREADY_STORED_NOTICE,
};
pub use verification::{VerificationErrorKind, VerificationFlow, VerificationStatus};
