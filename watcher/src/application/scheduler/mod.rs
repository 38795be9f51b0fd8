//! Job control plane: submission, queue enrolment, dispatch and
//! startup recovery.

pub mod recovery;
pub mod submission;
pub mod worker;

pub use submission::JobScheduler;
pub use worker::JobWorker;
