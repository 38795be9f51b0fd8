pub mod delay_queue;
pub mod error;

pub use delay_queue::{DelayQueue, FailedItem, QueueCounts, QueueItem, RepeatEntry, SubmitOpts};
pub use error::QueueError;
