//! The recognition job queue: observable rows, notifications and the worker.

pub mod observer;
pub mod processor;
pub mod rows;

pub use observer::{ChannelObserver, RecognitionObserver, RowEvent, RowSnapshot};
pub use processor::{AttachmentResolver, NO_MATCH_MESSAGE, Recognizer, RecognizerSettings};
pub use rows::{JobQueue, JobRow, RowStatus};
