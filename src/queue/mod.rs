pub mod pipeline;
pub mod stage;

pub use pipeline::{JobQueues, WorkItem};
pub use stage::StageQueue;
