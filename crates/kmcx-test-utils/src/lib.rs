mod engine;
mod harness;

pub use engine::{EngineCall, RecordingEngine};
pub use harness::{job, job_batch, TestContext};
