pub mod config;
pub mod constants;
pub mod engine;
pub mod errors;
pub mod job;
pub mod job_list;
pub mod logging;
pub mod observer;
pub mod project;
pub mod stages;
pub mod task;
