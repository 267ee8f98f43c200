pub mod config;
pub mod logging;

pub mod control;
pub mod discover;
pub mod dispatcher;
pub mod encoder;
pub mod presenter;
pub mod progress;
pub mod report;
pub mod runner;
pub mod task;
