pub mod aggregate;
pub mod artifacts;
pub mod classify;
pub mod collector;
pub mod config;
pub mod dashboard;
pub mod dedup;
pub mod error;
pub mod fetch;
pub mod history;
pub mod keywords;
pub mod paper;
pub mod publish;
pub mod serve;
pub mod utils;
