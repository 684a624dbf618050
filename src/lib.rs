pub mod admin;
pub mod cli;
pub mod config;
pub mod digest;
pub mod error;
pub mod job;
pub mod logging;
pub mod model;
pub mod notify;
pub mod stats;
pub mod store;
pub mod util;
