pub mod auditor;
pub mod config;
pub mod context;
pub mod errors;
pub mod gate;
pub mod runtime;
pub mod tracker;
