pub mod config;
pub mod controls;
pub mod domain;
pub mod error;
pub mod logging;
pub mod observability;
pub mod pipeline;
pub mod sources;
pub mod store;
