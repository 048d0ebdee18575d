pub mod agent;
pub mod config;
pub mod context;
pub mod error;
pub mod model;
pub mod server;
pub mod shutdown;
pub mod workflow;
pub mod workspace;
