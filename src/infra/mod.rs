//! Service plumbing shared by every route module: error envelope, state, configuration,
//! database pool, boot sequence and request middleware.

pub mod aliases;
pub mod app_error;
pub mod app_state;
pub mod bootstrap;
pub mod config;
pub mod db;
pub mod middleware;
pub mod swagger;
