pub mod api;
pub mod config;
pub mod crash;
pub mod error;
pub mod launch;
pub mod repo;
pub mod runner;
pub mod secret;
pub mod session;
