pub mod factory;
pub mod plan;
pub mod secret;
