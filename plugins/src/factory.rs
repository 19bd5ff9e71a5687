use std::sync::Arc;

use hk3_launcher_core::api::{LaunchPlanner, SecretProtector, SessionController, SessionOptions};

use crate::plan::Hk3LaunchPlanner;
use crate::secret::KeyringProtector;

pub fn build_planner() -> Arc<dyn LaunchPlanner> {
    Arc::new(Hk3LaunchPlanner::new())
}

pub fn build_protector() -> Box<dyn SecretProtector> {
    Box::new(KeyringProtector::default())
}

/// A session controller wired to the hk3 worker.
pub fn build_session(options: SessionOptions) -> SessionController {
    SessionController::new(build_planner(), options)
}
