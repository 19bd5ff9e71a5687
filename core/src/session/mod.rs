mod controller;
mod transcript;

pub use controller::{
    CommandAvailability, RunOutcome, SessionController, SessionOptions, SessionUpdate,
};
pub use transcript::Transcript;
