mod hk3;

pub use hk3::Hk3LaunchPlanner;
