pub mod ahrs;
pub mod datatypes;
pub mod ekf;
pub mod navigator;
pub mod projection;

pub use ahrs::MadgwickAhrs;
pub use ekf::PdrEkf;
pub use navigator::{NavEvent, NavOutcome, Navigator};
pub use projection::LocalProjection;
