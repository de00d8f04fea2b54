pub mod common;
pub mod math;
pub mod nav;
pub mod parameters;
pub mod replay;
pub mod sim;
