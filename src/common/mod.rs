pub mod timestamped;

pub use timestamped::*;
