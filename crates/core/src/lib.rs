#![forbid(unsafe_code)]

pub mod duration;
pub mod model;
pub mod policy;
pub mod time;

pub use time::Clock;
