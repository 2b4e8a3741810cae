pub mod clock;
pub mod collector;
pub mod config;
pub mod error;
pub mod model;
pub mod source;
pub mod store;
