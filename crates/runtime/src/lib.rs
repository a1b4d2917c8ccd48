pub mod config;
pub mod global;
pub mod loader;
pub mod probe;
pub mod wait;

pub use config::*;
pub use loader::*;
pub use probe::*;
pub use wait::*;
