pub mod binding;
pub mod config;
pub mod ops;
pub mod provider;
pub mod simulated;

pub use binding::*;
pub use config::*;
pub use ops::*;
pub use provider::*;
pub use simulated::{SimulatedCounters, SimulatedProvider};
