//! Supervisor module for the transcoder lifecycle and its notifications.

mod error;
mod events;
mod policy;
mod runner;
mod state;

pub use error::*;
pub use events::*;
pub use policy::*;
pub use runner::*;
pub use state::*;
