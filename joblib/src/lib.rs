mod channel;
pub mod errors;
mod events;
mod handle;
mod lines;
mod registry;
mod supervisor;
pub mod types;

pub use events::{JobStatus, PollResult};
pub use supervisor::{Supervisor, SupervisorConfig};
