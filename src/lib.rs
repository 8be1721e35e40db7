pub mod log;
pub mod probe;

pub use probe::error::Error;
pub use probe::{Probe, ProbeBuilder};
