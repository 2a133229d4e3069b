mod bus;
mod log;
mod types;

pub use bus::*;
pub use log::*;
pub use types::*;
