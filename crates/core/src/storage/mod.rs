mod fs_store;
mod store;

pub use fs_store::*;
pub use store::*;
