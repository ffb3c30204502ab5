pub mod midi;
pub mod storage;
pub mod types;

pub use midi::*;
pub use storage::*;
pub use types::*;
