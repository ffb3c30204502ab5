pub mod index;
pub mod layout;

pub use index::*;
pub use layout::*;
