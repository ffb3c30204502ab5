pub mod classifier;
pub mod history;
pub mod note_name;
pub mod stats;

pub use classifier::*;
pub use history::*;
pub use note_name::*;
pub use stats::*;
