pub mod app;
pub mod device_sync;
pub mod highlight;
pub mod ipc;
pub mod layout;
pub mod output;
pub mod scheduler;

pub use app::*;
pub use device_sync::*;
pub use highlight::*;
pub use ipc::*;
pub use layout::*;
pub use output::*;
pub use scheduler::*;
