//! Route handlers organized by domain.

mod convert;
mod download;
mod fetch;
mod progress;
mod system;

pub use convert::*;
pub use download::*;
pub use fetch::*;
pub use progress::*;
pub use system::*;
