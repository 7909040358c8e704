//! Type definitions for buylog storage.

mod groups;
mod ids;
mod invites;
mod users;

// Re-export all types from submodules
pub use groups::*;
pub use ids::*;
pub use invites::*;
pub use users::*;
