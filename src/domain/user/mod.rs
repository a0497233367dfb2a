//! User module - account lifecycle status.

mod account;
mod events;

pub use account::{UserAccount, UserStatus};
pub use events::UserStatusChanged;
