//! User account handlers.

mod change_user_status;

pub use change_user_status::{ChangeUserStatusCommand, ChangeUserStatusHandler};
