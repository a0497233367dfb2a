//! Notification handlers.

mod notification_fanout;

pub use notification_fanout::{FanoutReport, NotificationFanout};
