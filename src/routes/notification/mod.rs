mod handler;
pub(crate) mod model;

pub use handler::{delete_notification, list_notifications, mark_all_read, mark_read, unread_count};
