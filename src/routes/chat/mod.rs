mod handler;
pub(crate) mod model;

pub use handler::{get_chat, list_chats, send_message};
