mod handler;
pub(crate) mod model;

pub use handler::{get_profile, login, register, update_profile};
