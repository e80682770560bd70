mod handler;
pub(crate) mod model;

pub use handler::{add_favorite, list_favorites, remove_favorite};
