mod handler;
pub(crate) mod model;

pub use handler::{get_shelter, list_nearby};
pub use model::{Shelter, ShelterFeedRecord};
