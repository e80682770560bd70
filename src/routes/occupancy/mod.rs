mod handler;
pub(crate) mod model;

pub use handler::{enter_shelter, leave_shelter};
