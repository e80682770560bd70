pub mod chat;
pub mod favorite;
pub mod notification;
pub mod occupancy;
pub mod shelter;
pub mod user;
