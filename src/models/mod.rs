pub mod booking;
pub mod level;
pub mod lot;
pub mod slot;
pub mod user;
