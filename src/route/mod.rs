pub mod auth;
pub mod booking;
pub mod levels;
pub mod lots;
pub mod slots;
pub mod stats;
