pub mod billing;
pub mod errorhandler;
pub mod jwt;
