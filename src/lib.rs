pub mod config;
pub mod db;
pub mod models;
pub mod route;
pub mod routemount;
pub mod sweeper;
pub mod utils;
