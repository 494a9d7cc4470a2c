pub mod db;
pub mod export;
pub mod grocery;
pub mod history;
pub mod models;
pub mod planner;
pub mod service;
pub mod shops;
pub mod store;
pub mod sync;
pub mod weather;
