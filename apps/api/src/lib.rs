pub mod client;
pub mod config;
pub mod db;
pub mod errors;
pub mod logbook;
pub mod models;
pub mod notes;
pub mod routes;
pub mod state;
