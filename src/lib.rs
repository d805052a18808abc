// Trilha Sonora - library root for testing

pub mod cache;
pub mod config;
pub mod emotion;
pub mod environment;
pub mod error;
pub mod http_client;
pub mod middleware;
pub mod models;
pub mod reading;
pub mod reasoning;
pub mod routes;
