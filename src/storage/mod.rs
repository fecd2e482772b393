pub mod compress;
pub mod forms;
pub mod handlers;
pub mod inflight;
pub mod models;
pub mod routes;
pub mod service;
