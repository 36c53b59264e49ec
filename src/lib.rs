// Library exports so integration tests can drive the real router.

pub mod access;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod extractors;
pub mod routes;
pub mod state;
