//! HTTP surface - health and room discovery

pub mod routes;

pub use routes::build_router;
