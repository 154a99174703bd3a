//! Shared infrastructure used by the upstream call and the server.

pub mod http_client;
