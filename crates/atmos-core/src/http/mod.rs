//! HTTP query interface
//!
//! Requests are `GET /?q=<query>`. [`Router`] turns a request target into a
//! [`Response`] without touching the network, and [`HttpServer`] feeds it
//! from a pool of `tiny_http` worker threads.

mod query;
mod router;
mod server;

pub use query::*;
pub use router::*;
pub use server::*;
