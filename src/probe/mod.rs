//! Per-connection probing.
//!
//! A probe owns one connection for its whole life:
//! - `connector`: how connections are opened
//! - `drain`: reading responses until the batch is answered or the budget runs out
//! - `handler`: connect, write, drain, close, each step time-bounded

pub mod connector;
pub mod drain;
pub mod handler;

pub use connector::{Connector, TcpConnector};
pub use handler::send_request;
