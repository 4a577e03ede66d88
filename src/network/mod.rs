//! Network layer - HTTP request execution and collection runs
//!
//! The Network actor receives commands and sends back responses and run events.

pub mod actor;
pub mod client;

pub use actor::NetworkActor;
pub use client::ReqwestSender;
