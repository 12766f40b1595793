//! Backend Command Dispatcher
//!
//! The single authoritative process: owns the store and the agent
//! supervisor, binds one command endpoint and the status hub, and maps every
//! decoded request to a handler. One request is in flight at a time; callers
//! queue behind it, exactly like the reply-per-request transport promises.

pub mod handler;
pub mod request;
pub mod server;

pub use handler::CommandHandlers;
pub use request::Request;
pub use server::Dispatcher;
