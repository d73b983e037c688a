//! Request handlers for the relay transport.

pub mod websocket;
