//! Multi-room chat server.
//!
//! Clients speak a line-oriented text protocol over TCP (optionally
//! TLS): authenticate or register, receive a reconnect token, join a
//! room, chat. Rooms whose name starts with `AI ` pipe every user
//! message through an external text-generation engine and broadcast
//! the reply as a `Bot:` line.

pub mod ai;
pub mod config;
pub mod connection;
pub mod credentials;
pub mod room;
pub mod server;
pub mod session;
pub mod text;
