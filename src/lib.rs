//! Kedai - reservation and session backend for a café website
//!
//! The server side owns users, reservations, and contact messages; the
//! `session` module is the client-held core (session manager, expiry
//! watcher, advisory admission gate) that cooperates with it.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
pub mod session;
