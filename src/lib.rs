//! Resumable tracked-address transaction notifier over a filtered block
//! stream.

pub mod address;
pub mod amount;
pub mod auth;
pub mod block;
pub mod config;
pub mod cursor;
pub mod notify;
pub mod stream;
pub mod tracker;
