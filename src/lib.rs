// src/lib.rs

//! Feedwatch Library
//!
//! Watches a publisher's article listing, keeps every article it has seen in
//! SQLite, and announces new ones to a group chat webhook.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
