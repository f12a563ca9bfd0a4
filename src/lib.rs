// src/lib.rs

pub mod app_state;
pub mod blob;
pub mod codec;
pub mod config;
pub mod error;
pub mod logging;
pub mod service;
pub mod store;
