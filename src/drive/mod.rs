// src/drive/mod.rs
pub mod auth;
pub mod client;

pub use client::{DriveClient, DriveStore};
