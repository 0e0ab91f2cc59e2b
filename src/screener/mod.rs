// src/screener/mod.rs
pub mod crawler;
pub mod extract;
pub mod models;
pub mod session;
