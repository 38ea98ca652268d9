//! Data models for the server binary

pub mod config;
