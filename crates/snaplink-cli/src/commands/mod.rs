//! Command handlers

pub mod auth;
pub mod config;
pub mod link;
pub mod profile;
pub mod share;
