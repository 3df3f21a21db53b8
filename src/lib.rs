//! Tagged TTL cache for derived queries behind an events, blog and job board.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
