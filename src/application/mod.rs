//! Application services: cached read paths and invalidating write paths.

pub mod admin;
pub mod error;
pub mod listings;
pub mod repos;
