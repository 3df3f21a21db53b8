//! Cache tags naming the data domains of the board.

use crate::cache::Tag;

pub const EVENTS: Tag = Tag::from_static("events");
pub const BLOG: Tag = Tag::from_static("blog");
pub const JOBS: Tag = Tag::from_static("jobs");
/// Dashboard aggregates. Refreshed by TTL rather than by writes.
pub const STATS: Tag = Tag::from_static("stats");

/// Every tag the application writes under.
pub const ALL: [Tag; 4] = [EVENTS, BLOG, JOBS, STATS];
