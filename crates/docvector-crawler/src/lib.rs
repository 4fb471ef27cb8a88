//! Fetches documents from web sources: URL normalisation, robots policy,
//! and a sitemap-first/BFS-fallback crawler.

pub mod crawler;
pub mod normalize;
pub mod robots;

pub use crawler::{CrawlConfig, Crawler, FetchedDocument};
pub use normalize::normalize_url;
pub use robots::{RobotsCache, RobotsPolicy};
