//! Book catalogue with reviews, windowed popularity listings and a
//! read-through cache invalidated by committed writes.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod util;
