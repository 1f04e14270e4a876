//! Application services: query composition, cached reads and notified writes.

pub mod books;
pub mod error;
pub mod listing;
pub mod query;
pub mod repos;
pub mod writes;
