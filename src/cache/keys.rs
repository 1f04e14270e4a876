//! Cache key derivation.
//!
//! Keys are plain strings so any [`CacheStore`](super::CacheStore) backend can
//! hold them. Listing keys are built from the raw request strings, not from the
//! resolved query, so two requests share an entry exactly when their `title`
//! and `filter` parameters are byte-equal.

/// Key of a listing result: `books:{filter}:{title}`.
///
/// An absent title is passed as `""`, giving keys such as `books::` or
/// `books:popular_last_month:`.
pub fn listing_key(title: &str, filter: &str) -> String {
    format!("books:{filter}:{title}")
}

/// Key of a book detail result: `book:{id}`.
pub fn detail_key(book_id: i64) -> String {
    format!("book:{book_id}")
}

/// Key evicted when a book row changes: `books:{id}`.
///
/// No [`listing_key`] output has this shape (listing keys always carry two
/// separators), so book writes leave cached listings in place until their TTL
/// runs out.
// TODO: derive listing invalidation from book writes once listing keys are versioned.
pub fn book_write_key(book_id: i64) -> String {
    format!("books:{book_id}")
}
