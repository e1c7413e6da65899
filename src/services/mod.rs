pub mod customers;
pub mod feedback;
pub mod inventory;
pub mod orders;
pub mod pricing;
pub mod schedule;
pub mod stock;
pub mod system_config;

/// Largest page size a list endpoint serves.
pub const MAX_PAGE_SIZE: u64 = 100;

/// Normalizes 1-based paging input.
///
/// `limit` is held to `1..=MAX_PAGE_SIZE` and `page` to the last page whose
/// row offset still fits a signed 64-bit SQL `OFFSET`.
pub fn page_window(page: u64, limit: u64) -> (u64, u64) {
    let limit = limit.clamp(1, MAX_PAGE_SIZE);
    let last_page = i64::MAX as u64 / limit;
    (page.clamp(1, last_page), limit)
}
