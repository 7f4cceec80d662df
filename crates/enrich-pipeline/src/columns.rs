//! Names of the columns the pipeline writes.

/// Per-row enrichment status (`Success`, `No contacts found`, `Error: ...`).
pub const STATUS: &str = "Enrichment Status";

/// Work emails, `; `-separated.
pub const WORK_EMAIL: &str = "Enriched Work Email";

/// Personal emails, `; `-separated.
pub const PERSONAL_EMAIL: &str = "Enriched Personal Email";

/// Phone numbers, `; `-separated.
pub const PHONE: &str = "Enriched Phone";

/// The single best email per row.
pub const CONSOLIDATED_EMAIL: &str = "Consolidated Email";

/// Platforms with dedicated social profile columns.
pub const SOCIAL_PLATFORMS: [&str; 3] = ["Facebook", "Twitter", "Instagram"];

/// Status of rows without an identifier.
pub const NO_IDENTIFIER: &str = "No identifier";

/// Separator between multiple values in one cell.
pub const VALUE_SEPARATOR: &str = "; ";

/// Profile link column for a social platform.
#[must_use]
pub fn social_profile(platform: &str) -> String {
    format!("{platform} Profile")
}

/// Match rating column for a social platform.
#[must_use]
pub fn social_rating(platform: &str) -> String {
    format!("{platform} Match Rating")
}
