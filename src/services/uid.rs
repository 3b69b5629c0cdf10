//! Short unique identifiers for data sources, correlations and playlists.
//!
//! Identifiers are UUID v4 strings whose first character is forced to a
//! letter, so they never parse as a numeric id.

use rand::Rng;
use uuid::Uuid;

/// How many candidates a bounded uid search tries before giving up.
pub const MAX_UID_ATTEMPTS: usize = 3;

const HEX_LETTERS: &[u8] = b"abcdef";

/// Generate a new short uid.
///
/// # Output
///
/// 36 characters, lowercase hex and dashes, starting with `a`-`f`.
pub fn generate_short_uid() -> String {
    let uid = Uuid::new_v4().to_string();

    if uid.starts_with(|c: char| c.is_ascii_lowercase()) {
        return uid;
    }

    let letter = HEX_LETTERS[rand::rng().random_range(0..HEX_LETTERS.len())] as char;
    format!("{}{}", letter, &uid[1..])
}

/// Try up to [`MAX_UID_ATTEMPTS`] candidates from `generate`, returning the
/// first one `is_taken` reports as free.
///
/// Returns `Ok(None)` when every candidate was taken. Errors from the probe
/// are returned immediately.
pub async fn find_free_uid<G, F, Fut>(
    mut generate: G,
    mut is_taken: F,
) -> Result<Option<String>, sqlx::Error>
where
    G: FnMut() -> String,
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<bool, sqlx::Error>>,
{
    for attempt in 1..=MAX_UID_ATTEMPTS {
        let candidate = generate();

        if !is_taken(candidate.clone()).await? {
            return Ok(Some(candidate));
        }

        tracing::warn!(attempt, uid = %candidate, "generated uid already in use");
    }

    Ok(None)
}
