use sha2::{Digest, Sha256};

const MAX_SLUG_LEN: usize = 48;
const MAX_ID_LEN: usize = 128;
const HASH_PREFIX_LEN: usize = 8;

/// Derives the song id from its title and artist.
///
/// The readable part is a slug of both values; the trailing hash keeps ids
/// distinct when two pairs slugify to the same text.
#[must_use]
pub fn song_id(title: &str, artist: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update(b"\n");
    hasher.update(artist.as_bytes());
    let digest = hex::encode(hasher.finalize());

    let mut parts = Vec::with_capacity(3);
    for slug in [slugify(title), slugify(artist)] {
        if !slug.is_empty() {
            parts.push(slug);
        }
    }
    parts.push(digest[..HASH_PREFIX_LEN].to_string());
    parts.join("-")
}

/// Ids double as file names, so only lowercase ascii, digits and dashes pass.
#[must_use]
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_ID_LEN
        && !id.starts_with('-')
        && id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_dash = false;
    for c in value.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
        if slug.len() >= MAX_SLUG_LEN {
            break;
        }
    }
    slug.truncate(MAX_SLUG_LEN);
    slug.trim_end_matches('-').to_string()
}
