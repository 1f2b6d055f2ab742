//! URL slug helpers.

/// Derive a URL-safe slug from free text.
///
/// ASCII letters are lowercased, every run of other characters collapses to a
/// single `-`, and leading/trailing hyphens are dropped. Returns an empty
/// string when nothing alphanumeric remains.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_hyphen = false;

    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }

    slug
}

/// Synthesize a unique slug for drafts without a usable title
pub fn fallback_slug() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let suffix: String = uuid::Uuid::new_v4().simple().to_string().chars().take(8).collect();
    format!("draft-{}-{}", millis, suffix)
}
