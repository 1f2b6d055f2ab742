//! Draft → payload sanitization.

use sha2::{Digest, Sha256};
use tracing::debug;

use super::{PayloadError, PostPayload, PreparedPayload, SaveMode};
use crate::config::AutosaveConfig;
use crate::draft::slug::{fallback_slug, slugify};
use crate::draft::{ContentBlock, Draft, FeaturedImage};

/// Featured image sent on create when the draft has none yet.
/// The posts API requires the object to be present on creation.
pub const PLACEHOLDER_IMAGE_URL: &str = "https://placehold.co/1200x630?text=Draft";
pub const PLACEHOLDER_IMAGE_ALT: &str = "Draft placeholder image";

const MAX_TAG_CHARS: usize = 64;
const OBJECT_ID_LEN: usize = 24;

/// Builds bounded, backend-shaped payloads from drafts
#[derive(Debug, Clone)]
pub struct PayloadSanitizer {
    /// Per-field ceiling for embedded media
    max_field_bytes: usize,
    /// Ceiling for the whole serialized body
    max_payload_bytes: usize,
    /// Slug used when the title yields none; fixed for the sanitizer's lifetime
    fallback_slug: String,
}

impl PayloadSanitizer {
    pub fn new(max_field_bytes: usize, max_payload_bytes: usize) -> Self {
        Self {
            max_field_bytes,
            max_payload_bytes,
            fallback_slug: fallback_slug(),
        }
    }

    pub fn from_config(config: &AutosaveConfig) -> Self {
        Self::new(config.max_field_bytes, config.max_payload_bytes)
    }

    pub fn with_fallback_slug(mut self, slug: impl Into<String>) -> Self {
        self.fallback_slug = slug.into();
        self
    }

    /// Build the request body for one save cycle
    pub fn build(&self, draft: &Draft, mode: SaveMode) -> Result<PreparedPayload, PayloadError> {
        if !draft.has_meaningful_content() {
            return Err(PayloadError::NothingToSave);
        }

        let title = draft.title.trim().to_string();
        let slug = self.resolve_slug(draft.slug.as_deref(), &title);

        let mut blocks = draft.blocks.clone();
        let mut stripped_media = self.strip_oversized_media(&mut blocks);

        let mut cover = draft.featured_image.clone();
        if cover.url.len() > self.max_field_bytes {
            debug!("Blanking {} byte featured image", cover.url.len());
            cover.url.clear();
            stripped_media += 1;
        }

        let payload = PostPayload {
            title,
            slug,
            content: draft.content.trim().to_string(),
            excerpt: draft.excerpt.trim().to_string(),
            tags: clean_tags(&draft.tags),
            categories: clean_categories(&draft.categories),
            featured_image: featured_image_for(&cover, mode),
            blocks,
            seo: (!draft.seo.is_empty()).then(|| draft.seo.clone()),
            status: draft.status,
        };

        let bytes = serde_json::to_vec(&payload)?;
        if bytes.len() > self.max_payload_bytes {
            return Err(PayloadError::TooLarge {
                size: bytes.len(),
                limit: self.max_payload_bytes,
            });
        }

        Ok(PreparedPayload {
            payload,
            size_bytes: bytes.len(),
            fingerprint: hex::encode(Sha256::digest(&bytes)),
            stripped_media,
        })
    }

    fn resolve_slug(&self, explicit: Option<&str>, title: &str) -> String {
        let from_explicit = explicit.map(slugify).unwrap_or_default();
        if !from_explicit.is_empty() {
            return from_explicit;
        }

        let from_title = slugify(title);
        if !from_title.is_empty() {
            return from_title;
        }

        self.fallback_slug.clone()
    }

    /// Blank media fields above the per-field ceiling, returning how many were cleared
    fn strip_oversized_media(&self, blocks: &mut [ContentBlock]) -> usize {
        let mut stripped = 0;
        for block in blocks.iter_mut() {
            for field in block.kind.media_fields_mut() {
                if field.len() > self.max_field_bytes {
                    debug!(
                        "Blanking {} byte media field in block {}",
                        field.len(),
                        block.id
                    );
                    field.clear();
                    stripped += 1;
                }
            }
        }
        stripped
    }
}

fn clean_tags(tags: &[String]) -> Vec<String> {
    let mut cleaned: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if tag.is_empty() || tag.chars().count() > MAX_TAG_CHARS {
            continue;
        }
        if !cleaned.iter().any(|t| t == tag) {
            cleaned.push(tag.to_string());
        }
    }
    cleaned
}

fn clean_categories(categories: &[String]) -> Vec<String> {
    let mut cleaned: Vec<String> = Vec::with_capacity(categories.len());
    for category in categories {
        let category = category.trim();
        if !is_object_id(category) {
            debug!("Dropping malformed category reference: {:?}", category);
            continue;
        }
        if !cleaned.iter().any(|c| c == category) {
            cleaned.push(category.to_string());
        }
    }
    cleaned
}

/// 24 hex characters, the backend's identifier shape
fn is_object_id(candidate: &str) -> bool {
    candidate.len() == OBJECT_ID_LEN && candidate.chars().all(|c| c.is_ascii_hexdigit())
}

/// The draft's image when it has a URL, otherwise the placeholder on create
fn featured_image_for(image: &FeaturedImage, mode: SaveMode) -> Option<FeaturedImage> {
    if image.has_url() {
        return Some(FeaturedImage::new(image.url.trim(), image.alt.trim()));
    }
    match mode {
        SaveMode::Create => Some(FeaturedImage::new(
            PLACEHOLDER_IMAGE_URL,
            PLACEHOLDER_IMAGE_ALT,
        )),
        SaveMode::Update => None,
    }
}
