//! Draft model for posts under edit.
//!
//! This module provides the typed representation of the document the editor
//! hands to the autosave engine on every change. Every field carries an
//! explicit default so that partially hydrated drafts (e.g. a JSON blob with
//! only a title) always deserialize into a complete value.

pub mod slug;

use serde::{Deserialize, Serialize};

/// The kind of remote resource a draft is persisted as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    /// Rich multi-block post
    Post,
    /// Flat post without layout blocks
    SimplePost,
}

impl ResourceKind {
    /// Collection path segment on the posts API
    pub fn path(&self) -> &'static str {
        match self {
            ResourceKind::Post => "posts",
            ResourceKind::SimplePost => "simple-posts",
        }
    }

    /// Checkpoint key used for a brand-new draft of this kind
    pub fn default_checkpoint_key(&self) -> &'static str {
        match self {
            ResourceKind::Post => "new-post-draft",
            ResourceKind::SimplePost => "new-simple-post-draft",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::Post => write!(f, "post"),
            ResourceKind::SimplePost => write!(f, "simple-post"),
        }
    }
}

impl std::str::FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "post" | "posts" => Ok(ResourceKind::Post),
            "simple-post" | "simple-posts" | "simple" => Ok(ResourceKind::SimplePost),
            other => Err(format!("unknown resource kind: {}", other)),
        }
    }
}

/// Lifecycle status of a post
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DraftStatus {
    #[default]
    Draft,
    InReview,
    Published,
    Archived,
}

/// Featured image reference (remote URL or embedded data URL)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeaturedImage {
    pub url: String,
    pub alt: String,
}

impl FeaturedImage {
    pub fn new(url: impl Into<String>, alt: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            alt: alt.into(),
        }
    }

    /// True when the image points somewhere; alt text alone is not an image
    pub fn has_url(&self) -> bool {
        !self.url.trim().is_empty()
    }
}

/// Search-engine metadata attached to a post
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SeoMeta {
    pub meta_title: String,
    pub meta_description: String,
    pub keywords: Vec<String>,
}

impl SeoMeta {
    pub fn is_empty(&self) -> bool {
        self.meta_title.trim().is_empty()
            && self.meta_description.trim().is_empty()
            && self.keywords.iter().all(|k| k.trim().is_empty())
    }
}

/// A single image inside a gallery block
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GalleryImage {
    pub src: String,
    pub alt: String,
    pub caption: String,
}

/// Layout block variants
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BlockKind {
    Hero {
        #[serde(default)]
        heading: String,
        #[serde(default)]
        subheading: String,
        /// Background image, possibly an embedded data URL
        #[serde(default)]
        image: String,
    },
    Text {
        #[serde(default)]
        content: String,
    },
    Image {
        #[serde(default)]
        src: String,
        #[serde(default)]
        alt: String,
        #[serde(default)]
        caption: String,
    },
    Gallery {
        #[serde(default)]
        images: Vec<GalleryImage>,
    },
    Quote {
        #[serde(default)]
        text: String,
        #[serde(default)]
        attribution: String,
    },
    Code {
        #[serde(default)]
        language: String,
        #[serde(default)]
        code: String,
    },
}

impl BlockKind {
    /// Mutable handles to every field that may carry embedded media
    pub fn media_fields_mut(&mut self) -> Vec<&mut String> {
        match self {
            BlockKind::Hero { image, .. } => vec![image],
            BlockKind::Image { src, .. } => vec![src],
            BlockKind::Gallery { images } => images.iter_mut().map(|img| &mut img.src).collect(),
            BlockKind::Text { .. } | BlockKind::Quote { .. } | BlockKind::Code { .. } => Vec::new(),
        }
    }
}

/// An ordered content block of a post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentBlock {
    #[serde(default)]
    pub id: String,
    #[serde(flatten)]
    pub kind: BlockKind,
}

impl ContentBlock {
    pub fn new(id: impl Into<String>, kind: BlockKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }
}

/// The document under edit, as observed by the editor on one change
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Draft {
    pub title: String,
    /// Explicit slug; derived from the title when absent
    pub slug: Option<String>,
    /// Body text (markdown or HTML, opaque here)
    pub content: String,
    pub excerpt: String,
    pub tags: Vec<String>,
    /// Category object ids
    pub categories: Vec<String>,
    pub featured_image: FeaturedImage,
    pub blocks: Vec<ContentBlock>,
    pub seo: SeoMeta,
    pub status: DraftStatus,
}

impl Draft {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = categories.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_featured_image(mut self, image: FeaturedImage) -> Self {
        self.featured_image = image;
        self
    }

    pub fn with_block(mut self, block: ContentBlock) -> Self {
        self.blocks.push(block);
        self
    }

    /// Whether the draft is worth persisting.
    ///
    /// A title is required, plus either body text or at least one block.
    pub fn has_meaningful_content(&self) -> bool {
        let has_title = !self.title.trim().is_empty();
        let has_body = !self.content.trim().is_empty() || !self.blocks.is_empty();
        has_title && has_body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let draft: Draft = serde_json::from_str(r#"{"title": "Hello"}"#).unwrap();

        assert_eq!(draft.title, "Hello");
        assert!(draft.slug.is_none());
        assert!(draft.blocks.is_empty());
        assert!(!draft.featured_image.has_url());
        assert_eq!(draft.status, DraftStatus::Draft);
    }

    #[test]
    fn test_block_json_shape() {
        let json = r#"{
            "title": "Gallery post",
            "blocks": [
                {"id": "b1", "type": "hero", "heading": "Welcome"},
                {"id": "b2", "type": "gallery", "images": [{"src": "a.png"}]}
            ],
            "status": "in-review"
        }"#;
        let draft: Draft = serde_json::from_str(json).unwrap();

        assert_eq!(draft.blocks.len(), 2);
        assert_eq!(draft.status, DraftStatus::InReview);
        match &draft.blocks[0].kind {
            BlockKind::Hero { heading, image, .. } => {
                assert_eq!(heading, "Welcome");
                assert!(image.is_empty());
            }
            other => panic!("Expected hero block, got {:?}", other),
        }
    }

    #[test]
    fn test_meaningful_content_requires_title_and_body() {
        assert!(!Draft::default().has_meaningful_content());
        assert!(!Draft::new("Hello", "").has_meaningful_content());
        assert!(!Draft::new("", "Some body").has_meaningful_content());
        assert!(!Draft::new("   ", "Some body").has_meaningful_content());
        assert!(Draft::new("Hello", "Some body").has_meaningful_content());

        let with_block = Draft::new("Hello", "").with_block(ContentBlock::new(
            "b1",
            BlockKind::Text {
                content: String::new(),
            },
        ));
        assert!(with_block.has_meaningful_content());
    }

    #[test]
    fn test_media_fields() {
        let mut gallery = BlockKind::Gallery {
            images: vec![GalleryImage::default(), GalleryImage::default()],
        };
        assert_eq!(gallery.media_fields_mut().len(), 2);

        let mut quote = BlockKind::Quote {
            text: "x".into(),
            attribution: String::new(),
        };
        assert!(quote.media_fields_mut().is_empty());
    }

    #[test]
    fn test_resource_kind_parse() {
        assert_eq!("post".parse::<ResourceKind>().unwrap(), ResourceKind::Post);
        assert_eq!(
            "Simple-Post".parse::<ResourceKind>().unwrap(),
            ResourceKind::SimplePost
        );
        assert!("page".parse::<ResourceKind>().is_err());
        assert_eq!(ResourceKind::SimplePost.path(), "simple-posts");
    }
}
