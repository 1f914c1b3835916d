//! Allow-list sanitization of formatted assistant replies.
//!
//! Only allow-listed elements and attributes survive, and the result is safe
//! to inject as markup. Running the sanitizer on its own output returns it
//! unchanged.

use std::collections::{HashMap, HashSet};

use ammonia::{Builder, UrlRelative};
use once_cell::sync::Lazy;

// Dropped together with everything inside them.
const RAW_CONTENT_TAGS: &[&str] = &[
    "script", "style", "iframe", "object", "embed", "noscript", "template", "textarea", "title",
    "xmp", "noembed", "noframes", "svg", "math", "select",
];

static ANCHORS_ONLY: Lazy<SanitizePolicy> = Lazy::new(SanitizePolicy::anchors_only);

#[derive(Debug)]
pub struct SanitizePolicy {
    builder: Builder<'static>,
}

impl Default for SanitizePolicy {
    fn default() -> Self {
        Self::anchors_only()
    }
}

pub fn sanitize(markup: &str) -> String {
    ANCHORS_ONLY.sanitize(markup)
}

impl SanitizePolicy {
    pub fn anchors_only() -> Self {
        Self::new(
            &["a"],
            &["href", "target", "rel", "class"],
            &["http", "https", "mailto", "tel"],
        )
    }

    // Raw-content tags are never allowed, whatever `tags` says.
    pub fn new(
        tags: &[&'static str],
        attributes: &[&'static str],
        schemes: &[&'static str],
    ) -> Self {
        let tags = tags
            .iter()
            .copied()
            .filter(|tag| !RAW_CONTENT_TAGS.contains(tag))
            .collect::<HashSet<_>>();
        let attributes = attributes.iter().copied().collect::<HashSet<_>>();
        let tag_attributes = tags
            .iter()
            .map(|tag| (*tag, attributes.clone()))
            .collect::<HashMap<_, _>>();

        let mut builder = Builder::empty();
        builder
            .tags(tags)
            .clean_content_tags(RAW_CONTENT_TAGS.iter().copied().collect())
            .tag_attributes(tag_attributes)
            .url_schemes(schemes.iter().copied().collect())
            .url_relative(UrlRelative::PassThrough)
            .link_rel(None)
            .strip_comments(true);

        Self { builder }
    }

    pub fn sanitize(&self, markup: &str) -> String {
        self.builder.clean(markup).to_string()
    }
}
