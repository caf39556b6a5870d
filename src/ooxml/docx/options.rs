//! Options for loading and merging documents.
//!
//! Both structs follow the same pattern: `Default` gives the usual behaviour
//! and `with_*` builders adjust single settings.
//!
//! # Examples
//!
//! ```rust
//! use rambutan::ooxml::docx::{BlankRule, LoadOptions, MergeOptions};
//!
//! let load = LoadOptions::new().with_adjust_drawing_ids(true);
//! let merge = MergeOptions::new().with_blank_rule(BlankRule::Exact);
//! assert!(load.adjust_drawing_ids);
//! assert_eq!(merge.blank_rule, BlankRule::Exact);
//! ```

/// Default part name of the comments part.
pub const DEFAULT_COMMENTS_PARTNAME: &str = "/word/comments.xml";

/// Settings applied while a package is indexed.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Rewrite colliding `wp:docPr` ids found while indexing
    pub adjust_drawing_ids: bool,
    /// Track drawing ids at all. When off, id reservation is a passthrough
    /// and neither loading nor merging rewrites ids.
    pub track_drawing_ids: bool,
    /// Part name used when a comments part has to be created
    pub comments_partname: String,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            adjust_drawing_ids: false,
            track_drawing_ids: true,
            comments_partname: DEFAULT_COMMENTS_PARTNAME.to_string(),
        }
    }
}

impl LoadOptions {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether duplicate drawing ids are rewritten during load.
    ///
    /// Ids are always recorded (unless tracking is off); this only controls
    /// whether the XML is changed when a collision is found.
    #[inline]
    pub fn with_adjust_drawing_ids(mut self, adjust: bool) -> Self {
        self.adjust_drawing_ids = adjust;
        self
    }

    #[inline]
    pub fn with_track_drawing_ids(mut self, track: bool) -> Self {
        self.track_drawing_ids = track;
        self
    }

    #[inline]
    pub fn with_comments_partname(mut self, partname: impl Into<String>) -> Self {
        self.comments_partname = partname.into();
        self
    }
}

/// How the anchor paragraph's text is judged blank before a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlankRule {
    /// Text made only of whitespace counts as blank
    #[default]
    Whitespace,
    /// Only the empty string counts as blank
    Exact,
    /// Blank when every character satisfies the predicate
    Custom(fn(char) -> bool),
}

impl BlankRule {
    pub fn is_blank(&self, text: &str) -> bool {
        match self {
            BlankRule::Whitespace => text.chars().all(char::is_whitespace),
            BlankRule::Exact => text.is_empty(),
            BlankRule::Custom(ignorable) => text.chars().all(|c| ignorable(c)),
        }
    }
}

/// Settings for [`Document::merge`](crate::ooxml::docx::Document::merge).
#[derive(Debug, Clone, Default)]
pub struct MergeOptions {
    pub blank_rule: BlankRule,
}

impl MergeOptions {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn with_blank_rule(mut self, rule: BlankRule) -> Self {
        self.blank_rule = rule;
        self
    }
}
