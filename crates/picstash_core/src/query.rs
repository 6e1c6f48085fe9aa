//! Typed listing queries.
//!
//! Sort keys, orders and tag-match modes are closed enums. Their string forms
//! (`"modificationDateFile"`, `"ASC"`, `"all"`, ...) parse via [`std::str::FromStr`]
//! so a service shell can convert query parameters once at its boundary.

use crate::{ImageRecord, TagId};
use serde::{Deserialize, Serialize};

/// Page size used when a query does not specify one.
pub const DEFAULT_PAGE_SIZE: usize = 25;

/// How a tag filter combines its tags.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::EnumString,
    strum::EnumIter,
    derive_more::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum TagMatch {
    /// Record must carry every listed tag
    #[display("all")]
    All,
    /// Record must carry at least one listed tag
    #[default]
    #[display("any")]
    Any,
}

/// Tag filter applied before sorting and pagination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagFilter {
    /// Tags to match against
    pub tags: Vec<TagId>,
    /// Combination mode
    pub mode: TagMatch,
}

impl TagFilter {
    /// Require every tag.
    pub fn all(tags: impl IntoIterator<Item = TagId>) -> Self {
        Self {
            tags: tags.into_iter().collect(),
            mode: TagMatch::All,
        }
    }

    /// Require at least one tag.
    pub fn any(tags: impl IntoIterator<Item = TagId>) -> Self {
        Self {
            tags: tags.into_iter().collect(),
            mode: TagMatch::Any,
        }
    }

    /// Whether `record` passes the filter. An empty tag list passes everything.
    pub fn matches(&self, record: &ImageRecord) -> bool {
        if self.tags.is_empty() {
            return true;
        }
        match self.mode {
            TagMatch::All => self.tags.iter().all(|t| record.has_tag(t)),
            TagMatch::Any => self.tags.iter().any(|t| record.has_tag(t)),
        }
    }

    /// Whether the filter lists no tags.
    ///
    /// # Examples
    ///
    /// ```
    /// use picstash_core::{TagFilter, TagId};
    ///
    /// assert!(TagFilter::all(Vec::<TagId>::new()).is_empty());
    /// assert!(!TagFilter::any([TagId::new()]).is_empty());
    /// ```
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

/// Field a listing is sorted by.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::EnumString,
    strum::EnumIter,
    derive_more::Display,
)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    /// Creation time
    #[default]
    #[strum(serialize = "createdAt", serialize = "created_at")]
    #[display("createdAt")]
    CreatedAt,
    /// Last metadata change
    #[strum(
        serialize = "updatedAt",
        serialize = "updated_at",
        serialize = "modificationDateMeta"
    )]
    #[display("updatedAt")]
    UpdatedAt,
    /// Last blob binding change
    #[strum(
        serialize = "fileUpdatedAt",
        serialize = "file_updated_at",
        serialize = "modificationDateFile"
    )]
    #[display("fileUpdatedAt")]
    FileUpdatedAt,
    /// Title, byte-wise
    #[strum(serialize = "title")]
    #[display("title")]
    Title,
    /// Blob size
    #[strum(serialize = "fileSize", serialize = "file_size")]
    #[display("fileSize")]
    FileSize,
}

/// Sort direction.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::EnumString,
    strum::EnumIter,
    derive_more::Display,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(ascii_case_insensitive)]
pub enum SortOrder {
    /// Smallest first
    #[display("ASC")]
    Asc,
    /// Largest first
    #[default]
    #[display("DESC")]
    Desc,
}

/// A validated listing request.
///
/// # Examples
///
/// ```
/// use picstash_core::{ListQuery, SortKey, SortOrder, TagFilter, TagId};
///
/// let query = ListQuery::builder()
///     .tag_filter(TagFilter::any([TagId::new()]))
///     .sort_key(SortKey::FileSize)
///     .sort_order(SortOrder::Asc)
///     .size(10usize)
///     .include_duplicates(false)
///     .build()
///     .unwrap();
///
/// assert_eq!(*query.size(), 10);
/// assert_eq!(*query.offset(), 0);
/// ```
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    derive_builder::Builder,
    derive_getters::Getters,
)]
#[builder(default, setter(into), build_fn(validate = "Self::validate"))]
pub struct ListQuery {
    /// Optional tag filter
    #[builder(setter(into, strip_option))]
    tag_filter: Option<TagFilter>,
    /// Sort field
    sort_key: SortKey,
    /// Sort direction
    sort_order: SortOrder,
    /// Records to skip after filtering and sorting
    offset: usize,
    /// Maximum records to return
    size: usize,
    /// When false, only one record per content hash is listed
    include_duplicates: bool,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            tag_filter: None,
            sort_key: SortKey::default(),
            sort_order: SortOrder::default(),
            offset: 0,
            size: DEFAULT_PAGE_SIZE,
            include_duplicates: true,
        }
    }
}

impl ListQuery {
    /// Start building a query from the defaults.
    pub fn builder() -> ListQueryBuilder {
        ListQueryBuilder::default()
    }

    /// Whether `record` passes the tag filter.
    pub fn matches(&self, record: &ImageRecord) -> bool {
        self.tag_filter.as_ref().is_none_or(|f| f.matches(record))
    }
}

impl ListQueryBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(0) = self.size {
            return Err("page size must be at least 1".to_string());
        }
        Ok(())
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Records on this page
    pub data: Vec<ImageRecord>,
    /// Records matching the query before pagination
    pub total: u64,
    /// Records on this page
    pub length: usize,
    /// Offset the page starts at
    pub offset: usize,
    /// Requested page size
    pub size: usize,
}

impl SearchResult {
    /// Assemble a page.
    pub fn new(data: Vec<ImageRecord>, total: u64, query: &ListQuery) -> Self {
        Self {
            length: data.len(),
            data,
            total,
            offset: query.offset,
            size: query.size,
        }
    }
}
