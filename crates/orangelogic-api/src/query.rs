//! Search request parameters and query-string construction.

use std::fmt::Write as _;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Fields returned by a search when the caller does not choose any.
pub const DEFAULT_FIELDS: [&str; 23] = [
    "Path_WebHigh",
    "Path_CMS1",
    "Path_TR7",
    "Path_TR3",
    "Path_TR2",
    "Path_TR1",
    "SystemIdentifier",
    "MediaIdentifier",
    "MediaEncryptedIdentifier",
    "MediaNumber",
    "Title",
    "Caption",
    "CaptionLong",
    "MediaDate",
    "CreateDate",
    "EditDate",
    "copyright",
    "Photographer",
    "Artist",
    "MediaType",
    "Link",
    "MaxWidth",
    "MaxHeight",
];

/// Media type filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaType {
    /// Still images.
    Image,
    /// Video clips.
    Video,
    /// Audio files.
    Audio,
    /// Albums.
    Album,
    /// Stories.
    Story,
    /// Graphics.
    Graphic,
}

impl MediaType {
    /// All media types in declaration order.
    pub const ALL: [Self; 6] = [
        Self::Image,
        Self::Video,
        Self::Audio,
        Self::Album,
        Self::Story,
        Self::Graphic,
    ];

    /// Returns the capitalized name used in queries.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Image => "Image",
            Self::Video => "Video",
            Self::Audio => "Audio",
            Self::Album => "Album",
            Self::Story => "Story",
            Self::Graphic => "Graphic",
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = String;

    /// Parses a media type, ignoring surrounding whitespace and ASCII case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|media| media.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| format!("unknown media type: {trimmed}"))
    }
}

/// Result ordering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortBy {
    /// Most recent first.
    #[default]
    Newest,
    /// Oldest first.
    Oldest,
    /// By ranking.
    Ranking,
    /// By relevancy to the query.
    Relevancy,
}

impl SortBy {
    /// Returns the name sent as the `sort` parameter.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Newest => "Newest",
            Self::Oldest => "Oldest",
            Self::Ranking => "Ranking",
            Self::Relevancy => "Relevancy",
        }
    }
}

impl std::fmt::Display for SortBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        [Self::Newest, Self::Oldest, Self::Ranking, Self::Relevancy]
            .into_iter()
            .find(|sort| sort.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| format!("unknown sort order: {trimmed}"))
    }
}

/// How double quotes inside `Text`/`Keyword` values are written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteEscaping {
    /// Values are inserted as-is; an embedded `"` ends the clause early.
    #[default]
    Verbatim,
    /// `\` and `"` are backslash-escaped.
    Backslash,
}

impl QuoteEscaping {
    fn apply(self, value: &str) -> String {
        match self {
            Self::Verbatim => String::from(value),
            Self::Backslash => value.replace('\\', "\\\\").replace('"', "\\\""),
        }
    }
}

/// Parameters for the `search/v3.0/search` endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// Free text matched against title, caption, keywords and similar fields.
    pub text: String,
    /// Exact keyword filter.
    pub keyword: String,
    /// Media type filter (`None` = all types).
    pub media_type: Option<MediaType>,
    /// Page number (1-based).
    pub page: u32,
    /// Result ordering.
    pub sort_by: SortBy,
    /// Fields to include for each item.
    pub fields: Vec<String>,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            text: String::new(),
            keyword: String::new(),
            media_type: None,
            page: 1,
            sort_by: SortBy::default(),
            fields: DEFAULT_FIELDS.iter().map(|f| String::from(*f)).collect(),
        }
    }
}

impl SearchQuery {
    /// Creates a query for the given free text.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Sets the keyword filter.
    #[must_use]
    pub fn keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = keyword.into();
        self
    }

    /// Sets the media type filter from its name.
    ///
    /// Unknown names clear the filter instead of failing.
    #[must_use]
    pub fn media_type(mut self, media_type: &str) -> Self {
        self.media_type = match media_type.parse::<MediaType>() {
            Ok(media) => Some(media),
            Err(_) => {
                if !media_type.trim().is_empty() {
                    tracing::debug!("Ignoring unknown media type: {}", media_type.trim());
                }
                None
            }
        };
        self
    }

    /// Sets the page number.
    #[must_use]
    pub const fn page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    /// Sets the result ordering.
    #[must_use]
    pub const fn sort_by(mut self, sort_by: SortBy) -> Self {
        self.sort_by = sort_by;
        self
    }

    /// Replaces the requested fields.
    #[must_use]
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Builds the remote query string.
    ///
    /// Clauses are emitted in `Text`, `Keyword`, `MediaType` order, each
    /// followed by a single space. Empty clauses are skipped.
    ///
    /// ```
    /// use orangelogic_api::{QuoteEscaping, SearchQuery};
    ///
    /// let query = SearchQuery::new("cat").media_type("Image");
    /// assert_eq!(
    ///     query.to_query_string(QuoteEscaping::Verbatim),
    ///     "Text:\"cat\" MediaType:\"Image\" "
    /// );
    /// ```
    #[must_use]
    pub fn to_query_string(&self, escaping: QuoteEscaping) -> String {
        let mut query = String::new();

        let text = self.text.trim();
        if !text.is_empty() {
            let _ = write!(query, "Text:\"{}\" ", escaping.apply(text));
        }

        let keyword = self.keyword.trim();
        if !keyword.is_empty() {
            let _ = write!(query, "Keyword:\"{}\" ", escaping.apply(keyword));
        }

        if let Some(media) = self.media_type {
            let _ = write!(query, "MediaType:\"{media}\" ");
        }

        query
    }

    /// Returns the comma-joined field list.
    #[must_use]
    pub fn fields_param(&self) -> String {
        self.fields.join(",")
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use tracing::subscriber::with_default;
    use tracing_mock::{expect, subscriber};

    use super::*;

    #[test]
    fn test_text_and_media_type_with_trailing_space() {
        // Arrange
        let query = SearchQuery::new("cat")
            .keyword("")
            .media_type("Image")
            .page(1)
            .sort_by(SortBy::Newest);

        // Act
        let result = query.to_query_string(QuoteEscaping::Verbatim);

        // Assert
        assert_eq!(result, "Text:\"cat\" MediaType:\"Image\" ");
    }

    #[test]
    fn test_all_clauses_in_fixed_order() {
        // Arrange
        let query = SearchQuery::new("  sunset ")
            .keyword(" beach\t")
            .media_type(" Video ");

        // Act
        let result = query.to_query_string(QuoteEscaping::Verbatim);

        // Assert
        assert_eq!(
            result,
            "Text:\"sunset\" Keyword:\"beach\" MediaType:\"Video\" "
        );
    }

    #[test]
    fn test_empty_query_string() {
        // Arrange
        let query = SearchQuery::new("   ").keyword("");

        // Act
        let result = query.to_query_string(QuoteEscaping::Verbatim);

        // Assert
        assert_eq!(result, "");
    }

    #[test]
    fn test_unknown_media_type_is_dropped() {
        // Arrange
        let query = SearchQuery::new("cat").media_type("Poster");

        // Act
        let result = query.to_query_string(QuoteEscaping::Verbatim);

        // Assert
        assert!(query.media_type.is_none());
        assert_eq!(result, "Text:\"cat\" ");
    }

    #[test]
    fn test_unknown_media_type_logs_debug_event() {
        // Arrange
        let (subscriber, handle) = subscriber::mock()
            .event(expect::event().with_fields(expect::msg("Ignoring unknown media type: Poster")))
            .only()
            .run_with_handle();

        // Act
        with_default(subscriber, || {
            let _ = SearchQuery::new("cat").media_type(" Poster ");
        });

        // Assert
        handle.assert_finished();
    }

    #[test]
    fn test_media_type_is_capitalized() {
        // Arrange
        let query = SearchQuery::default().media_type("graphic");

        // Act
        let result = query.to_query_string(QuoteEscaping::Verbatim);

        // Assert
        assert_eq!(query.media_type, Some(MediaType::Graphic));
        assert_eq!(result, "MediaType:\"Graphic\" ");
    }

    #[test]
    fn test_media_type_parse_all_values() {
        // Arrange & Act & Assert
        for media in MediaType::ALL {
            assert_eq!(media.as_str().parse::<MediaType>().unwrap(), media);
        }
        assert!("".parse::<MediaType>().is_err());
    }

    #[test]
    fn test_quotes_verbatim_by_default() {
        // Arrange
        let query = SearchQuery::new(r#"say "hi""#);

        // Act
        let result = query.to_query_string(QuoteEscaping::default());

        // Assert
        assert_eq!(result, r#"Text:"say "hi"" "#);
    }

    #[test]
    fn test_quotes_backslash_escaped() {
        // Arrange
        let query = SearchQuery::new(r#"say "hi""#).keyword(r"back\slash");

        // Act
        let result = query.to_query_string(QuoteEscaping::Backslash);

        // Assert
        assert_eq!(result, r#"Text:"say \"hi\"" Keyword:"back\\slash" "#);
    }

    #[test]
    fn test_default_query_values() {
        // Arrange & Act
        let query = SearchQuery::default();

        // Assert
        assert_eq!(query.page, 1);
        assert_eq!(query.sort_by, SortBy::Newest);
        assert_eq!(query.fields.len(), 23);
        assert!(query.fields_param().starts_with("Path_WebHigh,Path_CMS1,"));
        assert!(query.fields_param().ends_with(",MaxWidth,MaxHeight"));
    }

    #[test]
    fn test_custom_fields_joined() {
        // Arrange
        let query = SearchQuery::new("cat").fields(["Title", "MediaType"]);

        // Act & Assert
        assert_eq!(query.fields_param(), "Title,MediaType");
    }

    #[test]
    fn test_sort_by_parse_and_display() {
        // Arrange & Act & Assert
        assert_eq!("relevancy".parse::<SortBy>().unwrap(), SortBy::Relevancy);
        assert_eq!(SortBy::Oldest.to_string(), "Oldest");
        assert!("Random".parse::<SortBy>().is_err());
    }
}
