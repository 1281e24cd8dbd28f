//! Pure helpers: API path building (no HTTP, no status logic).

use url::Url;

use crate::error::{ClientError, ClientResult};

/// A path relative to the API base URL.
///
/// Segments and query values are stored raw and percent-encoded only when
/// resolved, so identity strings like `"A. Researcher"` or `"a/b"` can never
/// change the shape of the path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiPath {
    segments: Vec<String>,
    query: Vec<(String, String)>,
}

impl ApiPath {
    pub fn new() -> Self {
        Self::default()
    }

    /// Split a literal path such as `/vote` into segments.
    pub fn parse(path: &str) -> Self {
        Self {
            segments: path
                .split('/')
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
            query: Vec::new(),
        }
    }

    /// Append one segment; `/` inside `value` is escaped, not split.
    pub fn segment(mut self, value: impl ToString) -> Self {
        self.segments.push(value.to_string());
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Absolute URL under `base`.
    ///
    /// Empty, `.` and `..` segments are rejected: the URL parser would drop
    /// or collapse them and the request would reach a different endpoint.
    pub fn resolve(&self, base: &Url) -> ClientResult<Url> {
        if let Some(bad) = self
            .segments
            .iter()
            .find(|s| matches!(s.as_str(), "" | "." | ".."))
        {
            return Err(ClientError::InvalidInput {
                message: format!("path segment {:?} is not addressable", bad),
            });
        }

        let mut url = base.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| ClientError::Config {
                message: format!("API URL cannot be a base: {}", base),
            })?;
            segments.pop_if_empty();
            segments.extend(&self.segments);
        }
        if !self.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&self.query);
        }
        Ok(url)
    }
}

impl From<&str> for ApiPath {
    fn from(path: &str) -> Self {
        Self::parse(path)
    }
}

/// Parse and validate the API base URL.
pub(crate) fn parse_base_url(raw: &str) -> ClientResult<Url> {
    let url = Url::parse(raw).map_err(|e| ClientError::Config {
        message: format!("invalid API URL {}: {}", raw, e),
    })?;
    if url.cannot_be_a_base() {
        return Err(ClientError::Config {
            message: format!("API URL cannot be a base: {}", raw),
        });
    }
    Ok(url)
}
