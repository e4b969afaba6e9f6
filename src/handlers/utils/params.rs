//! Small request-parsing helpers: query-string parameters and numeric
//! path segments.

/// Extract a query-string parameter by name.
///
/// `query` is `req.uri().query()` — kept as a plain argument so the parsing
/// is testable without constructing a hyper request.
pub fn query_param(query: Option<&str>, name: &str) -> Option<String> {
    query.and_then(|q| {
        form_urlencoded::parse(q.as_bytes())
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    })
}

/// Parse the `n`th path segment as an id.
/// e.g. `path_id("/api/posts/42", 3)` → `Some(42)`.
pub fn path_id(path: &str, segment: usize) -> Option<i64> {
    path.split('/').nth(segment).and_then(|s| s.parse::<i64>().ok())
}
