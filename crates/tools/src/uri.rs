/// Resource-path helpers for web-application relative URLs.
///
/// Paths handled here are always `/`-separated and rooted at the web
/// application's document root. No filesystem access happens in this module.
use url::form_urlencoded;

/// Collapse `.` and `..` segments of a `/`-separated path.
///
/// `..` never climbs above the root. A trailing `/` is preserved.
pub fn resolve_uri(uri: &str) -> String {
    let absolute = uri.starts_with('/');
    let trailing = uri.ends_with('/') || uri.ends_with("/.") || uri.ends_with("/..");
    let mut segments: Vec<&str> = Vec::new();
    for segment in uri.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    let mut out = String::with_capacity(uri.len());
    if absolute {
        out.push('/');
    }
    out.push_str(&segments.join("/"));
    if trailing && !segments.is_empty() {
        out.push('/');
    }
    out
}

/// Directory part of `path`, including the trailing `/`.
///
/// Returns `"/"` for paths without a directory component.
pub fn parent_directory(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..=idx],
        None => "/",
    }
}

/// Resolve `path` against `base_dir` unless it is already absolute.
pub fn resolve_against(base_dir: &str, path: &str) -> String {
    if path.starts_with('/') {
        return resolve_uri(path);
    }
    let mut joined = String::with_capacity(base_dir.len() + path.len() + 1);
    joined.push_str(base_dir);
    if !joined.ends_with('/') {
        joined.push('/');
    }
    joined.push_str(path);
    resolve_uri(&joined)
}

/// Form-urlencode a resource path (`/` becomes `%2F`, space becomes `+`).
pub fn encode_path(path: &str) -> String {
    form_urlencoded::byte_serialize(path.as_bytes()).collect()
}

/// Inverse of [`encode_path`].
pub fn decode_path(encoded: &str) -> String {
    // An encoded path never contains a raw `&` or `=`, so it parses as a
    // single key with an empty value.
    form_urlencoded::parse(encoded.as_bytes())
        .next()
        .map(|(key, _)| key.into_owned())
        .unwrap_or_default()
}
