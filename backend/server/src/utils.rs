use axum::http::Uri;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};

pub const HOME_PATH: &str = "/rango/";
pub const LOGIN_PATH: &str = "/rango/login/";

const CATEGORY_PREFIX: &str = "/rango/category/";

/// Category slug exactly as it appeared in the URL. Path extractors
/// percent-decode, which would turn an escaped underscore into a space.
pub fn category_slug(uri: &Uri) -> Option<&str> {
    uri.path()
        .strip_prefix(CATEGORY_PREFIX)?
        .split('/')
        .next()
        .filter(|slug| !slug.is_empty())
}

pub fn login_url(next: &str) -> String {
    format!(
        "{LOGIN_PATH}?next={}",
        utf8_percent_encode(next, NON_ALPHANUMERIC)
    )
}

/// Only local paths are followed after login, anything else goes home.
///
/// Browsers read `/\host` like `//host` and drop tabs and line breaks, so
/// backslashes and control characters are refused outright.
pub fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path) if is_local_path(path) => path,
        _ => HOME_PATH,
    }
}

fn is_local_path(path: &str) -> bool {
    path.starts_with('/')
        && !path.starts_with("//")
        && !path.chars().any(|c| c == '\\' || c.is_control())
}
