use std::sync::{Mutex, MutexGuard};

use http::HeaderMap;

use crate::config::RequestConfig;

pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

pub(crate) fn is_absolute_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Final URL for a merged config: absolute paths pass through untouched,
/// relative ones are joined onto `base_url` + `prefix`, then query params
/// are appended with `?`/`&` awareness.
pub(crate) fn resolve_url(config: &RequestConfig) -> String {
    let url = if is_absolute_url(config.url()) {
        config.url().to_owned()
    } else {
        join_url_parts(config.base_url_part(), config.prefix_part(), config.url())
    };
    append_query_pairs(&url, config.params())
}

pub(crate) fn join_url_parts(base_url: &str, prefix: &str, path: &str) -> String {
    let mut joined = base_url.trim_end_matches('/').to_owned();
    for part in [prefix, path] {
        let trimmed = part.trim_start_matches('/');
        if trimmed.is_empty() {
            continue;
        }
        if joined.is_empty() {
            // No base: keep the part's own leading slash.
            if part.starts_with('/') {
                joined.push('/');
            }
        } else {
            joined.push('/');
        }
        joined.push_str(trimmed.trim_end_matches('/'));
    }
    joined
}

pub(crate) fn append_query_pairs(url: &str, query_pairs: &[(String, String)]) -> String {
    if query_pairs.is_empty() {
        return url.to_owned();
    }

    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (name, value) in query_pairs {
        serializer.append_pair(name, value);
    }
    let query = serializer.finish();

    if url.contains('?') {
        format!("{url}&{query}")
    } else {
        format!("{url}?{query}")
    }
}

pub(crate) fn merge_headers(default_headers: &HeaderMap, request_headers: &HeaderMap) -> HeaderMap {
    let mut merged = default_headers.clone();
    for (name, value) in request_headers {
        merged.insert(name.clone(), value.clone());
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::{append_query_pairs, is_absolute_url, join_url_parts, resolve_url};
    use crate::config::RequestConfig;

    #[test]
    fn join_url_parts_handles_slashes() {
        assert_eq!(
            join_url_parts("https://api.example.com/", "/v1/", "/users"),
            "https://api.example.com/v1/users"
        );
        assert_eq!(
            join_url_parts("https://api.example.com", "", "users"),
            "https://api.example.com/users"
        );
        assert_eq!(join_url_parts("", "", "/users"), "/users");
        assert_eq!(join_url_parts("", "", "users"), "users");
    }

    #[test]
    fn absolute_url_passes_through() {
        let config = RequestConfig::get("https://other.test/health")
            .base_url("https://api.example.com")
            .prefix("/v1");
        assert_eq!(resolve_url(&config), "https://other.test/health");
        assert!(is_absolute_url("http://x.test/a"));
        assert!(!is_absolute_url("/a"));
    }

    #[test]
    fn params_append_with_question_mark_or_ampersand() {
        let pairs = vec![("page".to_owned(), "2".to_owned())];
        assert_eq!(append_query_pairs("/users", &pairs), "/users?page=2");
        assert_eq!(append_query_pairs("/users?a=1", &pairs), "/users?a=1&page=2");
    }

    #[test]
    fn params_are_form_urlencoded() {
        let pairs = vec![("q".to_owned(), "a b&c".to_owned())];
        assert_eq!(append_query_pairs("/search", &pairs), "/search?q=a+b%26c");
    }

    #[test]
    fn resolve_url_joins_base_prefix_and_params() {
        let config = RequestConfig::get("/users")
            .base_url("https://api.example.com")
            .prefix("/v1")
            .param("page", "2");
        assert_eq!(
            resolve_url(&config),
            "https://api.example.com/v1/users?page=2"
        );
    }
}
