//! Storage URL helpers: `protocol://authority` namespaces and directory
//! arithmetic.

use once_cell::sync::Lazy;
use regex::Regex;

static NAMESPACE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([a-zA-Z][a-zA-Z0-9+.\-]*://)([a-zA-Z0-9@_.\-]*(?::\d+)?)").unwrap()
});

/// `protocol://host[:port]` prefix of a location, if it has one.
pub fn get_namespace(location: &str) -> Option<&str> {
    NAMESPACE.find(location.trim()).map(|m| m.as_str())
}

/// `protocol://` of a location.
pub fn get_protocol(location: &str) -> Option<&str> {
    NAMESPACE
        .captures(location.trim())
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Path part of a location (the whole location when it has no namespace).
pub fn strip_namespace(location: &str) -> &str {
    let location = location.trim();
    match get_namespace(location) {
        Some(ns) => &location[ns.len()..],
        None => location,
    }
}

/// Swap the namespace of `location` for `new_namespace`.
pub fn replace_namespace(location: &str, new_namespace: &str) -> String {
    let path = strip_namespace(location);
    let ns = new_namespace.trim().trim_end_matches('/');
    if path.starts_with('/') {
        format!("{}{}", ns, path)
    } else {
        format!("{}/{}", ns, path)
    }
}

/// Drop the last `level` directories.
pub fn reduce_url_by(url: &str, level: usize) -> String {
    let mut rtn = url.trim().trim_end_matches('/').to_string();
    for _ in 0..level {
        match rtn.rfind('/') {
            Some(idx) if !rtn[..idx].ends_with('/') && idx > 0 => rtn.truncate(idx),
            _ => break,
        }
    }
    rtn
}

/// Final path segment.
pub fn last_directory(location: &str) -> Option<&str> {
    strip_namespace(location)
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
}

/// Location minus its final path segment.
pub fn parent_directory(location: &str) -> String {
    reduce_url_by(location, 1)
}

/// Normalize a configured directory to `/a/b` form.
pub fn normalize_dir(dir: &str) -> String {
    let trimmed = dir.trim().trim_matches('/');
    format!("/{}", trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_namespace() {
        assert_eq!(get_namespace("hdfs://prod-ns/warehouse/x"), Some("hdfs://prod-ns"));
        assert_eq!(
            get_namespace("hdfs://nn1.example.com:8020/warehouse"),
            Some("hdfs://nn1.example.com:8020")
        );
        assert_eq!(get_namespace("s3a://bucket"), Some("s3a://bucket"));
        assert_eq!(get_namespace("/warehouse/x"), None);
        assert_eq!(get_protocol("ofs://ozone1/vol"), Some("ofs://"));
    }

    #[test]
    fn test_strip_and_replace_namespace() {
        assert_eq!(strip_namespace("hdfs://old/warehouse/db.db"), "/warehouse/db.db");
        assert_eq!(strip_namespace("/already/relative"), "/already/relative");
        assert_eq!(
            replace_namespace("hdfs://old/warehouse/db.db", "s3a://new/"),
            "s3a://new/warehouse/db.db"
        );
        assert_eq!(replace_namespace("warehouse/t", "hdfs://ns"), "hdfs://ns/warehouse/t");
    }

    #[test]
    fn test_reduce_url_by() {
        assert_eq!(reduce_url_by("hdfs://ns/a/b/c/", 1), "hdfs://ns/a/b");
        assert_eq!(reduce_url_by("hdfs://ns/a/b/c", 2), "hdfs://ns/a");
        assert_eq!(reduce_url_by("hdfs://ns/a", 5), "hdfs://ns");
        assert_eq!(reduce_url_by("/a/b", 0), "/a/b");
    }

    #[test]
    fn test_directories() {
        assert_eq!(last_directory("hdfs://ns/a/b/tbl/"), Some("tbl"));
        assert_eq!(parent_directory("hdfs://ns/a/b/tbl"), "hdfs://ns/a/b");
        assert_eq!(normalize_dir("warehouse/external/"), "/warehouse/external");
    }
}
