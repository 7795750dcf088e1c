//! `file://` URI helpers.
//!
//! Used to resolve path-based snippet variables from a document URI and to pick a document's
//! edits out of a `WorkspaceEdit`.

use std::path::{Path, PathBuf};

/// Convert an absolute filesystem path to a `file://` URI.
///
/// The path is not canonicalized; relative paths are resolved against the current directory.
pub fn path_to_file_uri(path: &Path) -> String {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut path_str = absolute.to_string_lossy().into_owned();

    if cfg!(windows) {
        path_str = path_str.replace('\\', "/");
        if !path_str.starts_with('/') {
            path_str.insert(0, '/');
        }
    }

    format!("file://{}", percent_encode_path(&path_str))
}

/// Percent-encode a URI path, keeping unreserved bytes and `/`.
pub fn percent_encode_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for &b in path.as_bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' | b'/' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

/// Decode `%XX` escapes. Malformed escapes are kept as they are.
pub fn percent_decode_path(path: &str) -> String {
    let bytes = path.as_bytes();
    let mut out = Vec::<u8>::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%'
            && let Some(hex) = path.get(i + 1..i + 3)
            && let Ok(value) = u8::from_str_radix(hex, 16)
        {
            out.push(value);
            i += 3;
            continue;
        }
        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}

/// Convert a `file://` URI into a filesystem path. Other schemes return `None`.
pub fn file_uri_to_path(uri: &str) -> Option<PathBuf> {
    let rest = uri.strip_prefix("file://")?;
    let rest = rest.strip_prefix("localhost").unwrap_or(rest);
    let mut path_str = percent_decode_path(rest);

    // `file:///C:/...` -> `C:/...`
    if cfg!(windows) {
        if path_str.starts_with('/') && path_str.get(2..3) == Some(":") {
            path_str.remove(0);
        }
        path_str = path_str.replace('/', "\\");
    }

    Some(PathBuf::from(path_str))
}

/// Returns `true` if two URIs name the same document.
///
/// Servers are free to re-encode URIs they were given (`%3A` vs `:`, `file://localhost/`), so
/// `file` URIs are compared by decoded path.
pub fn same_document(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    match (file_uri_to_path(a), file_uri_to_path(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_roundtrip() {
        let input = "/tmp/hello world#1.txt";
        let encoded = percent_encode_path(input);
        assert_eq!(encoded, "/tmp/hello%20world%231.txt");
        assert_eq!(percent_decode_path(&encoded), input);
    }

    #[test]
    fn test_malformed_escape_is_kept() {
        assert_eq!(percent_decode_path("/a%2/b%zz"), "/a%2/b%zz");
    }

    #[cfg(unix)]
    #[test]
    fn test_file_uri_roundtrip() {
        let uri = path_to_file_uri(Path::new("/tmp/hello world.txt"));
        assert_eq!(uri, "file:///tmp/hello%20world.txt");
        assert_eq!(
            file_uri_to_path(&uri),
            Some(PathBuf::from("/tmp/hello world.txt"))
        );
        assert_eq!(
            file_uri_to_path("file://localhost/tmp/a.rs"),
            Some(PathBuf::from("/tmp/a.rs"))
        );
        assert_eq!(file_uri_to_path("untitled:Untitled-1"), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_same_document_ignores_encoding() {
        assert!(same_document("file:///tmp/a%20b.rs", "file:///tmp/a b.rs"));
        assert!(same_document("file:///tmp/a.rs", "file://localhost/tmp/a.rs"));
        assert!(!same_document("file:///tmp/a.rs", "file:///tmp/b.rs"));
        assert!(same_document("untitled:1", "untitled:1"));
    }
}
