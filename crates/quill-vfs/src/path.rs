//! Pure path-segment helpers.
//!
//! Paths arrive either as bare POSIX-style relative paths or as `file://`
//! prefixed absolute URIs; both resolve against the project root. None of
//! these helpers touch a real filesystem.

const FILE_SCHEME: &str = "file://";

/// Strips the `file://` URI prefix when present.
pub fn normalize(path: &str) -> &str {
    path.strip_prefix(FILE_SCHEME).unwrap_or(path)
}

/// Splits a path into its non-empty segments.
///
/// Empty segments are dropped, so `"/a//b"` and `"a/b"` traverse identically.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    normalize(path).split('/').filter(|s| !s.is_empty())
}

/// Returns the directory portion of `path`, or `"."` when there is none.
///
/// A `"."` (or empty) dirname means "the project root, no traversal" — it is
/// never treated as a literal segment named `.`.
pub fn dirname(path: &str) -> &str {
    let path = normalize(path);
    match path.rfind('/') {
        Some(0) => "/",
        Some(idx) => &path[..idx],
        None => ".",
    }
}

/// Returns the final segment of `path`.
pub fn basename(path: &str) -> &str {
    let path = normalize(path);
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Returns the extension of the final segment, without the leading dot.
///
/// Dotfiles (`.gitignore`) and names without a dot have no extension.
pub fn extension(path: &str) -> Option<&str> {
    let name = basename(path);
    match name.rfind('.') {
        Some(0) | None => None,
        Some(idx) => Some(&name[idx + 1..]),
    }
}

/// Whether `dir` names the project root ("no traversal").
pub fn is_root(dir: &str) -> bool {
    let dir = normalize(dir);
    dir.is_empty() || dir == "." || dir == "/"
}

/// Canonical identifier for a file: `/`-joined segments with a leading slash,
/// so `a.ts`, `/a.ts` and `file:///a.ts` all map to the same key. Used for
/// version records and content caches.
pub fn canonical(path: &str) -> String {
    let mut key = String::with_capacity(path.len() + 1);
    for segment in segments(path) {
        key.push('/');
        key.push_str(segment);
    }
    if key.is_empty() {
        key.push('/');
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_file_scheme() {
        assert_eq!(normalize("file:///src/a.ts"), "/src/a.ts");
        assert_eq!(normalize("/src/a.ts"), "/src/a.ts");
    }

    #[test]
    fn dirname_of_root_level_file_is_dot_or_slash() {
        assert_eq!(dirname("a.ts"), ".");
        assert_eq!(dirname("/a.ts"), "/");
        assert_eq!(dirname("/src/lib/a.ts"), "/src/lib");
        assert!(is_root(dirname("a.ts")));
        assert!(is_root(dirname("/a.ts")));
    }

    #[test]
    fn basename_is_final_segment() {
        assert_eq!(basename("/src/lib/a.ts"), "a.ts");
        assert_eq!(basename("a.ts"), "a.ts");
        assert_eq!(basename("file:///b.ts"), "b.ts");
    }

    #[test]
    fn extension_excludes_dotfiles() {
        assert_eq!(extension("/src/a.ts"), Some("ts"));
        assert_eq!(extension("/src/a.d.ts"), Some("ts"));
        assert_eq!(extension("/src/.gitignore"), None);
        assert_eq!(extension("/src/Makefile"), None);
    }

    #[test]
    fn segments_drop_empty_parts() {
        let parts: Vec<_> = segments("file:///src//lib/a.ts").collect();
        assert_eq!(parts, ["src", "lib", "a.ts"]);
        assert_eq!(segments(".").count(), 1); // "." is only special as a dirname
        assert_eq!(segments("/").count(), 0);
    }
}
