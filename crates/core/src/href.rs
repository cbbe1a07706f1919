//! Href resolution: turn manifest/nav hrefs into canonical archive entry paths.
//!
//! Archive paths are always `/`-separated and relative to the archive root,
//! whatever the host platform uses.

use std::borrow::Cow;

use percent_encoding::percent_decode_str;

/// Decode percent-encoding once. Invalid UTF-8 sequences are replaced rather
/// than rejected so a single odd href never aborts a whole manifest.
pub fn decode_href(href: &str) -> Cow<'_, str> {
    percent_decode_str(href).decode_utf8_lossy()
}

/// Resolve `href` against `base_dir` and normalize the result into a canonical
/// archive path: percent-decoded, `.`/`..` collapsed, forward slashes only.
///
/// A leading `/` makes the href relative to the archive root. `..` segments that
/// climb above the root are kept, so such paths simply never match an entry.
/// A path that is already canonical under a non-empty `base_dir` is returned
/// unchanged, so resolving a result a second time neither re-prefixes the base
/// nor decodes it again.
pub fn normalize_href(base_dir: &str, href: &str) -> String {
    let base = normalize_path(base_dir);
    if !base.is_empty() && is_canonical_under(&base, href) {
        return href.to_string();
    }

    let decoded = decode_href(href).replace('\\', "/");
    let mut segments: Vec<&str> = Vec::new();
    if !decoded.starts_with('/') {
        push_segments(&mut segments, &base);
    }
    push_segments(&mut segments, &decoded);

    segments.join("/")
}

/// Structural normalization of an archive path: `.`/`..` collapsed, forward
/// slashes, no empty segments. No percent-decoding, so it is idempotent for
/// every input.
pub fn normalize_path(path: &str) -> String {
    let path = path.replace('\\', "/");
    let mut segments: Vec<&str> = Vec::new();
    push_segments(&mut segments, &path);
    segments.join("/")
}

fn is_canonical_under(base: &str, path: &str) -> bool {
    path.strip_prefix(base)
        .and_then(|rest| rest.strip_prefix('/'))
        .is_some_and(|rest| {
            !path.contains('\\') && rest.split('/').all(|s| !matches!(s, "" | "." | ".."))
        })
}

/// Directory part of an archive path, without trailing slash (`""` at root).
pub fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(i) => &path[..i],
        None => "",
    }
}

fn push_segments<'a>(segments: &mut Vec<&'a str>, path: &'a str) {
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(last) if *last != ".." => {
                    segments.pop();
                }
                _ => segments.push(".."),
            },
            other => segments.push(other),
        }
    }
}
