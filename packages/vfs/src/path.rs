//! Path normalisation shared by every mount.
//!
//! Mount paths are forward-slash separated, relative, and never start or end
//! with a slash. The empty string is the root. `..` components only survive
//! normalisation when they climb above the root, which callers treat as
//! invalid.

/// Characters stripped from paths. Sorted by ASCII value.
const SPECIAL_CHARS: &[char] = &['"', '*', ':', '<', '>', '?', '|'];
const SPECIAL_CHARS_ALLOW_WILDCARDS: &[char] = &['"', ':', '<', '>', '|'];

/// Longest allowed path component, in characters.
pub const MAX_COMPONENT_LENGTH: usize = 255;

/// Normalise a user-supplied path.
///
/// Backslashes become slashes, control and reserved characters are removed,
/// `.` and runs of three or more dots are dropped and `..` cancels the
/// previous component where there is one.
pub fn sanitize_path(path: &str, allow_wildcards: bool) -> String {
    let special = if allow_wildcards {
        SPECIAL_CHARS_ALLOW_WILDCARDS
    } else {
        SPECIAL_CHARS
    };

    let cleaned: String = path
        .chars()
        .map(|c| if c == '\\' { '/' } else { c })
        .filter(|c| (*c as u32) >= 32 && special.binary_search(c).is_err())
        .collect();

    let mut parts: Vec<String> = Vec::new();
    for part in cleaned.split('/') {
        let part = part.trim();
        if part.is_empty() || part == "." || is_dots(part) {
            continue;
        }

        if part == ".." {
            match parts.last() {
                Some(top) if top != ".." => {
                    parts.pop();
                }
                _ => parts.push("..".to_string()),
            }
        } else if part.chars().count() >= MAX_COMPONENT_LENGTH {
            let truncated: String = part.chars().take(MAX_COMPONENT_LENGTH).collect();
            parts.push(truncated.trim().to_string());
        } else {
            parts.push(part.to_string());
        }
    }

    parts.join("/")
}

/// Three or more dots, which are treated like `.`.
fn is_dots(part: &str) -> bool {
    part.len() >= 3 && part.chars().all(|c| c == '.')
}

/// Join `child` onto `path`, normalising both.
pub fn combine(path: &str, child: &str) -> String {
    let path = sanitize_path(path, true);
    let child = sanitize_path(child, true);
    if path.is_empty() {
        child
    } else if child.is_empty() {
        path
    } else {
        sanitize_path(&format!("{}/{}", path, child), true)
    }
}

/// Parent directory of `path`. The parent of the root is `..`.
pub fn get_directory(path: &str) -> String {
    let path = sanitize_path(path, true);
    if path.is_empty() {
        return "..".to_string();
    }

    let last_slash = path.rfind('/');
    let last = match last_slash {
        Some(i) => &path[i + 1..],
        None => path.as_str(),
    };
    if last == ".." {
        return format!("{}/..", path);
    }

    match last_slash {
        Some(i) => path[..i].to_string(),
        None => String::new(),
    }
}

/// Final component of `path`. The root is called `root`.
pub fn get_name(path: &str) -> String {
    let path = sanitize_path(path, true);
    if path.is_empty() {
        return "root".to_string();
    }
    match path.rfind('/') {
        Some(i) => path[i + 1..].to_string(),
        None => path,
    }
}

/// Whether `child` is `parent` or lies underneath it. Case-insensitive.
pub fn contains(parent: &str, child: &str) -> bool {
    let parent = sanitize_path(parent, false).to_lowercase();
    let child = sanitize_path(child, false).to_lowercase();

    if child == ".." || child.starts_with("../") {
        false
    } else if child == parent || parent.is_empty() {
        true
    } else {
        child.starts_with(&format!("{}/", parent))
    }
}

/// Strip the mount `location` prefix off `path`.
///
/// `path` must be contained in `location`.
pub fn to_local(path: &str, location: &str) -> String {
    let path = sanitize_path(path, false);
    let location = sanitize_path(location, false);
    debug_assert!(contains(&location, &path));

    let local = path.get(location.len()..).unwrap_or("");
    local.strip_prefix('/').unwrap_or(local).to_string()
}

/// Match a single path component against a pattern with `*` and `?`.
pub(crate) fn wildcard_match(pattern: &str, name: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let name: Vec<char> = name.chars().collect();

    let (mut p, mut n) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while n < name.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == name[n]) {
            p += 1;
            n += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some((p, n));
            p += 1;
        } else if let Some((sp, sn)) = star {
            p = sp + 1;
            n = sn + 1;
            star = Some((sp, sn + 1));
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|c| *c == '*')
}
