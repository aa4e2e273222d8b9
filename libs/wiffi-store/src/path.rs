//! Dotted object path helpers
//!
//! Object ids are dot separated: `root` (device), `root.10_0_0_5` (group),
//! `root.10_0_0_5.temp1` (point). Rooms live under `enum.rooms.<room>`.

use crate::error::{Result, StoreError};

/// Separator between path segments
pub const SEPARATOR: char = '.';

/// Prefix of room enumeration ids
pub const ROOMS_PREFIX: &str = "enum.rooms";

/// Join a parent path and a child id
#[inline]
pub fn join(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        return child.to_string();
    }
    let mut out = String::with_capacity(parent.len() + 1 + child.len());
    out.push_str(parent);
    out.push(SEPARATOR);
    out.push_str(child);
    out
}

/// Parent of a path, `None` for a top level id
pub fn parent(path: &str) -> Option<&str> {
    path.rfind(SEPARATOR).map(|idx| &path[..idx])
}

/// Last segment of a path
pub fn leaf(path: &str) -> &str {
    match path.rfind(SEPARATOR) {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Remainder of `path` below `prefix`, or `None` if `path` is not inside it
///
/// `child_of("root.a", "root.a.temp1")` is `Some("temp1")`;
/// `child_of("root.a", "root.ab.temp1")` is `None`.
pub fn child_of<'a>(prefix: &str, path: &'a str) -> Option<&'a str> {
    path.strip_prefix(prefix)?
        .strip_prefix(SEPARATOR)
        .filter(|rest| !rest.is_empty())
}

/// Room enumeration id for a room name
pub fn room_id(room: &str) -> String {
    join(ROOMS_PREFIX, room)
}

/// Reject empty ids and ids with empty segments
pub fn validate(path: &str) -> Result<()> {
    if path.is_empty() || path.split(SEPARATOR).any(str::is_empty) {
        return Err(StoreError::InvalidId(path.to_string()));
    }
    Ok(())
}
