//! Mapping between Wiffi addresses and store ids
//!
//! Dots are path separators in the store, so `10.0.0.5` becomes the group
//! id `10_0_0_5`.

use wiffi_store::path;

/// Device object that holds one group per Wiffi
pub const ROOT_DEVICE: &str = "root";

/// Native point holding the last seen module type
pub const TYPE_POINT: &str = "Type";

/// Replace every run of `from` characters (and whitespace) with `to`
fn collapse_runs(input: &str, from: char, to: char) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_run = false;
    for c in input.chars() {
        if c == from || c.is_whitespace() {
            if !in_run {
                out.push(to);
                in_run = true;
            }
        } else {
            out.push(c);
            in_run = false;
        }
    }
    out
}

/// `10.0.0.5` -> `10_0_0_5`
pub fn ip_to_id(ip: &str) -> String {
    collapse_runs(ip, '.', '_')
}

/// `10_0_0_5` -> `10.0.0.5`
pub fn id_to_ip(id: &str) -> String {
    collapse_runs(id, '_', '.')
}

/// Group id of a Wiffi, e.g. `root.10_0_0_5`
pub fn group_id(ip: &str) -> String {
    path::join(ROOT_DEVICE, &ip_to_id(ip))
}

/// Full id of a point in a Wiffi's group
pub fn point_id(group: &str, point: &str) -> String {
    path::join(group, point)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ip_to_id() {
        assert_eq!(ip_to_id("10.0.0.5"), "10_0_0_5");
        assert_eq!(ip_to_id("10..0. 0.5"), "10_0_0_5");
        assert_eq!(ip_to_id("wiffi"), "wiffi");
    }

    #[test]
    fn test_id_to_ip() {
        assert_eq!(id_to_ip("10_0_0_5"), "10.0.0.5");
        assert_eq!(id_to_ip("10__0_ 0_5"), "10.0.0.5");
    }

    #[test]
    fn test_group_and_point_ids() {
        let group = group_id("192.168.1.20");
        assert_eq!(group, "root.192_168_1_20");
        assert_eq!(point_id(&group, TYPE_POINT), "root.192_168_1_20.Type");
    }
}
