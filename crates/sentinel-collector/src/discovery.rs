//! Discovery of standard system log locations.
//!
//! A static table maps log categories to their conventional paths across
//! distributions. Discovery probes each candidate and returns the ones
//! that exist; it has no side effects beyond informational logging and is
//! safe to run repeatedly.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

/// Category -> candidate absolute paths.
///
/// Paths containing `*` are treated as glob patterns.
const DISCOVERY_MAP: &[(&str, &[&str])] = &[
    (
        "ssh",
        &[
            "/var/log/auth.log", // Debian/Ubuntu
            "/var/log/secure",   // RHEL/CentOS
        ],
    ),
    (
        "nginx",
        &["/var/log/nginx/access.log", "/var/log/nginx/error.log"],
    ),
    (
        "apache",
        &["/var/log/apache2/access.log", "/var/log/httpd/access_log"],
    ),
    ("system", &["/var/log/syslog", "/var/log/messages"]),
    ("kernel", &["/var/log/kern.log"]),
    ("firewall", &["/var/log/ufw.log"]),
];

/// Discover active log files on this host.
///
/// Returns a map of category -> existing paths; categories with no hit are
/// omitted.
pub fn discover() -> BTreeMap<String, Vec<PathBuf>> {
    discover_candidates(DISCOVERY_MAP)
}

fn discover_candidates(map: &[(&str, &[&str])]) -> BTreeMap<String, Vec<PathBuf>> {
    let mut discovered = BTreeMap::new();

    for (category, candidates) in map {
        let mut found = Vec::new();
        for candidate in *candidates {
            found.extend(expand_candidate(candidate));
        }

        if !found.is_empty() {
            info!(category, paths = ?found, "discovered log files");
            discovered.insert(category.to_string(), found);
        } else {
            debug!(category, "no log files found");
        }
    }

    discovered
}

/// Expand one candidate path: glob patterns yield every match, plain paths
/// yield themselves when they exist.
fn expand_candidate(candidate: &str) -> Vec<PathBuf> {
    if candidate.contains('*') {
        match glob::glob(candidate) {
            Ok(matches) => matches.filter_map(|m| m.ok()).collect(),
            Err(e) => {
                debug!(candidate, error = %e, "invalid discovery pattern");
                Vec::new()
            }
        }
    } else {
        let path = Path::new(candidate);
        if path.exists() {
            vec![path.to_path_buf()]
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_expand_plain_path() {
        let tmp = tempfile::TempDir::new().unwrap();
        let log = tmp.path().join("auth.log");
        fs::write(&log, "x\n").unwrap();

        let found = expand_candidate(log.to_str().unwrap());
        assert_eq!(found, vec![log]);

        let missing = tmp.path().join("nope.log");
        assert!(expand_candidate(missing.to_str().unwrap()).is_empty());
    }

    #[test]
    fn test_expand_glob_pattern() {
        let tmp = tempfile::TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("vhost-a")).unwrap();
        fs::create_dir(tmp.path().join("vhost-b")).unwrap();
        fs::write(tmp.path().join("vhost-a/access.log"), "").unwrap();
        fs::write(tmp.path().join("vhost-b/access.log"), "").unwrap();

        let pattern = format!("{}/*/access.log", tmp.path().display());
        let mut found = expand_candidate(&pattern);
        found.sort();
        assert_eq!(found.len(), 2);
        assert!(found[0].ends_with("vhost-a/access.log"));
    }

    #[test]
    fn test_discover_omits_empty_categories() {
        let tmp = tempfile::TempDir::new().unwrap();
        let auth = tmp.path().join("auth.log");
        fs::write(&auth, "").unwrap();

        let auth_str = auth.to_string_lossy().to_string();
        let missing = format!("{}/secure", tmp.path().display());
        let ssh: &[&str] = &[&auth_str, &missing];
        let kernel: &[&str] = &["/definitely/not/here/kern.log"];
        let map = [("ssh", ssh), ("kernel", kernel)];

        let discovered = discover_candidates(&map);
        assert_eq!(discovered.len(), 1);
        assert_eq!(discovered["ssh"], vec![auth]);
    }

    #[test]
    fn test_discover_is_idempotent() {
        // Whatever this host has, two passes must agree.
        assert_eq!(discover(), discover());
    }
}
