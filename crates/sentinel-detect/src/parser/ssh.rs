//! sshd auth log parser.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use sentinel_core::{EventKind, EventSource, ParsedEvent};

// Common sshd lines, tried in order; first match wins.
static SSH_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // Failed password for invalid user admin from 192.168.1.1 port 55555 ssh2
        r"Failed password for (invalid user )?(?P<user>\S+) from (?P<ip>[\d.]+) port \d+ ssh2",
        // Disconnected from invalid user admin 192.168.1.1 port 55555 [preauth]
        r"Disconnected from (invalid user )?(?P<user>\S+) (?P<ip>[\d.]+) port \d+ \[preauth\]",
        // Accepted password for root from 10.0.0.1 port 22 ssh2
        r"Accepted password for (?P<user>\S+) from (?P<ip>[\d.]+) port \d+ ssh2",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("sshd pattern is valid"))
    .collect()
});

/// Parse one sshd auth line. Lines not mentioning `sshd[` or matching no
/// known pattern are skipped.
pub fn parse(line: &str, timestamp: f64) -> Option<ParsedEvent> {
    if !line.contains("sshd[") {
        return None;
    }

    for pattern in SSH_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(line) {
            let fields: HashMap<String, String> = pattern
                .capture_names()
                .flatten()
                .filter_map(|name| {
                    caps.name(name).map(|m| (name.to_string(), m.as_str().to_string()))
                })
                .collect();

            return Some(
                ParsedEvent::new(EventSource::Ssh, timestamp, line, EventKind::Auth)
                    .with_fields(fields),
            );
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_password() {
        let line = "Oct 10 13:55:36 host sshd[123]: Failed password for invalid user root from 10.0.0.5 port 55555 ssh2";
        let event = parse(line, 42.0).expect("line should parse");
        assert_eq!(event.source, EventSource::Ssh);
        assert_eq!(event.kind, EventKind::Auth);
        assert_eq!(event.field("user"), Some("root"));
        assert_eq!(event.field("ip"), Some("10.0.0.5"));
    }

    #[test]
    fn test_failed_password_known_user() {
        let line = "Oct 10 13:55:36 host sshd[99]: Failed password for deploy from 192.168.1.20 port 2222 ssh2";
        let event = parse(line, 0.0).unwrap();
        assert_eq!(event.field("user"), Some("deploy"));
        assert_eq!(event.field("ip"), Some("192.168.1.20"));
    }

    #[test]
    fn test_preauth_disconnect() {
        let line = "Oct 11 01:02:03 host sshd[5]: Disconnected from invalid user admin 203.0.113.9 port 4242 [preauth]";
        let event = parse(line, 0.0).unwrap();
        assert_eq!(event.field("user"), Some("admin"));
        assert_eq!(event.field("ip"), Some("203.0.113.9"));
    }

    #[test]
    fn test_accepted_password() {
        let line = "Oct 11 08:00:00 host sshd[77]: Accepted password for alice from 10.0.0.8 port 50000 ssh2";
        let event = parse(line, 0.0).unwrap();
        assert_eq!(event.field("user"), Some("alice"));
        assert_eq!(event.field("ip"), Some("10.0.0.8"));
    }

    #[test]
    fn test_non_sshd_line_skipped() {
        let line = "Oct 10 13:55:36 host cron[42]: Failed password for invalid user root from 10.0.0.5 port 55555 ssh2";
        assert!(parse(line, 0.0).is_none());
    }

    #[test]
    fn test_unmatched_sshd_line_skipped() {
        let line = "Oct 10 13:55:36 host sshd[123]: Server listening on 0.0.0.0 port 22";
        assert!(parse(line, 0.0).is_none());
    }
}
