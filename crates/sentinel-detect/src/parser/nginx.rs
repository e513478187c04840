//! Nginx access log parser (Combined Log Format).

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use sentinel_core::{EventKind, EventSource, ParsedEvent};

// 127.0.0.1 - frank [10/Oct/2000:13:55:36 -0700] "GET /apache_pb.gif HTTP/1.0" 200 2326 "http://www.example.com/start.html" "Mozilla/4.08 [en] (Win98; I ;Nav)"
static COMBINED_LOG_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^(?P<remote_addr>[\d.]+) - (?P<remote_user>\S+) \[(?P<time_local>[^\]]+)\] "(?P<request>[^"]+)" (?P<status>\d+) (?P<body_bytes_sent>\d+) "(?P<http_referer>[^"]+)" "(?P<http_user_agent>[^"]+)"$"#,
    )
    .expect("combined log format pattern is valid")
});

/// Parse one Combined Log Format line.
///
/// The ingestion timestamp is recorded on the event; `time_local` is
/// captured into the field map but not parsed.
pub fn parse(line: &str, timestamp: f64) -> Option<ParsedEvent> {
    let caps = COMBINED_LOG_PATTERN.captures(line)?;

    let mut fields: HashMap<String, String> = COMBINED_LOG_PATTERN
        .capture_names()
        .flatten()
        .filter_map(|name| caps.name(name).map(|m| (name.to_string(), m.as_str().to_string())))
        .collect();

    // "GET /index.html HTTP/1.0" -> method, path, protocol
    if let Some(request) = fields.get("request").cloned() {
        let mut parts = request.split_whitespace();
        if let (Some(method), Some(path)) = (parts.next(), parts.next()) {
            fields.insert("method".to_string(), method.to_string());
            fields.insert("path".to_string(), path.to_string());
            fields.insert(
                "protocol".to_string(),
                parts.next().unwrap_or_default().to_string(),
            );
        }
    }

    Some(
        ParsedEvent::new(EventSource::Nginx, timestamp, line, EventKind::Access)
            .with_fields(fields),
    )
}
