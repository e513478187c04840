//! Log line parsers.
//!
//! Parsers are a closed variant set selected per file by a pure path
//! heuristic. Each parser is a stateless function from a raw line plus
//! ingestion timestamp to an optional [`ParsedEvent`]; an unrecognized
//! line is `None`, never an error.

mod generic;
mod nginx;
mod ssh;

use std::path::Path;

use sentinel_core::{EventSource, ParsedEvent};

/// The parser variants Sentinel knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogParser {
    Nginx,
    Ssh,
    Generic,
}

impl LogParser {
    /// Pick the parser for a file by path heuristic: `nginx` anywhere in
    /// the path wins, then the conventional ssh auth logs, else generic.
    pub fn for_path(path: &Path) -> Self {
        let path = path.to_string_lossy();
        if path.contains("nginx") {
            Self::Nginx
        } else if path.contains("auth.log") || path.contains("secure") {
            Self::Ssh
        } else {
            Self::Generic
        }
    }

    /// The source tag events from this parser carry.
    pub fn source(&self) -> EventSource {
        match self {
            Self::Nginx => EventSource::Nginx,
            Self::Ssh => EventSource::Ssh,
            Self::Generic => EventSource::Generic,
        }
    }

    /// Parse one raw line. `timestamp` is the ingestion time in seconds
    /// since the epoch and becomes the event timestamp.
    pub fn parse(&self, line: &str, timestamp: f64) -> Option<ParsedEvent> {
        match self {
            Self::Nginx => nginx::parse(line, timestamp),
            Self::Ssh => ssh::parse(line, timestamp),
            Self::Generic => generic::parse(line, timestamp),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parser_selection() {
        assert_eq!(
            LogParser::for_path(Path::new("/var/log/nginx/access.log")),
            LogParser::Nginx
        );
        assert_eq!(
            LogParser::for_path(Path::new("/var/log/auth.log")),
            LogParser::Ssh
        );
        assert_eq!(
            LogParser::for_path(Path::new("/var/log/secure")),
            LogParser::Ssh
        );
        assert_eq!(
            LogParser::for_path(Path::new("/var/log/syslog")),
            LogParser::Generic
        );
    }

    #[test]
    fn test_selection_is_pure() {
        let path = Path::new("/var/log/nginx/error.log");
        assert_eq!(LogParser::for_path(path), LogParser::for_path(path));
    }
}
