//! CSV event reader
//!
//! Streams events from a board log. Malformed lines are dropped, counted
//! and logged; reading continues with the next line.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use contracts::Event;
use tracing::{debug, warn};

use crate::error::Result;
use crate::line::parse_fields;
use crate::stats::IngestionStats;

/// Iterator over the events of one log
pub struct EventReader<R: Read> {
    inner: csv::Reader<R>,
    record: csv::StringRecord,
    stats: IngestionStats,
    source: String,
    done: bool,
}

impl EventReader<File> {
    /// Open a log file
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::from_reader(file, path.display().to_string()))
    }
}

impl<R: Read> EventReader<R> {
    /// Wrap any byte source; `source` labels log messages
    pub fn from_reader(reader: R, source: impl Into<String>) -> Self {
        let inner = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .comment(Some(b'#'))
            .trim(csv::Trim::All)
            .from_reader(reader);
        Self {
            inner,
            record: csv::StringRecord::new(),
            stats: IngestionStats::new(),
            source: source.into(),
            done: false,
        }
    }

    pub fn stats(&self) -> &IngestionStats {
        &self.stats
    }

    /// Drain the reader
    pub fn read_all(mut self) -> (Vec<Event>, IngestionStats) {
        let events: Vec<Event> = self.by_ref().collect();
        debug!(
            source = %self.source,
            events = events.len(),
            malformed = self.stats.malformed,
            "log read"
        );
        (events, self.stats)
    }
}

impl<R: Read> Iterator for EventReader<R> {
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        while !self.done {
            match self.inner.read_record(&mut self.record) {
                Ok(false) => self.done = true,
                Ok(true) => {
                    let line = self.record.position().map(|p| p.line()).unwrap_or(0);
                    let fields: Vec<&str> = self.record.iter().collect();
                    if fields.iter().all(|f| f.is_empty()) {
                        continue;
                    }
                    match parse_fields(&fields, line) {
                        Ok(event) => {
                            self.stats.record_event(&event);
                            return Some(event);
                        }
                        Err(e) => {
                            warn!(source = %self.source, error = %e, "dropping malformed event");
                            self.stats.record_malformed();
                        }
                    }
                }
                Err(e) if e.is_io_error() => {
                    warn!(source = %self.source, error = %e, "log read aborted");
                    self.done = true;
                }
                Err(e) => {
                    warn!(source = %self.source, error = %e, "dropping unreadable line");
                    self.stats.record_malformed();
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::EventType;

    const LOG: &str = "\
# board 0 boot
100,0,3,0,0
120,0,0,2a006d2d1b,0

150,1,1,L,b
garbage
160,1,1,L,u
170,1,9,0,0
";

    #[test]
    fn test_reads_and_counts() {
        let reader = EventReader::from_reader(LOG.as_bytes(), "mem");
        let (events, stats) = reader.read_all();
        assert_eq!(events.len(), 4);
        assert_eq!(stats.malformed, 2);
        assert_eq!(stats.events_of(EventType::Sync), 1);
        assert_eq!(stats.events_of(EventType::Beam), 2);
        assert_eq!(events[1].timestamp(), 120);
    }

    #[test]
    fn test_empty_input() {
        let (events, stats) = EventReader::from_reader("".as_bytes(), "empty").read_all();
        assert!(events.is_empty());
        assert_eq!(stats, IngestionStats::default());
    }
}
