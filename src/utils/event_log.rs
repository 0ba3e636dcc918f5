//! Bounded ring buffer of debug events, rendered into service dumps.

use std::collections::VecDeque;
use std::fmt::{self, Write as _};
use std::time::Duration;

use tracing::trace;

#[derive(Debug)]
pub struct EventLog {
    name: &'static str,
    capacity: usize,
    entries: VecDeque<Entry>,
}

#[derive(Debug)]
struct Entry {
    time: Duration,
    event: String,
    /// Times the same event was added back to back.
    count: u32,
}

impl EventLog {
    pub fn new(name: &'static str, capacity: usize) -> Self {
        Self {
            name,
            capacity: capacity.max(1),
            entries: VecDeque::new(),
        }
    }

    pub fn add(&mut self, time: Duration, event: impl Into<String>) {
        let event = event.into();
        trace!("{}: {event}", self.name);

        if let Some(last) = self.entries.back_mut() {
            if last.event == event {
                last.count += 1;
                last.time = time;
                return;
            }
        }

        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(Entry {
            time,
            event,
            count: 1,
        });
    }

    /// Adds `event` followed by a formatted extra value.
    pub fn add_with(&mut self, time: Duration, event: &str, extra: impl fmt::Display) {
        let mut line = String::from(event);
        let _ = write!(line, ": {extra}");
        self.add(time, line);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dump(&self, prefix: &str, out: &mut impl fmt::Write) -> fmt::Result {
        writeln!(out, "{prefix}{} ({} entries):", self.name, self.entries.len())?;
        let Some(first) = self.entries.front() else {
            return Ok(());
        };
        for entry in &self.entries {
            let offset = entry.time.saturating_sub(first.time).as_millis();
            write!(out, "{prefix}  +{offset}ms {}", entry.event)?;
            if entry.count > 1 {
                write!(out, " & {} similar events", entry.count - 1)?;
            }
            writeln!(out)?;
        }
        Ok(())
    }
}
