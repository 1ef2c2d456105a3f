//! Line-oriented hashtag counter driving a [`MaxFibHeap`].
//!
//! Input lines are `#<label> <count>` (add `count` to the label), a bare
//! integer `k` (print the `k` most frequent labels) or `stop`.

use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::str::FromStr;

use log::{debug, warn};

use crate::{HeapError, MaxFibHeap, Node, NodeKey, Priority};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Upsert { label: String, count: Priority },
    Query(usize),
    Stop,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix('#') {
            let mut parts = rest.split_whitespace();
            let label = parts.next().ok_or("missing hashtag label")?;
            let count = parts.next().ok_or("missing hashtag count")?;
            if parts.next().is_some() {
                return Err(format!("unexpected trailing input after {:?}", count));
            }
            let count = count
                .parse()
                .map_err(|e| format!("invalid count {:?}: {}", count, e))?;
            Ok(Self::Upsert {
                label: label.to_owned(),
                count,
            })
        } else if line.eq_ignore_ascii_case("stop") {
            Ok(Self::Stop)
        } else {
            line.parse()
                .map(Self::Query)
                .map_err(|e| format!("invalid query {:?}: {}", line, e))
        }
    }
}

#[derive(Debug)]
pub enum CounterError {
    Io(io::Error),
    Read { line: usize, source: io::Error },
    Parse { line: usize, reason: String },
    Overflow { label: String },
    Heap(HeapError),
}

impl std::fmt::Display for CounterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "i/o error: {}", e),
            Self::Read { line, source } => write!(f, "line {}: {}", line, source),
            Self::Parse { line, reason } => write!(f, "line {}: {}", line, reason),
            Self::Overflow { label } => write!(f, "count for #{} overflows", label),
            Self::Heap(e) => write!(f, "heap error: {}", e),
        }
    }
}

impl std::error::Error for CounterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) | Self::Read { source: e, .. } => Some(e),
            Self::Heap(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for CounterError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<HeapError> for CounterError {
    fn from(e: HeapError) -> Self {
        Self::Heap(e)
    }
}

#[derive(Debug, Default)]
pub struct HashtagCounter {
    heap: MaxFibHeap<String>,
    lookup: HashMap<String, NodeKey>,
}

impl HashtagCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Current count of `label`, if it was ever seen.
    pub fn count(&self, label: &str) -> Option<Priority> {
        self.lookup
            .get(label)
            .and_then(|&key| self.heap.priority(key).ok())
    }

    pub fn heap(&self) -> &MaxFibHeap<String> {
        &self.heap
    }

    pub fn upsert(&mut self, label: &str, count: Priority) -> Result<(), CounterError> {
        let Some(&key) = self.lookup.get(label) else {
            let key = self.heap.insert(Node::new(count, label.to_owned()));
            self.lookup.insert(label.to_owned(), key);
            return Ok(());
        };
        if count == 0 {
            return Ok(());
        }
        let current = self.heap.priority(key)?;
        let total = current
            .checked_add(count)
            .ok_or_else(|| CounterError::Overflow {
                label: label.to_owned(),
            })?;
        self.heap.increase_key(key, total)?;
        Ok(())
    }

    /// Returns the `k` highest-count labels, leaving every count in place.
    pub fn top(&mut self, k: usize) -> Result<Vec<String>, CounterError> {
        if k > self.heap.len() {
            warn!("query for {} labels, only {} known", k, self.heap.len());
        }
        let k = k.min(self.heap.len());
        let mut extracted = Vec::with_capacity(k);
        for _ in 0..k {
            extracted.push(self.heap.extract_max()?);
        }
        let labels = extracted.iter().map(|node| node.data().clone()).collect();
        for node in extracted {
            let label = node.data().clone();
            let key = self.heap.insert(node);
            self.lookup.insert(label, key);
        }
        Ok(labels)
    }

    /// Applies one command, writing query results to `sink`.
    /// Returns `false` once processing should stop.
    pub fn apply<W: Write>(&mut self, command: Command, sink: &mut W) -> Result<bool, CounterError> {
        match command {
            Command::Upsert { label, count } => self.upsert(&label, count)?,
            Command::Query(k) => {
                let labels = self.top(k)?;
                writeln!(sink, "{}", labels.join(","))?;
            }
            Command::Stop => return Ok(false),
        }
        Ok(true)
    }

    /// Processes `input` line by line until `stop` or end of input.
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, mut sink: W) -> Result<(), CounterError> {
        for (index, line) in input.lines().enumerate() {
            let line = line.map_err(|source| CounterError::Read {
                line: index + 1,
                source,
            })?;
            if line.trim().is_empty() {
                continue;
            }
            let command = line.parse().map_err(|reason| CounterError::Parse {
                line: index + 1,
                reason,
            })?;
            if !self.apply(command, &mut sink)? {
                debug!("stop at line {}", index + 1);
                break;
            }
        }
        sink.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_accumulates() {
        let mut counter = HashtagCounter::new();
        counter.upsert("foo", 3).unwrap();
        counter.upsert("bar", 7).unwrap();
        counter.upsert("foo", 2).unwrap();
        assert_eq!(counter.count("foo"), Some(5));
        assert_eq!(counter.count("bar"), Some(7));
        assert_eq!(counter.count("baz"), None);
        assert_eq!(counter.len(), 2);
    }

    #[test]
    fn zero_count_is_noop() {
        let mut counter = HashtagCounter::new();
        counter.upsert("foo", 3).unwrap();
        counter.upsert("foo", 0).unwrap();
        assert_eq!(counter.count("foo"), Some(3));
    }

    #[test]
    fn overflow_is_reported() {
        let mut counter = HashtagCounter::new();
        counter.upsert("big", Priority::MAX - 1).unwrap();
        assert!(matches!(
            counter.upsert("big", 2),
            Err(CounterError::Overflow { .. })
        ));
        assert_eq!(counter.count("big"), Some(Priority::MAX - 1));
    }

    #[test]
    fn top_keeps_counts_and_handles() {
        let mut counter = HashtagCounter::new();
        for (label, count) in [("a", 1), ("b", 5), ("c", 3)] {
            counter.upsert(label, count).unwrap();
        }
        assert_eq!(counter.top(2).unwrap(), vec!["b", "c"]);
        assert_eq!(counter.top(2).unwrap(), vec!["b", "c"]);
        counter.upsert("a", 10).unwrap();
        assert_eq!(counter.top(1).unwrap(), vec!["a"]);
        assert_eq!(counter.count("a"), Some(11));
    }

    #[test]
    fn invalid_utf8_reports_line() {
        let input: &[u8] = b"#a 1\n#b \xff\xfe\n3\n";
        let mut counter = HashtagCounter::new();
        let err = counter.run(input, io::sink()).unwrap_err();
        assert!(matches!(err, CounterError::Read { line: 2, .. }));
        assert!(err.to_string().starts_with("line 2: "));
        assert_eq!(counter.count("a"), Some(1));
    }

    #[test]
    fn top_clamps_to_known_labels() {
        let mut counter = HashtagCounter::new();
        counter.upsert("only", 1).unwrap();
        assert_eq!(counter.top(5).unwrap(), vec!["only"]);
        assert_eq!(counter.len(), 1);
    }
}
