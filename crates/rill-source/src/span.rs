//! Key spans.

/// A half-open byte range `[start, end)` of source keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Span {
    /// Inclusive start key.
    pub start: Vec<u8>,
    /// Exclusive end key.
    pub end: Vec<u8>,
}

impl Span {
    /// Builds a span from explicit bounds.
    #[must_use]
    pub fn new(start: impl Into<Vec<u8>>, end: impl Into<Vec<u8>>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }

    /// The span covering every key under `prefix`.
    ///
    /// The end bound is the prefix with its last byte incremented;
    /// an all-`0xff` prefix extends to the keyspace end.
    #[must_use]
    pub fn from_prefix(prefix: impl Into<Vec<u8>>) -> Self {
        let start: Vec<u8> = prefix.into();
        let mut end = start.clone();
        while let Some(last) = end.last_mut() {
            if *last < u8::MAX {
                *last += 1;
                return Self { start, end };
            }
            end.pop();
        }
        Self {
            start,
            end: Vec::new(),
        }
    }

    /// The metadata span carrying general DDL job history.
    #[must_use]
    pub fn ddl() -> Self {
        Self::from_prefix(&b"m/ddl-job"[..])
    }

    /// The metadata span carrying index-creation DDL jobs, which the
    /// source journals separately.
    #[must_use]
    pub fn add_index_ddl() -> Self {
        Self::from_prefix(&b"m/ddl-add-index-job"[..])
    }

    /// Whether `key` falls inside the span.
    #[must_use]
    pub fn contains(&self, key: &[u8]) -> bool {
        key >= self.start.as_slice() && (self.end.is_empty() || key < self.end.as_slice())
    }
}
