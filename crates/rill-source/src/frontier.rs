//! Resolved-ts frontier across multiple feed spans.
//!
//! A puller watching several spans only learns "nothing below X is
//! coming" once *every* span has advanced past X. `ResolvedFrontier`
//! tracks per-span resolved timestamps and reports the combined
//! minimum each time it moves.

use rill_model::Ts;

/// Min-combiner over per-span resolved timestamps.
#[derive(Debug)]
pub struct ResolvedFrontier {
    spans: Vec<Option<Ts>>,
    combined: Option<Ts>,
}

impl ResolvedFrontier {
    /// Creates a frontier over `span_count` spans, all unresolved.
    #[must_use]
    pub fn new(span_count: usize) -> Self {
        Self {
            spans: vec![None; span_count],
            combined: None,
        }
    }

    /// Records that span `index` resolved up to `ts`.
    ///
    /// Returns the new combined frontier when it advanced, which
    /// happens only once every span has reported at least once.
    /// Regressions on a single span are ignored.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn advance(&mut self, index: usize, ts: Ts) -> Option<Ts> {
        let slot = &mut self.spans[index];
        if slot.is_some_and(|current| ts <= current) {
            return None;
        }
        *slot = Some(ts);

        let mut min: Option<Ts> = None;
        for span in &self.spans {
            let resolved = (*span)?;
            min = Some(min.map_or(resolved, |m: Ts| m.min(resolved)));
        }
        if min > self.combined {
            self.combined = min;
            min
        } else {
            None
        }
    }

    /// The combined frontier, if every span has reported.
    #[must_use]
    pub fn combined(&self) -> Option<Ts> {
        self.combined
    }
}
