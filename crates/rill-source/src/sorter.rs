//! Commit-ts sort stage.
//!
//! Regions race each other, so the raw feed interleaves commit
//! timestamps arbitrarily between resolved markers. The sorter buffers
//! entries and releases them in non-decreasing `crts` order: when a
//! resolved marker at `ts` arrives, every buffered entry at or below
//! `ts` is emitted (ties in arrival order), then the marker itself.
//! Markers that do not advance the stream's resolved frontier are
//! dropped.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use tokio::sync::mpsc;

use crate::feed::RawKvEntry;
use crate::SourceError;

struct Buffered {
    entry: RawKvEntry,
    seq: u64,
}

impl PartialEq for Buffered {
    fn eq(&self, other: &Self) -> bool {
        self.entry.crts == other.entry.crts && self.seq == other.seq
    }
}

impl Eq for Buffered {}

impl PartialOrd for Buffered {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Buffered {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.entry.crts, self.seq).cmp(&(other.entry.crts, other.seq))
    }
}

/// Runs the sort stage until the input closes or the consumer drops.
///
/// Entries still buffered when the input closes are discarded; they
/// were never covered by a resolved marker and the stream gives no
/// ordering promise for them.
///
/// # Errors
///
/// Currently infallible; the `Result` keeps the signature aligned with
/// the other long-running stages so callers can join them uniformly.
pub async fn run_sorter(
    mut input: mpsc::Receiver<RawKvEntry>,
    output: mpsc::Sender<RawKvEntry>,
) -> Result<(), SourceError> {
    let mut heap: BinaryHeap<Reverse<Buffered>> = BinaryHeap::new();
    let mut seq: u64 = 0;
    let mut resolved_frontier: u64 = 0;

    while let Some(entry) = input.recv().await {
        if entry.is_resolved() {
            if entry.crts <= resolved_frontier {
                continue;
            }
            resolved_frontier = entry.crts;
            while let Some(Reverse(head)) = heap.peek() {
                if head.entry.crts > resolved_frontier {
                    break;
                }
                let Reverse(head) = heap.pop().expect("peeked above");
                if output.send(head.entry).await.is_err() {
                    return Ok(());
                }
            }
            if output.send(entry).await.is_err() {
                return Ok(());
            }
        } else {
            heap.push(Reverse(Buffered { entry, seq }));
            seq += 1;
        }
    }
    if !heap.is_empty() {
        tracing::debug!(
            discarded = heap.len(),
            "sorter input closed with unresolved entries buffered"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::OpType;

    fn entry(crts: u64, key: &[u8]) -> RawKvEntry {
        RawKvEntry {
            op_type: OpType::Put,
            key: key.to_vec(),
            value: Vec::new(),
            start_ts: crts.saturating_sub(1),
            crts,
        }
    }

    async fn drive(events: Vec<RawKvEntry>) -> Vec<RawKvEntry> {
        let (in_tx, in_rx) = mpsc::channel(16);
        let (out_tx, mut out_rx) = mpsc::channel(16);
        let sorter = tokio::spawn(run_sorter(in_rx, out_tx));
        for event in events {
            in_tx.send(event).await.unwrap();
        }
        drop(in_tx);
        sorter.await.unwrap().unwrap();
        let mut got = Vec::new();
        while let Some(e) = out_rx.recv().await {
            got.push(e);
        }
        got
    }

    #[tokio::test]
    async fn reorders_up_to_resolved_marker() {
        let got = drive(vec![
            entry(5, b"b"),
            entry(3, b"a"),
            entry(9, b"c"),
            RawKvEntry::resolved(6),
        ])
        .await;
        let crts: Vec<u64> = got.iter().map(|e| e.crts).collect();
        assert_eq!(crts, vec![3, 5, 6]);
        assert!(got[2].is_resolved());
        // Entry at 9 stays buffered; no marker covered it.
    }

    #[tokio::test]
    async fn equal_crts_keeps_arrival_order() {
        let got = drive(vec![
            entry(4, b"first"),
            entry(4, b"second"),
            RawKvEntry::resolved(4),
        ])
        .await;
        assert_eq!(got[0].key, b"first");
        assert_eq!(got[1].key, b"second");
    }

    #[tokio::test]
    async fn stale_markers_are_dropped() {
        let got = drive(vec![
            RawKvEntry::resolved(10),
            RawKvEntry::resolved(8),
            RawKvEntry::resolved(12),
        ])
        .await;
        let crts: Vec<u64> = got.iter().map(|e| e.crts).collect();
        assert_eq!(crts, vec![10, 12]);
    }

    #[tokio::test]
    async fn successive_windows_stay_ordered() {
        let got = drive(vec![
            entry(2, b"a"),
            RawKvEntry::resolved(3),
            entry(7, b"c"),
            entry(5, b"b"),
            RawKvEntry::resolved(7),
        ])
        .await;
        let crts: Vec<u64> = got.iter().map(|e| e.crts).collect();
        assert_eq!(crts, vec![2, 3, 5, 7, 7]);
    }
}
