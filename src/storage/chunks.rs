use std::ops::Range;

use serde::Serialize;

use super::documents::{AggregateDocument, MemoSave};

pub fn encoded_len<T: Serialize + ?Sized>(value: &T) -> Result<usize, serde_json::Error> {
    Ok(serde_json::to_vec(value)?.len())
}

/// Greedy split of `doc.memos` into contiguous ranges whose chunk documents
/// stay within `ceiling` bytes. A memo that cannot fit even alone still gets
/// a chunk of its own. Always yields at least one range so folders are kept
/// when there are no memos.
pub fn partition(
    doc: AggregateDocument<'_>,
    ceiling: usize,
) -> Result<Vec<Range<usize>>, serde_json::Error> {
    // Compact JSON arrays cost the element bytes plus one comma between
    // elements, so a chunk's size follows from its empty envelope.
    let first_envelope = encoded_len(&doc.chunk(&[], true))?;
    let rest_envelope = encoded_len(&doc.chunk(&[], false))?;

    let mut ranges = Vec::new();
    let mut start = 0usize;
    let mut size = first_envelope;
    for (index, memo) in doc.memos.iter().enumerate() {
        let memo_len = memo_len(memo)?;
        let separator = usize::from(index > start);
        if index > start && size + separator + memo_len > ceiling {
            ranges.push(start..index);
            start = index;
            size = rest_envelope + memo_len;
        } else {
            size += separator + memo_len;
        }
    }
    ranges.push(start..doc.memos.len());
    Ok(ranges)
}

fn memo_len(memo: &MemoSave) -> Result<usize, serde_json::Error> {
    encoded_len(memo)
}
