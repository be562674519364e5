//! Paginated, read-only inspection of the withdrawal queue.
//!
//! Pagination follows the usual key/offset contract:
//!
//! | Field | Meaning |
//! |-------|---------|
//! | `key` | opaque continuation key from a previous `next_key` |
//! | `offset` | entries to skip; cannot be combined with `key` |
//! | `limit` | page size, `0` means the configured default |
//! | `count_total` | also report the total queue length |
//! | `reverse` | newest entries first |

use super::{QueueError, QueueResult};
use crate::primitives::WithdrawalRequest;
use crate::storage::SettlementStoreReader;
use alloy_primitives::Bytes;
use serde::{Deserialize, Serialize};

/// Pagination defaults for queue inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryConfig {
    /// Page size used when a request asks for `limit = 0`.
    pub default_limit: u64,
    /// Larger requested limits are clamped to this.
    pub max_limit: u64,
}

impl QueryConfig {
    /// Set the default page size.
    pub fn with_default_limit(mut self, limit: u64) -> Self {
        self.default_limit = limit;
        self
    }

    /// Set the page size ceiling.
    pub fn with_max_limit(mut self, limit: u64) -> Self {
        self.max_limit = limit;
        self
    }

    fn effective_limit(&self, requested: u64) -> u64 {
        let limit = if requested == 0 { self.default_limit } else { requested };
        limit.min(self.max_limit).max(1)
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self { default_limit: 100, max_limit: 1_000 }
    }
}

/// A page request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    pub key: Option<Bytes>,
    pub offset: u64,
    pub limit: u64,
    pub count_total: bool,
    pub reverse: bool,
}

impl PageRequest {
    /// First page of `limit` entries.
    pub fn first(limit: u64) -> Self {
        Self { limit, ..Default::default() }
    }

    /// Continue from a previous response's `next_key`.
    pub fn after(key: Bytes, limit: u64) -> Self {
        Self { key: Some(key), limit, ..Default::default() }
    }

    /// Walk newest to oldest.
    pub fn reversed(mut self) -> Self {
        self.reverse = true;
        self
    }

    /// Ask for the total count.
    pub fn with_count_total(mut self) -> Self {
        self.count_total = true;
        self
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResponse<T> {
    pub items: Vec<T>,
    /// Key for the next page, `None` on the last page.
    pub next_key: Option<Bytes>,
    /// Total queue length, when requested.
    pub total: Option<u64>,
}

fn encode_key(sequence: u64) -> Bytes {
    Bytes::copy_from_slice(&sequence.to_be_bytes())
}

fn decode_key(key: &Bytes) -> QueueResult<u64> {
    let raw: [u8; 8] = key
        .as_ref()
        .try_into()
        .map_err(|_| QueueError::InvalidPagination("malformed continuation key"))?;
    Ok(u64::from_be_bytes(raw))
}

/// List queued withdrawals one page at a time.
pub fn query_withdrawal_queue<S>(
    store: &S,
    request: &PageRequest,
    config: &QueryConfig,
) -> QueueResult<PageResponse<WithdrawalRequest>>
where
    S: SettlementStoreReader + ?Sized,
{
    if request.key.is_some() && request.offset > 0 {
        return Err(QueueError::InvalidPagination("key and offset are mutually exclusive"));
    }

    let limit = usize::try_from(config.effective_limit(request.limit))
        .map_err(|_| QueueError::InvalidPagination("limit out of range"))?;
    let offset = usize::try_from(request.offset)
        .map_err(|_| QueueError::InvalidPagination("offset out of range"))?;
    // one extra entry tells us whether another page exists
    let fetch = limit.saturating_add(1);

    let mut items = match (&request.key, request.reverse) {
        (Some(key), reverse) => store.withdrawals_by_sequence(Some(decode_key(key)?), fetch, reverse)?,
        (None, false) => store.withdrawals_from_index(offset, fetch)?,
        (None, true) => store
            .withdrawals_by_sequence(None, offset.saturating_add(fetch), true)?
            .into_iter()
            .skip(offset)
            .collect(),
    };

    let next_key = if items.len() > limit {
        items.pop().map(|next| encode_key(next.sequence))
    } else {
        None
    };

    let total = if request.count_total { Some(store.queue_len()?) } else { None };

    Ok(PageResponse { items, next_key, total })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::WithdrawalKind;
    use crate::queue::enqueue;
    use crate::storage::InMemorySettlementStore;
    use alloy_primitives::Address;

    fn filled(n: u64) -> InMemorySettlementStore {
        let store = InMemorySettlementStore::new();
        for i in 0..n {
            enqueue(&store, Address::repeat_byte(i as u8), i + 1, WithdrawalKind::Full, 1).unwrap();
        }
        store
    }

    fn seqs(page: &PageResponse<WithdrawalRequest>) -> Vec<u64> {
        page.items.iter().map(|w| w.sequence).collect()
    }

    #[test]
    fn test_key_pagination_walks_whole_queue() {
        let store = filled(7);
        let config = QueryConfig::default();

        let first = query_withdrawal_queue(&store, &PageRequest::first(3), &config).unwrap();
        assert_eq!(seqs(&first), vec![0, 1, 2]);

        let second = query_withdrawal_queue(
            &store,
            &PageRequest::after(first.next_key.clone().unwrap(), 3),
            &config,
        )
        .unwrap();
        assert_eq!(seqs(&second), vec![3, 4, 5]);

        let third = query_withdrawal_queue(
            &store,
            &PageRequest::after(second.next_key.clone().unwrap(), 3),
            &config,
        )
        .unwrap();
        assert_eq!(seqs(&third), vec![6]);
        assert!(third.next_key.is_none());
    }

    #[test]
    fn test_reverse_with_offset() {
        let store = filled(5);
        let request = PageRequest { offset: 1, limit: 2, reverse: true, ..Default::default() };

        let page = query_withdrawal_queue(&store, &request, &QueryConfig::default()).unwrap();
        assert_eq!(seqs(&page), vec![3, 2]);
        assert_eq!(page.next_key, Some(encode_key(1)));
    }

    #[test]
    fn test_reverse_key_continuation() {
        let store = filled(5);
        let config = QueryConfig::default();

        let first =
            query_withdrawal_queue(&store, &PageRequest::first(2).reversed(), &config).unwrap();
        assert_eq!(seqs(&first), vec![4, 3]);

        let next = PageRequest::after(first.next_key.unwrap(), 2).reversed();
        let second = query_withdrawal_queue(&store, &next, &config).unwrap();
        assert_eq!(seqs(&second), vec![2, 1]);
    }

    #[test]
    fn test_count_total() {
        let store = filled(4);

        let page = query_withdrawal_queue(
            &store,
            &PageRequest::first(1).with_count_total(),
            &QueryConfig::default(),
        )
        .unwrap();
        assert_eq!(page.total, Some(4));

        let page =
            query_withdrawal_queue(&store, &PageRequest::first(1), &QueryConfig::default())
                .unwrap();
        assert_eq!(page.total, None);
    }

    #[test]
    fn test_limit_defaults_and_clamps() {
        let store = filled(10);
        let config = QueryConfig::default().with_default_limit(4).with_max_limit(6);

        let page = query_withdrawal_queue(&store, &PageRequest::first(0), &config).unwrap();
        assert_eq!(page.items.len(), 4);

        let page = query_withdrawal_queue(&store, &PageRequest::first(50), &config).unwrap();
        assert_eq!(page.items.len(), 6);
    }

    #[test]
    fn test_key_and_offset_rejected() {
        let store = filled(2);
        let request = PageRequest { key: Some(encode_key(0)), offset: 1, ..Default::default() };

        let err = query_withdrawal_queue(&store, &request, &QueryConfig::default()).unwrap_err();
        assert!(matches!(err, QueueError::InvalidPagination(_)));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_malformed_key_rejected() {
        let store = filled(2);
        let request = PageRequest::after(Bytes::from_static(&[1, 2, 3]), 2);

        assert!(matches!(
            query_withdrawal_queue(&store, &request, &QueryConfig::default()),
            Err(QueueError::InvalidPagination(_))
        ));
    }

    #[test]
    fn test_query_has_no_side_effects() {
        let store = filled(3);
        let version = store.version().unwrap();

        query_withdrawal_queue(&store, &PageRequest::first(2), &QueryConfig::default()).unwrap();

        assert_eq!(store.queue_len().unwrap(), 3);
        assert_eq!(store.version().unwrap(), version);
    }
}
