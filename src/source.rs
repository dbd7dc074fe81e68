use async_trait::async_trait;
use ethers::{
    providers::{Http, Middleware, Provider},
    types::{Address, Filter, Log, H256, U256},
    utils::keccak256,
};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::LeaderboardError;
use crate::pacing::Pacer;
use crate::types::TransferEvent;

pub const TRANSFER_SIGNATURE: &str = "Transfer(address,address,uint256)";

/// topic0 of every ERC-20 `Transfer` log.
pub fn transfer_topic() -> H256 {
    H256::from(keccak256(TRANSFER_SIGNATURE.as_bytes()))
}

// ============================================================================
// UPSTREAM PROVIDER
// ============================================================================

/// The two chain reads the leaderboard needs.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LogProvider: Send + Sync {
    async fn head_block(&self) -> Result<u64, LeaderboardError>;

    /// Raw `Transfer` logs emitted by `token` in `[from_block, to_block]`.
    async fn transfer_logs(
        &self,
        token: Address,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<Log>, LeaderboardError>;
}

#[async_trait]
impl LogProvider for Provider<Http> {
    async fn head_block(&self) -> Result<u64, LeaderboardError> {
        self.get_block_number()
            .await
            .map(|number| number.as_u64())
            .map_err(|e| LeaderboardError::Upstream(format!("eth_blockNumber failed: {}", e)))
    }

    async fn transfer_logs(
        &self,
        token: Address,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<Log>, LeaderboardError> {
        let filter = Filter::new()
            .address(token)
            .topic0(transfer_topic())
            .from_block(from_block)
            .to_block(to_block);

        self.get_logs(&filter).await.map_err(|e| {
            LeaderboardError::Upstream(format!(
                "eth_getLogs {}..={} failed: {}",
                from_block, to_block, e
            ))
        })
    }
}

// ============================================================================
// LOG DECODING
// ============================================================================

fn describe(log: &Log) -> String {
    match (log.transaction_hash, log.log_index) {
        (Some(tx), Some(index)) => format!("{:?}#{}", tx, index),
        (Some(tx), None) => format!("{:?}", tx),
        _ => "<unknown log>".to_string(),
    }
}

fn topic_address(log: &Log, topic: &H256) -> Result<Address, LeaderboardError> {
    let bytes = topic.as_bytes();
    if bytes[..12].iter().any(|b| *b != 0) {
        return Err(LeaderboardError::Decode(format!(
            "{}: topic {:?} is not a left-padded address",
            describe(log),
            topic
        )));
    }
    Ok(Address::from_slice(&bytes[12..]))
}

/// Decodes one raw log into a [`TransferEvent`], rejecting anything that is
/// not exactly an ERC-20 `Transfer(address indexed, address indexed, uint256)`.
pub fn decode_transfer(log: &Log) -> Result<TransferEvent, LeaderboardError> {
    if log.topics.len() != 3 {
        return Err(LeaderboardError::Decode(format!(
            "{}: expected 3 topics, found {}",
            describe(log),
            log.topics.len()
        )));
    }

    if log.topics[0] != transfer_topic() {
        return Err(LeaderboardError::Decode(format!(
            "{}: unexpected event signature {:?}",
            describe(log),
            log.topics[0]
        )));
    }

    if log.data.len() != 32 {
        return Err(LeaderboardError::Decode(format!(
            "{}: expected 32 bytes of data, found {}",
            describe(log),
            log.data.len()
        )));
    }

    let block_height = log
        .block_number
        .ok_or_else(|| LeaderboardError::Decode(format!("{}: missing block number", describe(log))))?
        .as_u64();

    Ok(TransferEvent {
        from: topic_address(log, &log.topics[1])?,
        to: topic_address(log, &log.topics[2])?,
        amount: U256::from_big_endian(&log.data),
        block_height,
    })
}

// ============================================================================
// CHUNKED FETCH
// ============================================================================

/// Splits `[from_block, to_block]` into inclusive sub-ranges of at most
/// `chunk_size` blocks, in increasing order.
pub fn chunk_ranges(from_block: u64, to_block: u64, chunk_size: u64) -> Vec<(u64, u64)> {
    let mut ranges = Vec::new();
    if chunk_size == 0 || from_block > to_block {
        return ranges;
    }

    let mut start = from_block;
    loop {
        let end = start.saturating_add(chunk_size - 1).min(to_block);
        ranges.push((start, end));
        if end == to_block {
            break;
        }
        start = end + 1;
    }

    ranges
}

pub struct ChainLogSource {
    provider: Arc<dyn LogProvider>,
    pacer: Arc<dyn Pacer>,
    token: Address,
    chunk_size: u64,
}

impl ChainLogSource {
    pub fn new(
        provider: Arc<dyn LogProvider>,
        pacer: Arc<dyn Pacer>,
        token: Address,
        chunk_size: u64,
    ) -> Self {
        Self {
            provider,
            pacer,
            token,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn token(&self) -> Address {
        self.token
    }

    pub async fn head_block(&self) -> Result<u64, LeaderboardError> {
        self.provider.head_block().await
    }

    /// Fetches and decodes every transfer in `[from_block, to_block]`.
    ///
    /// Chunks are queried one at a time with the pacer between them. Any
    /// upstream failure or undecodable log fails the whole fetch.
    pub async fn fetch_transfers(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<TransferEvent>, LeaderboardError> {
        let ranges = chunk_ranges(from_block, to_block, self.chunk_size);
        let mut events = Vec::new();

        info!(
            "[LOG-SOURCE] Fetching transfers for {:?} over blocks {} to {} ({} chunks)",
            self.token,
            from_block,
            to_block,
            ranges.len()
        );

        for (i, (start, end)) in ranges.iter().copied().enumerate() {
            if i > 0 {
                self.pacer.pause().await;
            }

            debug!("[LOG-SOURCE] Processing blocks {} to {}...", start, end);
            let logs = self.provider.transfer_logs(self.token, start, end).await?;

            let mut chunk = logs
                .iter()
                .map(decode_transfer)
                .collect::<Result<Vec<_>, _>>()?;
            chunk.sort_by_key(|event| event.block_height);

            debug!(
                "[LOG-SOURCE] Blocks {} to {}: {} transfers",
                start,
                end,
                chunk.len()
            );
            events.extend(chunk);
        }

        info!("[LOG-SOURCE] Retrieved {} transfers", events.len());
        Ok(events)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::pacing::NoPacing;
    use async_trait::async_trait;
    use ethers::types::{Bytes, U64};
    use mockall::{predicate::eq, Sequence};
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub(crate) fn address_topic(address: Address) -> H256 {
        H256::from(address)
    }

    pub(crate) fn transfer_log(from: Address, to: Address, amount: u64, block: u64) -> Log {
        let mut data = [0u8; 32];
        U256::from(amount).to_big_endian(&mut data);
        Log {
            topics: vec![transfer_topic(), address_topic(from), address_topic(to)],
            data: Bytes::from(data.to_vec()),
            block_number: Some(U64::from(block)),
            ..Default::default()
        }
    }

    fn token() -> Address {
        Address::repeat_byte(0x16)
    }

    #[derive(Default)]
    struct CountingPacer {
        pauses: AtomicUsize,
    }

    #[async_trait]
    impl Pacer for CountingPacer {
        async fn pause(&self) {
            self.pauses.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn transfer_topic_matches_erc20() {
        assert_eq!(
            format!("{:?}", transfer_topic()),
            "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
        );
    }

    #[test]
    fn chunk_ranges_cover_window_inclusively() {
        assert_eq!(
            chunk_ranges(100, 120, 10),
            vec![(100, 109), (110, 119), (120, 120)]
        );
        assert_eq!(chunk_ranges(0, 9, 10), vec![(0, 9)]);
        assert_eq!(chunk_ranges(5, 5, 5000), vec![(5, 5)]);
    }

    #[test]
    fn chunk_ranges_empty_when_window_inverted() {
        assert!(chunk_ranges(10, 9, 5).is_empty());
    }

    #[test]
    fn chunk_ranges_do_not_overflow_at_chain_end() {
        let ranges = chunk_ranges(u64::MAX - 3, u64::MAX, 3);
        assert_eq!(ranges, vec![(u64::MAX - 3, u64::MAX - 1), (u64::MAX, u64::MAX)]);
    }

    #[test]
    fn decode_reads_addresses_amount_and_block() {
        let from = Address::repeat_byte(0xaa);
        let to = Address::repeat_byte(0xbb);
        let event = decode_transfer(&transfer_log(from, to, 40, 77)).unwrap();

        assert_eq!(
            event,
            TransferEvent {
                from,
                to,
                amount: U256::from(40),
                block_height: 77,
            }
        );
    }

    #[test]
    fn decode_rejects_wrong_topic_count() {
        let mut log = transfer_log(Address::zero(), Address::repeat_byte(1), 1, 1);
        log.topics.pop();
        assert!(matches!(decode_transfer(&log), Err(LeaderboardError::Decode(_))));
    }

    #[test]
    fn decode_rejects_foreign_event() {
        let mut log = transfer_log(Address::zero(), Address::repeat_byte(1), 1, 1);
        log.topics[0] = H256::from(keccak256("Approval(address,address,uint256)"));
        assert!(matches!(decode_transfer(&log), Err(LeaderboardError::Decode(_))));
    }

    #[test]
    fn decode_rejects_short_data() {
        let mut log = transfer_log(Address::zero(), Address::repeat_byte(1), 1, 1);
        log.data = Bytes::from(vec![0u8; 31]);
        assert!(matches!(decode_transfer(&log), Err(LeaderboardError::Decode(_))));
    }

    #[test]
    fn decode_rejects_dirty_address_topic() {
        let mut log = transfer_log(Address::zero(), Address::repeat_byte(1), 1, 1);
        log.topics[2] = H256::repeat_byte(0xff);
        assert!(matches!(decode_transfer(&log), Err(LeaderboardError::Decode(_))));
    }

    #[test]
    fn decode_rejects_pending_log() {
        let mut log = transfer_log(Address::zero(), Address::repeat_byte(1), 1, 1);
        log.block_number = None;
        assert!(matches!(decode_transfer(&log), Err(LeaderboardError::Decode(_))));
    }

    #[tokio::test]
    async fn fetch_queries_chunks_in_order_and_paces_between() {
        let a = Address::repeat_byte(0xa1);
        let b = Address::repeat_byte(0xb2);
        let mut provider = MockLogProvider::new();
        let mut seq = Sequence::new();

        provider
            .expect_transfer_logs()
            .with(eq(token()), eq(0u64), eq(4u64))
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_, _, _| Ok(vec![transfer_log(Address::zero(), a, 100, 3)]));
        provider
            .expect_transfer_logs()
            .with(eq(token()), eq(5u64), eq(9u64))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(vec![]));
        provider
            .expect_transfer_logs()
            .with(eq(token()), eq(10u64), eq(11u64))
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_, _, _| Ok(vec![transfer_log(a, b, 40, 11)]));

        let pacer = Arc::new(CountingPacer::default());
        let source = ChainLogSource::new(Arc::new(provider), pacer.clone(), token(), 5);

        let events = source.fetch_transfers(0, 11).await.unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].block_height, 3);
        assert_eq!(events[1].block_height, 11);
        assert_eq!(pacer.pauses.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn fetch_fails_whole_window_on_upstream_error() {
        let mut provider = MockLogProvider::new();
        provider
            .expect_transfer_logs()
            .with(eq(token()), eq(0u64), eq(9u64))
            .returning(|_, _, _| {
                Ok(vec![transfer_log(Address::zero(), Address::repeat_byte(1), 1, 2)])
            });
        provider
            .expect_transfer_logs()
            .with(eq(token()), eq(10u64), eq(19u64))
            .returning(|_, _, _| Err(LeaderboardError::Upstream("429 too many requests".into())));

        let source = ChainLogSource::new(Arc::new(provider), Arc::new(NoPacing), token(), 10);
        let result = source.fetch_transfers(0, 19).await;

        assert!(matches!(result, Err(LeaderboardError::Upstream(_))));
    }

    #[tokio::test]
    async fn fetch_fails_on_any_undecodable_log() {
        let mut provider = MockLogProvider::new();
        provider.expect_transfer_logs().returning(|_, _, _| {
            let mut bad = transfer_log(Address::zero(), Address::repeat_byte(1), 1, 2);
            bad.data = Bytes::default();
            Ok(vec![
                transfer_log(Address::zero(), Address::repeat_byte(1), 1, 1),
                bad,
            ])
        });

        let source = ChainLogSource::new(Arc::new(provider), Arc::new(NoPacing), token(), 100);
        let result = source.fetch_transfers(0, 50).await;

        assert!(matches!(result, Err(LeaderboardError::Decode(_))));
    }

    #[tokio::test]
    async fn fetch_of_empty_window_makes_no_calls() {
        let mut provider = MockLogProvider::new();
        provider.expect_transfer_logs().never();

        let source = ChainLogSource::new(Arc::new(provider), Arc::new(NoPacing), token(), 100);
        assert!(source.fetch_transfers(10, 9).await.unwrap().is_empty());
    }
}
