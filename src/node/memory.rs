// src/node/memory.rs
use crate::config::MiningPolicy;
use crate::node::{BlockProcessor, ChainState, TemplateSource, TxSource};
use crate::types::{
    Block, BlockHash, BlockHeader, BlockTemplate, EXTRA_DATA_SIZE, PayoutAddress, Transaction,
    TxOut,
};
use crate::utils::error::{self, ErrorCode, MinerError, ProcessBlockError, RuleError};
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Configuration of the in-memory node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Payout addresses, handed out round-robin
    #[serde(default = "default_mining_addresses")]
    pub mining_addresses: Vec<String>,

    /// Compact target every block must meet
    #[serde(default = "default_bits")]
    pub bits: u32,

    /// Coinbase subsidy in atoms
    #[serde(default = "default_subsidy")]
    pub subsidy: i64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            mining_addresses: default_mining_addresses(),
            bits: default_bits(),
            subsidy: default_subsidy(),
        }
    }
}

fn default_mining_addresses() -> Vec<String> {
    vec!["RsMinerDefaultPayout".into()]
}

fn default_bits() -> u32 {
    0x207f_ffff
}

fn default_subsidy() -> i64 {
    5_000_000_000
}

/// Best block of the in-memory chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainTip {
    /// Hash of the tip
    pub hash: BlockHash,
    /// Height of the tip
    pub height: u32,
    /// Timestamp of the tip
    pub timestamp: u32,
}

/// A single-chain node held in memory
///
/// Blocks are accepted only when they extend the tip and meet the
/// configured target. Blocks on a known non-tip parent are rejected; blocks
/// on an unknown parent are reported as orphans.
pub struct MemoryNode {
    config: NodeConfig,
    tip: ArcSwap<ChainTip>,
    blocks: Mutex<HashMap<BlockHash, Block>>,
    accepted: Mutex<Vec<BlockHash>>,
    mempool_updated: Mutex<SystemTime>,
    address_cursor: AtomicUsize,
    submissions: AtomicU64,
}

impl MemoryNode {
    /// Creates a node whose chain holds only a genesis block
    pub fn new(config: NodeConfig) -> Self {
        let genesis = Block {
            header: BlockHeader {
                version: 1,
                prev_block: BlockHash::ZERO,
                merkle_root: BlockHash::ZERO,
                timestamp: now_secs(),
                bits: config.bits,
                nonce: 0,
                height: 0,
                extra_data: [0u8; EXTRA_DATA_SIZE],
                pow_solution: Vec::new(),
            },
            transactions: Vec::new(),
        };
        let tip = ChainTip {
            hash: genesis.hash(),
            height: 0,
            timestamp: genesis.header.timestamp,
        };

        let mut blocks = HashMap::new();
        blocks.insert(tip.hash, genesis);

        MemoryNode {
            config,
            tip: ArcSwap::from_pointee(tip),
            blocks: Mutex::new(blocks),
            accepted: Mutex::new(Vec::new()),
            mempool_updated: Mutex::new(SystemTime::now()),
            address_cursor: AtomicUsize::new(0),
            submissions: AtomicU64::new(0),
        }
    }

    /// Current best block
    pub fn tip(&self) -> ChainTip {
        **self.tip.load()
    }

    /// Hashes of the blocks accepted so far, oldest first
    pub fn accepted_blocks(&self) -> Vec<BlockHash> {
        self.accepted.lock().clone()
    }

    /// Number of blocks handed to [`BlockProcessor::process_block`]
    pub fn submissions(&self) -> u64 {
        self.submissions.load(Ordering::SeqCst)
    }

    /// Looks up a stored block
    pub fn block(&self, hash: &BlockHash) -> Option<Block> {
        self.blocks.lock().get(hash).cloned()
    }

    /// Marks the mempool as changed, as a new transaction would
    pub fn touch_mempool(&self) {
        let mut updated = self.mempool_updated.lock();
        let now = SystemTime::now();
        // The stamp must change even on coarse clocks.
        *updated = if now > *updated {
            now
        } else {
            *updated + Duration::from_micros(1)
        };
    }

    fn accept(&self, block: &Block, hash: BlockHash) {
        self.blocks.lock().insert(hash, block.clone());
        self.accepted.lock().push(hash);
        self.tip.store(Arc::new(ChainTip {
            hash,
            height: block.height(),
            timestamp: block.header.timestamp,
        }));
    }
}

impl TemplateSource for MemoryNode {
    fn mining_address(&self) -> Result<PayoutAddress, MinerError> {
        let addresses = &self.config.mining_addresses;
        if addresses.is_empty() {
            return Err(MinerError::AddressError(
                "no mining addresses configured".into(),
            ));
        }
        let idx = self.address_cursor.fetch_add(1, Ordering::Relaxed) % addresses.len();
        Ok(PayoutAddress(addresses[idx].clone()))
    }

    fn new_block_template(
        &self,
        policy: &MiningPolicy,
        pay_to: &PayoutAddress,
    ) -> Result<Option<BlockTemplate>, MinerError> {
        if policy.block_max_size < policy.block_min_size {
            return Err(MinerError::TemplateError(format!(
                "block max size {} is below min size {}",
                policy.block_max_size, policy.block_min_size
            )));
        }

        let tip = self.tip();
        let height = tip.height + 1;

        let mut commitment = pay_to.0.as_bytes().to_vec();
        commitment.extend_from_slice(&height.to_le_bytes());

        let coinbase = Transaction {
            outputs: vec![TxOut {
                value: self.config.subsidy,
                pk_script: pay_to.0.as_bytes().to_vec(),
            }],
        };

        let block = Block {
            header: BlockHeader {
                version: 1,
                prev_block: tip.hash,
                merkle_root: BlockHash::sha256d(&commitment),
                timestamp: now_secs().max(tip.timestamp.saturating_add(1)),
                bits: self.config.bits,
                nonce: 0,
                height,
                extra_data: [0u8; EXTRA_DATA_SIZE],
                pow_solution: Vec::new(),
            },
            transactions: vec![coinbase],
        };

        Ok(Some(BlockTemplate { block, fees: 0 }))
    }
}

impl BlockProcessor for MemoryNode {
    fn process_block(&self, block: &Block) -> Result<bool, ProcessBlockError> {
        self.submissions.fetch_add(1, Ordering::SeqCst);

        let hash = block.hash();
        let prev = block.header.prev_block;
        {
            let blocks = self.blocks.lock();
            if blocks.contains_key(&hash) {
                return Err(RuleError::new(
                    ErrorCode::DuplicateBlock,
                    format!("already have block {}", hash),
                )
                .into());
            }
            if !blocks.contains_key(&prev) {
                return Ok(true);
            }
        }

        if prev != self.tip().hash {
            return Err(error::not_best_parent(&prev));
        }
        if block.header.bits != self.config.bits {
            return Err(RuleError::new(
                ErrorCode::UnexpectedDifficulty,
                format!("block bits {:08x}, expected {:08x}", block.header.bits, self.config.bits),
            )
            .into());
        }

        let target = crate::types::compact_to_big(block.header.bits).ok_or_else(|| {
            RuleError::new(ErrorCode::UnexpectedDifficulty, "negative target")
        })?;
        if hash.to_big() > target {
            return Err(RuleError::new(
                ErrorCode::HighHash,
                format!("block hash {} is higher than target", hash),
            )
            .into());
        }

        self.accept(block, hash);
        Ok(false)
    }
}

impl ChainState for MemoryNode {
    fn best_block(&self) -> (BlockHash, u32) {
        let tip = self.tip();
        (tip.hash, tip.height)
    }

    fn update_block_time(&self, block: &mut Block) -> Result<(), MinerError> {
        let parent_time = self
            .blocks
            .lock()
            .get(&block.header.prev_block)
            .map(|parent| parent.header.timestamp)
            .ok_or_else(|| {
                MinerError::TimeUpdateError(format!(
                    "unknown parent {}",
                    block.header.prev_block
                ))
            })?;
        block.header.timestamp = now_secs().max(parent_time.saturating_add(1));
        Ok(())
    }
}

impl TxSource for MemoryNode {
    fn last_updated(&self) -> SystemTime {
        *self.mempool_updated.lock()
    }
}

fn now_secs() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u32::try_from(d.as_secs()).unwrap_or(u32::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn easy_node() -> MemoryNode {
        MemoryNode::new(NodeConfig {
            bits: 0x217f_ffff,
            ..NodeConfig::default()
        })
    }

    fn template(node: &MemoryNode) -> Block {
        let addr = node.mining_address().unwrap();
        node.new_block_template(&MiningPolicy::default(), &addr)
            .unwrap()
            .unwrap()
            .block
    }

    #[test]
    fn template_extends_tip() {
        let node = easy_node();
        let block = template(&node);
        assert_eq!(block.header.prev_block, node.tip().hash);
        assert_eq!(block.height(), 1);
        assert_eq!(block.coinbase_value(), default_subsidy());
    }

    #[test]
    fn accepts_block_on_tip_and_moves_tip() {
        let node = easy_node();
        let block = template(&node);
        assert!(!node.process_block(&block).unwrap());
        assert_eq!(node.tip().hash, block.hash());
        assert_eq!(node.accepted_blocks(), vec![block.hash()]);

        let dup = node.process_block(&block).unwrap_err();
        assert_eq!(dup.rule_code(), Some(ErrorCode::DuplicateBlock));
    }

    #[test]
    fn stale_parent_is_rejected_and_unknown_parent_is_orphan() {
        let node = easy_node();
        let first = template(&node);
        let mut second = first.clone();
        second.header.nonce = 1;
        node.process_block(&first).unwrap();

        let err = node.process_block(&second).unwrap_err();
        assert_eq!(err.rule_code(), Some(ErrorCode::PrevBlockNotBest));

        let mut orphan = template(&node);
        orphan.header.prev_block = BlockHash([0xaa; 32]);
        assert!(node.process_block(&orphan).unwrap());
        assert_eq!(node.submissions(), 3);
    }

    #[test]
    fn timestamps_clamp_at_the_end_of_time() {
        let node = easy_node();
        let mut last = template(&node);
        last.header.timestamp = u32::MAX;
        node.process_block(&last).unwrap();

        let mut child = template(&node);
        assert_eq!(child.header.timestamp, u32::MAX);
        node.update_block_time(&mut child).unwrap();
        assert_eq!(child.header.timestamp, u32::MAX);
    }

    #[test]
    fn high_hash_is_rejected() {
        let node = MemoryNode::new(NodeConfig {
            bits: 0x0100_0001,
            ..NodeConfig::default()
        });
        let block = template(&node);
        let err = node.process_block(&block).unwrap_err();
        assert_eq!(err.rule_code(), Some(ErrorCode::HighHash));
    }

    #[test]
    fn touch_mempool_always_changes_stamp() {
        let node = easy_node();
        let before = node.last_updated();
        node.touch_mempool();
        assert!(node.last_updated() > before);
    }

    #[test]
    fn addresses_rotate_and_empty_list_fails() {
        let node = MemoryNode::new(NodeConfig {
            mining_addresses: vec!["a".into(), "b".into()],
            ..NodeConfig::default()
        });
        assert_eq!(node.mining_address().unwrap().0, "a");
        assert_eq!(node.mining_address().unwrap().0, "b");
        assert_eq!(node.mining_address().unwrap().0, "a");

        let empty = MemoryNode::new(NodeConfig {
            mining_addresses: vec![],
            ..NodeConfig::default()
        });
        assert!(matches!(
            empty.mining_address(),
            Err(MinerError::AddressError(_))
        ));
    }

    #[test]
    fn bad_policy_fails_template() {
        let node = easy_node();
        let policy = MiningPolicy {
            block_min_size: 10,
            block_max_size: 5,
            block_priority_size: 0,
        };
        let addr = node.mining_address().unwrap();
        assert!(matches!(
            node.new_block_template(&policy, &addr),
            Err(MinerError::TemplateError(_))
        ));
    }
}
