// src/node/mod.rs
//! Boundary with the rest of the node
//!
//! The miner does not build templates, validate blocks or track the mempool
//! itself. It reaches those through the traits below:
//! - [`TemplateSource`]: payout address and block template construction
//! - [`BlockProcessor`]: consensus processing of a solved block
//! - [`ChainState`]: best chain tip and timestamp maintenance
//! - [`TxSource`]: when the transaction pool last changed

/// In-memory node
///
/// A single-chain node kept entirely in memory. Used by the binary and by
/// the tests to drive the miner end to end.
pub mod memory;

use crate::config::MiningPolicy;
use crate::miner::pow::PowEngine;
use crate::types::{Block, BlockHash, BlockTemplate, PayoutAddress};
use crate::utils::error::{MinerError, ProcessBlockError};
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

pub use memory::{MemoryNode, NodeConfig};

/// Builds block templates
pub trait TemplateSource: Send + Sync {
    /// Address the next coinbase should pay to
    fn mining_address(&self) -> Result<PayoutAddress, MinerError>;

    /// Builds a template on the current tip
    ///
    /// `Ok(None)` means there is not enough data to build one yet and the
    /// caller should simply try again.
    fn new_block_template(
        &self,
        policy: &MiningPolicy,
        pay_to: &PayoutAddress,
    ) -> Result<Option<BlockTemplate>, MinerError>;
}

/// Runs a block through consensus
pub trait BlockProcessor: Send + Sync {
    /// Processes a block, returning whether it was accepted as an orphan
    fn process_block(&self, block: &Block) -> Result<bool, ProcessBlockError>;
}

/// Read access to the best chain
pub trait ChainState: Send + Sync {
    /// Hash and height of the best block
    fn best_block(&self) -> (BlockHash, u32);

    /// Moves the block timestamp forward to the current time, respecting
    /// the consensus bounds for its parent
    fn update_block_time(&self, block: &mut Block) -> Result<(), MinerError>;
}

/// Transaction pool change tracking
pub trait TxSource: Send + Sync {
    /// When the pool last changed
    fn last_updated(&self) -> SystemTime;
}

/// Everything the miner needs from the outside world
#[derive(Clone)]
pub struct Collaborators {
    /// Template builder
    pub templates: Arc<dyn TemplateSource>,
    /// Consensus processor
    pub processor: Arc<dyn BlockProcessor>,
    /// Chain view
    pub chain: Arc<dyn ChainState>,
    /// Mempool view
    pub tx_source: Arc<dyn TxSource>,
    /// Proof-of-work evaluator
    pub pow: Arc<dyn PowEngine>,
}

impl Collaborators {
    /// Uses one node object for all chain-facing roles
    pub fn from_node<N>(node: Arc<N>, pow: Arc<dyn PowEngine>) -> Self
    where
        N: TemplateSource + BlockProcessor + ChainState + TxSource + 'static,
    {
        Collaborators {
            templates: node.clone(),
            processor: node.clone(),
            chain: node.clone(),
            tx_source: node,
            pow,
        }
    }
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
