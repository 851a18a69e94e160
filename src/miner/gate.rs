// src/miner/gate.rs
//! Block submission gate
//!
//! Both template construction and block submission run under the
//! submission lock, so a template is never built on a head that a block in
//! flight is about to replace. The methods take a [`SubmissionPermit`] as
//! proof the lock is held.

use crate::config::MiningPolicy;
use crate::miner::locks::SubmissionPermit;
use crate::node::{BlockProcessor, TemplateSource};
use crate::types::{Block, BlockTemplate};
use crate::utils::error::{ErrorCode, MinerError, ProcessBlockError};
use std::sync::Arc;

/// How the consensus processor received a submitted block
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Accepted and connected to the best chain
    Accepted,
    /// Accepted but its parent is not connected
    Orphan,
    /// High hash on a reduced-difficulty network, a clock artifact
    ReducedDifficultyHighHash,
    /// Any other rule violation
    Rejected(ErrorCode),
    /// The processor failed for reasons unrelated to the block
    InternalError,
}

impl SubmitOutcome {
    /// Classifies the processor's answer
    pub fn classify(result: &Result<bool, ProcessBlockError>, reduce_min_difficulty: bool) -> Self {
        match result {
            Ok(false) => SubmitOutcome::Accepted,
            Ok(true) => SubmitOutcome::Orphan,
            Err(ProcessBlockError::Internal(_)) => SubmitOutcome::InternalError,
            Err(ProcessBlockError::Rule(rule)) => {
                if reduce_min_difficulty && rule.code == ErrorCode::HighHash {
                    SubmitOutcome::ReducedDifficultyHighHash
                } else {
                    SubmitOutcome::Rejected(rule.code)
                }
            }
        }
    }
}

/// Serializes template construction and block submission
pub struct SubmissionGate {
    templates: Arc<dyn TemplateSource>,
    processor: Arc<dyn BlockProcessor>,
    reduce_min_difficulty: bool,
}

impl SubmissionGate {
    /// Creates a gate over the node's template builder and block processor
    pub fn new(
        templates: Arc<dyn TemplateSource>,
        processor: Arc<dyn BlockProcessor>,
        reduce_min_difficulty: bool,
    ) -> Self {
        SubmissionGate {
            templates,
            processor,
            reduce_min_difficulty,
        }
    }

    /// Resolves the payout address and builds a template on the current tip
    pub fn build_template(
        &self,
        _permit: &SubmissionPermit<'_>,
        policy: &MiningPolicy,
    ) -> Result<Option<BlockTemplate>, MinerError> {
        let pay_to = self.templates.mining_address()?;
        self.templates.new_block_template(policy, &pay_to)
    }

    /// Submits a solved block using the same rules as blocks from peers
    ///
    /// Returns `true` only when the block was accepted onto the best chain.
    /// Every other outcome is logged here and reported as `false`.
    pub fn submit_block(&self, _permit: &SubmissionPermit<'_>, block: &Block) -> bool {
        let result = self.processor.process_block(block);

        match SubmitOutcome::classify(&result, self.reduce_min_difficulty) {
            SubmitOutcome::Accepted => {
                log::info!(
                    "Block submitted via CPU miner accepted (hash {}, height {}, amount {})",
                    block.hash(),
                    block.height(),
                    block.coinbase_value()
                );
                true
            }
            SubmitOutcome::Orphan => {
                log::error!(
                    "Block submitted via CPU miner is an orphan building on parent {}",
                    block.header.prev_block
                );
                false
            }
            SubmitOutcome::ReducedDifficultyHighHash => {
                log::debug!(
                    "Block submitted via CPU miner rejected because of ReduceMinDifficulty time sync failure: {}",
                    describe(&result)
                );
                false
            }
            SubmitOutcome::Rejected(_) => {
                log::error!("Block submitted via CPU miner rejected: {}", describe(&result));
                false
            }
            SubmitOutcome::InternalError => {
                log::error!(
                    "Unexpected error while processing block submitted via CPU miner: {}",
                    describe(&result)
                );
                false
            }
        }
    }
}

fn describe(result: &Result<bool, ProcessBlockError>) -> String {
    match result {
        Ok(orphan) => format!("orphan={}", orphan),
        Err(e) => e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::miner::locks::LockLadder;
    use crate::node::{MemoryNode, NodeConfig};
    use crate::utils::error::RuleError;

    fn rule(code: ErrorCode) -> Result<bool, ProcessBlockError> {
        Err(RuleError::new(code, "test").into())
    }

    #[test]
    fn classification_follows_processor_answer() {
        assert_eq!(SubmitOutcome::classify(&Ok(false), false), SubmitOutcome::Accepted);
        assert_eq!(SubmitOutcome::classify(&Ok(true), false), SubmitOutcome::Orphan);
        assert_eq!(
            SubmitOutcome::classify(&Err(ProcessBlockError::Internal("io".into())), true),
            SubmitOutcome::InternalError
        );
        assert_eq!(
            SubmitOutcome::classify(&rule(ErrorCode::DuplicateBlock), true),
            SubmitOutcome::Rejected(ErrorCode::DuplicateBlock)
        );
    }

    #[test]
    fn high_hash_is_downgraded_only_on_reduced_difficulty_networks() {
        assert_eq!(
            SubmitOutcome::classify(&rule(ErrorCode::HighHash), true),
            SubmitOutcome::ReducedDifficultyHighHash
        );
        assert_eq!(
            SubmitOutcome::classify(&rule(ErrorCode::HighHash), false),
            SubmitOutcome::Rejected(ErrorCode::HighHash)
        );
    }

    #[test]
    fn submit_reports_acceptance_as_bool() {
        let node = Arc::new(MemoryNode::new(NodeConfig {
            bits: 0x217f_ffff,
            ..NodeConfig::default()
        }));
        let gate = SubmissionGate::new(node.clone(), node.clone(), false);
        let ladder = LockLadder::new(());

        let permit = ladder.submission();
        let template = gate
            .build_template(&permit, &MiningPolicy::default())
            .unwrap()
            .unwrap();
        assert!(gate.submit_block(&permit, &template.block));
        // Same block again is a duplicate.
        assert!(!gate.submit_block(&permit, &template.block));
        assert_eq!(node.submissions(), 2);
    }
}
