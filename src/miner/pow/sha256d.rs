// src/miner/pow/sha256d.rs
//! Double SHA-256 reference evaluator
//!
//! A candidate is the little-endian round index followed by the first
//! `n / 8` bytes of `sha256d(header || nonce || round)`. Verification
//! recomputes the digest, so a forged or corrupted proof is rejected.

use crate::miner::pow::{Candidate, PowEngine, PowParams, SolutionValidator};
use crate::types::BlockHash;

/// Reference evaluator
///
/// Every call to [`solve`](PowEngine::solve) runs at most `rounds`
/// candidates, each preceded by a null probe.
#[derive(Debug, Clone, Copy)]
pub struct Sha256dEngine {
    rounds: u32,
}

impl Sha256dEngine {
    /// Creates an engine emitting up to `rounds` candidates per nonce
    pub fn new(rounds: u32) -> Self {
        Sha256dEngine {
            rounds: rounds.max(1),
        }
    }

    fn digest_len(params: &PowParams) -> usize {
        ((params.n / 8) as usize).clamp(4, 32)
    }

    fn proof_for(params: &PowParams, header: &[u8], nonce: u32, round: u32) -> Vec<u8> {
        let mut input = Vec::with_capacity(header.len() + 8);
        input.extend_from_slice(header);
        input.extend_from_slice(&nonce.to_le_bytes());
        input.extend_from_slice(&round.to_le_bytes());
        let digest = BlockHash::sha256d(&input);

        let mut proof = round.to_le_bytes().to_vec();
        proof.extend_from_slice(&digest.0[..Self::digest_len(params)]);
        proof
    }
}

impl Default for Sha256dEngine {
    fn default() -> Self {
        Sha256dEngine::new(16)
    }
}

impl PowEngine for Sha256dEngine {
    fn solve(
        &self,
        params: &PowParams,
        header: &[u8],
        nonce: u32,
        validator: &mut dyn SolutionValidator,
    ) {
        for round in 0..self.rounds {
            if validator.validate(None).is_stop() {
                return;
            }

            let candidate = Candidate(Self::proof_for(params, header, nonce, round));
            if validator.validate(Some(&candidate)).is_stop() {
                return;
            }
        }
    }

    fn verify(&self, params: &PowParams, header: &[u8], nonce: u32, proof: &[u8]) -> bool {
        if proof.len() != 4 + Self::digest_len(params) {
            return false;
        }
        let mut round = [0u8; 4];
        round.copy_from_slice(&proof[..4]);
        Self::proof_for(params, header, nonce, u32::from_le_bytes(round)) == proof
    }

    fn extract(&self, _params: &PowParams, candidate: &Candidate) -> Vec<u8> {
        candidate.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::miner::pow::Verdict;

    /// Records what the engine sends and stops after `stop_after` candidates
    struct Recorder {
        probes: usize,
        candidates: Vec<Candidate>,
        stop_after: usize,
    }

    impl SolutionValidator for Recorder {
        fn validate(&mut self, candidate: Option<&Candidate>) -> Verdict {
            match candidate {
                None => {
                    self.probes += 1;
                    Verdict::Continue
                }
                Some(c) => {
                    self.candidates.push(c.clone());
                    if self.candidates.len() >= self.stop_after {
                        Verdict::Solved
                    } else {
                        Verdict::Continue
                    }
                }
            }
        }
    }

    #[test]
    fn probes_before_every_candidate_and_stops_on_verdict() {
        let engine = Sha256dEngine::new(10);
        let mut rec = Recorder {
            probes: 0,
            candidates: Vec::new(),
            stop_after: 3,
        };
        engine.solve(&PowParams::default(), b"header", 7, &mut rec);
        assert_eq!(rec.candidates.len(), 3);
        assert_eq!(rec.probes, 3);
    }

    #[test]
    fn candidates_verify_only_for_their_input() {
        let engine = Sha256dEngine::new(4);
        let params = PowParams::default();
        let mut rec = Recorder {
            probes: 0,
            candidates: Vec::new(),
            stop_after: usize::MAX,
        };
        engine.solve(&params, b"header", 7, &mut rec);
        assert_eq!(rec.candidates.len(), 4);

        for candidate in &rec.candidates {
            let proof = engine.extract(&params, candidate);
            assert!(engine.verify(&params, b"header", 7, &proof));
            assert!(!engine.verify(&params, b"header", 8, &proof));
            assert!(!engine.verify(&params, b"other", 7, &proof));
        }
        assert!(!engine.verify(&params, b"header", 7, &[1, 2, 3]));
    }
}
