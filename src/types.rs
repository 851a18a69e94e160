// src/types.rs
use crate::utils::error::MinerError;
use clap::ValueEnum;
use num_bigint::BigUint;
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::Write;
use std::str::FromStr;

/// Size of the free-form extra data field in a block header. The first
/// eight bytes carry the extra nonce.
pub const EXTRA_DATA_SIZE: usize = 32;

/// Networks the miner knows how to run on
///
/// The network decides whether discrete generation is allowed, whether
/// reduced-difficulty rejections are expected, and whether the
/// simulation-network throttle applies.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Production network
    #[clap(name = "mainnet")]
    MainNet,

    /// Public test network (reduced minimum difficulty)
    #[clap(name = "testnet")]
    TestNet,

    /// Private simulation network
    #[clap(name = "simnet")]
    SimNet,

    /// Local regression test network
    #[clap(name = "regnet")]
    RegNet,
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::MainNet => write!(f, "mainnet"),
            Network::TestNet => write!(f, "testnet"),
            Network::SimNet => write!(f, "simnet"),
            Network::RegNet => write!(f, "regnet"),
        }
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mainnet" | "main" => Ok(Network::MainNet),
            "testnet" | "test" => Ok(Network::TestNet),
            "simnet" | "sim" => Ok(Network::SimNet),
            "regnet" | "regtest" => Ok(Network::RegNet),
            _ => Err(format!("Unknown network: {}", s)),
        }
    }
}

/// 32-byte block identifier, stored in hashing order
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockHash(pub [u8; 32]);

impl BlockHash {
    /// The all-zero hash used as the parent of a genesis block
    pub const ZERO: BlockHash = BlockHash([0u8; 32]);

    /// Double SHA-256 of `data`
    pub fn sha256d(data: &[u8]) -> Self {
        let first = Sha256::digest(data);
        BlockHash(Sha256::digest(first).into())
    }

    /// The hash interpreted as an unsigned little-endian integer
    pub fn to_big(&self) -> BigUint {
        BigUint::from_bytes_le(&self.0)
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut reversed = self.0;
        reversed.reverse();
        write!(f, "{}", hex::encode(reversed))
    }
}

impl fmt::Debug for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockHash({})", self)
    }
}

impl FromStr for BlockHash {
    type Err = MinerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes: [u8; 32] = hex::decode(s)?
            .try_into()
            .map_err(|_| MinerError::InputError(format!("block hash must be 32 bytes: {}", s)))?;
        bytes.reverse();
        Ok(BlockHash(bytes))
    }
}

/// Header of a block as the miner sees it
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockHeader {
    /// Block version
    pub version: i32,
    /// Hash of the parent block
    pub prev_block: BlockHash,
    /// Commitment to the block's transactions
    pub merkle_root: BlockHash,
    /// Unix timestamp in seconds
    pub timestamp: u32,
    /// Compact encoding of the proof-of-work target
    pub bits: u32,
    /// Primary nonce swept by the workers
    pub nonce: u32,
    /// Height of this block
    pub height: u32,
    /// Free-form data, the first eight bytes are the extra nonce
    pub extra_data: [u8; EXTRA_DATA_SIZE],
    /// Proof produced by the proof-of-work evaluator
    pub pow_solution: Vec<u8>,
}

impl BlockHeader {
    /// Writes the extra nonce (little-endian) into the extra data field
    pub fn set_extra_nonce(&mut self, extra_nonce: u64) {
        self.extra_data[..8].copy_from_slice(&extra_nonce.to_le_bytes());
    }

    /// Reads back the extra nonce from the extra data field
    pub fn extra_nonce(&self) -> u64 {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&self.extra_data[..8]);
        u64::from_le_bytes(bytes)
    }

    /// Serializes everything the proof-of-work evaluator commits to: the
    /// full header minus the nonce (passed separately) and the solution
    pub fn serialize_for_pow(&self) -> Result<Vec<u8>, MinerError> {
        let mut buf = Vec::with_capacity(120);
        self.write_fields(&mut buf, false)
            .map_err(|e| MinerError::HeaderError(e.to_string()))?;
        Ok(buf)
    }

    /// Identifying hash of the header, solution included
    pub fn block_hash(&self) -> BlockHash {
        let mut hasher = Sha256::new();
        // Writing into a hasher cannot fail.
        let _ = self.write_fields(&mut hasher, true);
        BlockHash(Sha256::digest(hasher.finalize()).into())
    }

    fn write_fields<W: Write>(&self, w: &mut W, with_solution: bool) -> std::io::Result<()> {
        w.write_all(&self.version.to_le_bytes())?;
        w.write_all(&self.prev_block.0)?;
        w.write_all(&self.merkle_root.0)?;
        w.write_all(&self.timestamp.to_le_bytes())?;
        w.write_all(&self.bits.to_le_bytes())?;
        w.write_all(&self.height.to_le_bytes())?;
        w.write_all(&self.extra_data)?;
        if with_solution {
            w.write_all(&self.nonce.to_le_bytes())?;
            // usize never exceeds 64 bits.
            w.write_all(&(self.pow_solution.len() as u64).to_le_bytes())?;
            w.write_all(&self.pow_solution)?;
        }
        Ok(())
    }
}

/// Transaction output, only the value matters to the miner
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxOut {
    /// Amount in atoms
    pub value: i64,
    /// Locking script
    pub pk_script: Vec<u8>,
}

/// Transaction as carried in a block
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Transaction {
    /// Outputs of the transaction
    pub outputs: Vec<TxOut>,
}

/// A full block
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    /// The header being solved
    pub header: BlockHeader,
    /// Transactions, coinbase first
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Hash of the block header
    pub fn hash(&self) -> BlockHash {
        self.header.block_hash()
    }

    /// Height of the block
    pub fn height(&self) -> u32 {
        self.header.height
    }

    /// Sum of the coinbase outputs, zero for a block without transactions
    pub fn coinbase_value(&self) -> i64 {
        self.transactions
            .first()
            .map(|tx| tx.outputs.iter().map(|out| out.value).sum())
            .unwrap_or(0)
    }
}

/// An unsolved block produced by the template builder
#[derive(Clone, Debug)]
pub struct BlockTemplate {
    /// The block to solve
    pub block: Block,
    /// Total fees of the included transactions
    pub fees: i64,
}

/// Destination of the coinbase reward
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PayoutAddress(pub String);

impl fmt::Display for PayoutAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Decodes a compact target into an unsigned integer
///
/// Returns `None` when the sign bit is set on a non-zero mantissa; such a
/// target can never be met.
pub fn compact_to_big(bits: u32) -> Option<BigUint> {
    let mantissa = bits & 0x007f_ffff;
    let negative = bits & 0x0080_0000 != 0;
    let exponent = bits >> 24;

    let target = if exponent <= 3 {
        BigUint::from(mantissa >> (8 * (3 - exponent)))
    } else {
        BigUint::from(mantissa) << (8 * (exponent - 3) as usize)
    };

    if negative && !target.is_zero() {
        None
    } else {
        Some(target)
    }
}

/// Encodes an unsigned integer as a compact target, losing precision
/// beyond the three most significant bytes
pub fn big_to_compact(n: &BigUint) -> u32 {
    if n.is_zero() {
        return 0;
    }

    let bytes = n.to_bytes_be();
    let mut exponent = bytes.len() as u32;
    let mut mantissa = bytes
        .iter()
        .take(3)
        .fold(0u32, |acc, b| (acc << 8) | u32::from(*b));
    if exponent < 3 {
        mantissa <<= 8 * (3 - exponent);
    }

    if mantissa & 0x0080_0000 != 0 {
        mantissa >>= 8;
        exponent += 1;
    }

    (exponent << 24) | mantissa
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;
    use proptest::prelude::*;

    fn header() -> BlockHeader {
        BlockHeader {
            version: 1,
            prev_block: BlockHash([7u8; 32]),
            merkle_root: BlockHash([9u8; 32]),
            timestamp: 1_700_000_000,
            bits: 0x207f_ffff,
            nonce: 0,
            height: 12,
            extra_data: [0u8; EXTRA_DATA_SIZE],
            pow_solution: Vec::new(),
        }
    }

    #[test]
    fn compact_decodes_known_targets() {
        // Bitcoin genesis difficulty.
        let target = compact_to_big(0x1d00_ffff).unwrap();
        assert_eq!(target, BigUint::from(0xffffu32) << 208usize);

        // Small exponents shift the mantissa down.
        assert_eq!(compact_to_big(0x0112_3456).unwrap(), BigUint::from(0x12u32));
        assert_eq!(compact_to_big(0x0200_8000).unwrap(), BigUint::from(0x80u32));

        // Sign bit on a non-zero mantissa is never a valid target.
        assert!(compact_to_big(0x0480_0001).is_none());
        assert_eq!(compact_to_big(0x0080_0000).unwrap(), BigUint::zero());
    }

    #[test]
    fn compact_encodes_genesis_target() {
        let target = BigUint::from(0xffffu32) << 208usize;
        assert_eq!(big_to_compact(&target), 0x1d00_ffff);
        assert_eq!(big_to_compact(&BigUint::zero()), 0);
        assert_eq!(big_to_compact(&BigUint::from(0x80u32)), 0x0200_8000);
    }

    proptest! {
        #[test]
        fn compact_never_exceeds_input(value in any::<u128>()) {
            let n = BigUint::from(value);
            let decoded = compact_to_big(big_to_compact(&n)).unwrap();
            prop_assert!(decoded <= n);
        }
    }

    #[test]
    fn extra_nonce_lives_in_extra_data() {
        let mut h = header();
        h.set_extra_nonce(0x0102_0304_0506_0708);
        assert_eq!(h.extra_nonce(), 0x0102_0304_0506_0708);
        assert_eq!(h.extra_data[0], 0x08);
    }

    #[test]
    fn pow_bytes_ignore_nonce_and_solution() {
        let mut h = header();
        let before = h.serialize_for_pow().unwrap();
        h.nonce = 42;
        h.pow_solution = vec![1, 2, 3];
        assert_eq!(before, h.serialize_for_pow().unwrap());
    }

    #[test]
    fn block_hash_commits_to_solution() {
        let mut h = header();
        let before = h.block_hash();
        h.pow_solution = vec![1];
        assert_ne!(before, h.block_hash());
    }

    #[test]
    fn block_hash_covers_large_solutions() {
        let mut h = header();
        h.nonce = 9;
        h.pow_solution = vec![0xab; 70_000];

        let mut preimage = h.serialize_for_pow().unwrap();
        preimage.extend_from_slice(&9u32.to_le_bytes());
        preimage.extend_from_slice(&70_000u64.to_le_bytes());
        preimage.extend_from_slice(&h.pow_solution);
        assert_eq!(h.block_hash(), BlockHash::sha256d(&preimage));

        // The last byte of the solution still counts.
        let before = h.block_hash();
        h.pow_solution[69_999] = 0;
        assert_ne!(before, h.block_hash());
    }

    #[test]
    fn sha256d_matches_known_digest() {
        let hash = BlockHash::sha256d(b"");
        assert_eq!(
            hash.0,
            hex!("5df6e0e2761359d30a8275058e299fcc0381534545f55cf43e41983f5d4c9456")
        );
        // Displayed byte-reversed.
        assert!(hash.to_string().starts_with("56944c5d"));
    }

    #[test]
    fn block_hash_round_trips_through_display() {
        let hash = header().block_hash();
        let parsed: BlockHash = hash.to_string().parse().unwrap();
        assert_eq!(parsed, hash);
    }

    #[test]
    fn coinbase_value_sums_first_transaction() {
        let block = Block {
            header: header(),
            transactions: vec![
                Transaction {
                    outputs: vec![
                        TxOut { value: 30, pk_script: vec![] },
                        TxOut { value: 12, pk_script: vec![] },
                    ],
                },
                Transaction {
                    outputs: vec![TxOut { value: 1000, pk_script: vec![] }],
                },
            ],
        };
        assert_eq!(block.coinbase_value(), 42);
    }

    #[test]
    fn network_parses_aliases() {
        assert_eq!("regtest".parse::<Network>().unwrap(), Network::RegNet);
        assert_eq!(Network::SimNet.to_string(), "simnet");
        assert!("moon".parse::<Network>().is_err());
    }
}
