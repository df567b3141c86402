//! Shared types for the indexing pipeline.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::codec;
use crate::error::CodecError;
use crate::serde_helpers::{self, flex_u64, hex_bytes, hex_root};

/// A 32-byte digest.
pub type Root = [u8; 32];

// ─── Header ──────────────────────────────────────────────────────────────────

/// A Lean block header.
///
/// Root fields are carried as received: a remote endpoint may hand us a
/// root of the wrong length, and it is the processor's job to reject it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    #[serde(with = "flex_u64")]
    pub slot: u64,
    #[serde(with = "flex_u64")]
    pub proposer_index: u64,
    #[serde(with = "hex_bytes")]
    pub parent_root: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub state_root: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub body_root: Vec<u8>,
}

impl Header {
    /// The header's canonical identity: the Merkle root of its fields.
    pub fn canonical_root(&self) -> Result<Root, CodecError> {
        codec::merkle_root(self)
    }

    /// Canonical root as `0x`-prefixed hex.
    pub fn root_hex(&self) -> Result<String, CodecError> {
        self.canonical_root().map(|r| serde_helpers::to_hex(&r))
    }
}

// ─── Checkpoint ──────────────────────────────────────────────────────────────

/// A justified or finalized point in consensus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    #[serde(with = "hex_root")]
    pub root: Root,
    pub slot: u64,
}

impl Checkpoint {
    /// Build a checkpoint pointing at `header`.
    pub fn from_header(header: &Header) -> Result<Self, CodecError> {
        Ok(Self {
            root: header.canonical_root()?,
            slot: header.slot,
        })
    }
}

// ─── BlockId ─────────────────────────────────────────────────────────────────

/// Identifier accepted by the remote header endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockId {
    Head,
    Genesis,
    Justified,
    Finalized,
    Slot(u64),
    Root(Vec<u8>),
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Head => write!(f, "head"),
            Self::Genesis => write!(f, "genesis"),
            Self::Justified => write!(f, "justified"),
            Self::Finalized => write!(f, "finalized"),
            Self::Slot(slot) => write!(f, "{slot}"),
            Self::Root(root) => write!(f, "{}", serde_helpers::to_hex(root)),
        }
    }
}

impl FromStr for BlockId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "head" => Ok(Self::Head),
            "genesis" => Ok(Self::Genesis),
            "justified" => Ok(Self::Justified),
            "finalized" => Ok(Self::Finalized),
            _ if s.starts_with("0x") => serde_helpers::parse_hex(s)
                .map(Self::Root)
                .map_err(|e| format!("invalid root '{s}': {e}")),
            _ => s
                .parse::<u64>()
                .map(Self::Slot)
                .map_err(|_| format!("invalid block id '{s}'")),
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
