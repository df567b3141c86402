//! Fixed-layout header codec and Merkle root.
//!
//! Layout (112 bytes, integers little-endian):
//!
//! ```text
//! [0..8)     slot
//! [8..16)    proposer_index
//! [16..48)   parent_root
//! [48..80)   state_root
//! [80..112)  body_root
//! ```
//!
//! The Merkle root zero-pads each scalar to a 32-byte leaf, pads the five
//! leaves to eight with zero leaves and hashes pairwise with SHA-256. This
//! matches the SSZ `hash_tree_root` of a five-field fixed container.

use sha2::{Digest, Sha256};

use crate::error::CodecError;
use crate::types::{Header, Root};

/// Encoded size of a header.
pub const HEADER_SIZE: usize = 112;

/// Size of every root field.
pub const ROOT_SIZE: usize = 32;

const LEAF_COUNT: usize = 8;

/// Serialize a header into its fixed 112-byte form.
pub fn encode(header: &Header) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::with_capacity(HEADER_SIZE);
    out.extend_from_slice(&header.slot.to_le_bytes());
    out.extend_from_slice(&header.proposer_index.to_le_bytes());
    for (field, root) in root_fields(header) {
        out.extend_from_slice(checked_root(field, root)?);
    }
    Ok(out)
}

/// Deserialize a header from exactly [`HEADER_SIZE`] bytes.
pub fn decode(bytes: &[u8]) -> Result<Header, CodecError> {
    if bytes.len() != HEADER_SIZE {
        return Err(CodecError::SizeMismatch {
            expected: HEADER_SIZE,
            actual: bytes.len(),
        });
    }
    let (slot, rest) = bytes.split_at(8);
    let (proposer, roots) = rest.split_at(8);
    Ok(Header {
        slot: read_u64(slot),
        proposer_index: read_u64(proposer),
        parent_root: roots[0..32].to_vec(),
        state_root: roots[32..64].to_vec(),
        body_root: roots[64..96].to_vec(),
    })
}

/// Compute the canonical Merkle root of a header.
pub fn merkle_root(header: &Header) -> Result<Root, CodecError> {
    let mut leaves = [[0u8; 32]; LEAF_COUNT];
    leaves[0][..8].copy_from_slice(&header.slot.to_le_bytes());
    leaves[1][..8].copy_from_slice(&header.proposer_index.to_le_bytes());
    for (i, (field, root)) in root_fields(header).into_iter().enumerate() {
        leaves[i + 2].copy_from_slice(checked_root(field, root)?);
    }
    Ok(merkleize(&leaves))
}

fn root_fields(header: &Header) -> [(&'static str, &[u8]); 3] {
    [
        ("parent_root", header.parent_root.as_slice()),
        ("state_root", header.state_root.as_slice()),
        ("body_root", header.body_root.as_slice()),
    ]
}

fn checked_root<'a>(field: &'static str, root: &'a [u8]) -> Result<&'a [u8], CodecError> {
    if root.len() != ROOT_SIZE {
        return Err(CodecError::FieldLength {
            field,
            expected: ROOT_SIZE,
            actual: root.len(),
        });
    }
    Ok(root)
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    u64::from_le_bytes(buf)
}

/// Hash a power-of-two layer of leaves down to a single root.
fn merkleize(leaves: &[Root]) -> Root {
    let mut layer = leaves.to_vec();
    while layer.len() > 1 {
        layer = layer
            .chunks(2)
            .map(|pair| {
                let mut hasher = Sha256::new();
                hasher.update(pair[0]);
                hasher.update(pair[1]);
                hasher.finalize().into()
            })
            .collect();
    }
    layer[0]
}
