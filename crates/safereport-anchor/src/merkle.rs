//! Binary Merkle tree over hex-encoded SHA-256 digests.
//!
//! Construction rules (changing any of them changes every published root):
//!
//!   - leaves are the given hex digests, used as-is
//!   - an interior node is `sha256_hex(left_hex || right_hex)`, hashing the
//!     concatenated lowercase hex strings
//!   - a level with an odd node count pairs its last node with itself
//!   - a single leaf is its own root
//!
//! Every level is kept, so proofs are read straight off the tree.

use sha2::{Digest, Sha256};

use safereport_contracts::{
    anchor::{MerkleProof, ProofStep, SiblingSide},
    error::{EvidenceError, EvidenceResult},
};

/// `sha256_hex(left || right)` over the hex strings.
pub fn node_hash(left: &str, right: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    hex::encode(hasher.finalize())
}

fn is_digest_hex(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleTree {
    /// `levels[0]` are the leaves; the last level holds only the root.
    levels: Vec<Vec<String>>,
}

impl MerkleTree {
    /// Build a tree from lowercase 64-character hex digests.
    pub fn build(leaves: Vec<String>) -> EvidenceResult<Self> {
        if leaves.is_empty() {
            return Err(EvidenceError::Merkle {
                reason: "cannot build a tree from zero leaves".to_string(),
            });
        }
        if let Some(bad) = leaves.iter().position(|l| !is_digest_hex(l)) {
            return Err(EvidenceError::Merkle {
                reason: format!("leaf {bad} is not a lowercase hex SHA-256 digest"),
            });
        }

        let mut levels = vec![leaves];
        while let Some(level) = levels.last().filter(|l| l.len() > 1) {
            let next = level
                .chunks(2)
                .map(|pair| node_hash(&pair[0], pair.get(1).unwrap_or(&pair[0])))
                .collect();
            levels.push(next);
        }
        Ok(Self { levels })
    }

    pub fn root(&self) -> &str {
        self.levels
            .last()
            .and_then(|level| level.first())
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn leaves(&self) -> &[String] {
        &self.levels[0]
    }

    /// Index of the first leaf equal to `leaf`.
    pub fn position(&self, leaf: &str) -> Option<usize> {
        self.leaves().iter().position(|l| l == leaf)
    }

    /// The sibling path for the leaf at `index`.
    ///
    /// An odd trailing node contributes itself as a right sibling, so every
    /// proof replays to the root.
    pub fn generate_proof(&self, index: usize) -> EvidenceResult<MerkleProof> {
        let leaves = self.leaves();
        if index >= leaves.len() {
            return Err(EvidenceError::InvalidRequest {
                reason: format!("leaf index {index} out of range for {} leaves", leaves.len()),
            });
        }

        let mut siblings = Vec::with_capacity(self.levels.len() - 1);
        let mut i = index;
        for level in &self.levels[..self.levels.len() - 1] {
            let step = if i % 2 == 0 {
                ProofStep {
                    hash: level.get(i + 1).unwrap_or(&level[i]).clone(),
                    side: SiblingSide::Right,
                }
            } else {
                ProofStep {
                    hash: level[i - 1].clone(),
                    side: SiblingSide::Left,
                }
            };
            siblings.push(step);
            i /= 2;
        }

        Ok(MerkleProof {
            leaf: leaves[index].clone(),
            root: self.root().to_string(),
            siblings,
        })
    }
}

/// Replay `proof` from its leaf and compare against its root.
pub fn verify_proof(proof: &MerkleProof) -> bool {
    let computed = proof
        .siblings
        .iter()
        .fold(proof.leaf.clone(), |current, step| match step.side {
            SiblingSide::Left => node_hash(&step.hash, &current),
            SiblingSide::Right => node_hash(&current, &step.hash),
        });
    computed == proof.root
}
