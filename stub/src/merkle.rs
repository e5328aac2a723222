//! Sorted-key binary Merkle tree for state and storage roots.
//!
//! Entries are kept in a `BTreeMap`, hashed as domain-separated leaves in
//! key order and combined pairwise; an odd node is promoted unchanged. The
//! root depends only on the set of entries, never on insertion order. The
//! empty tree has the zero root.

use std::collections::BTreeMap;

use libevm_interop::{Hash, ProofNode};

const LEAF_PREFIX: u8 = 0x00;
const INTERNAL_PREFIX: u8 = 0x01;

pub fn hash_bytes(data: &[u8]) -> Hash {
    Hash(*blake3::hash(data).as_bytes())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MerkleTree {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MerkleTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &[u8], value: &[u8]) {
        self.entries.insert(key.to_vec(), value.to_vec());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn root(&self) -> Hash {
        root_of(&self.leaves())
    }

    /// Inclusion proof of `key`, `None` if absent.
    pub fn prove(&self, key: &[u8]) -> Option<Vec<ProofNode>> {
        let index = self.entries.keys().position(|k| k.as_slice() == key)?;
        Some(proof_path(&self.leaves(), index))
    }

    fn leaves(&self) -> Vec<Hash> {
        self.entries.iter().map(|(k, v)| hash_leaf(k, v)).collect()
    }
}

/// Check an inclusion proof of `key => value` against `root`.
pub fn verify(root: &Hash, key: &[u8], value: &[u8], proof: &[ProofNode]) -> bool {
    let mut current = hash_leaf(key, value);
    for node in proof {
        current = if node.left {
            hash_internal(&current, &node.sibling)
        } else {
            hash_internal(&node.sibling, &current)
        };
    }
    current == *root
}

fn hash_leaf(key: &[u8], value: &[u8]) -> Hash {
    let mut data = Vec::with_capacity(1 + 4 + key.len() + value.len());
    data.push(LEAF_PREFIX);
    data.extend_from_slice(&(key.len() as u32).to_le_bytes());
    data.extend_from_slice(key);
    data.extend_from_slice(value);
    hash_bytes(&data)
}

fn hash_internal(left: &Hash, right: &Hash) -> Hash {
    let mut data = [0u8; 65];
    data[0] = INTERNAL_PREFIX;
    data[1..33].copy_from_slice(&left.0);
    data[33..].copy_from_slice(&right.0);
    hash_bytes(&data)
}

fn next_level(level: &[Hash]) -> Vec<Hash> {
    level
        .chunks(2)
        .map(|pair| match pair {
            [left, right] => hash_internal(left, right),
            _ => pair[0],
        })
        .collect()
}

fn root_of(leaves: &[Hash]) -> Hash {
    if leaves.is_empty() {
        return Hash::ZERO;
    }
    let mut level = leaves.to_vec();
    while level.len() > 1 {
        level = next_level(&level);
    }
    level[0]
}

fn proof_path(leaves: &[Hash], mut index: usize) -> Vec<ProofNode> {
    let mut proof = Vec::new();
    let mut level = leaves.to_vec();
    while level.len() > 1 {
        let sibling = index ^ 1;
        if sibling < level.len() {
            proof.push(ProofNode {
                sibling: level[sibling],
                left: index % 2 == 0,
            });
        }
        level = next_level(&level);
        index /= 2;
    }
    proof
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_root_is_zero() {
        assert_eq!(MerkleTree::new().root(), Hash::ZERO);
    }

    #[test]
    fn test_root_independent_of_insertion_order() {
        let mut a = MerkleTree::new();
        a.insert(b"x", b"1");
        a.insert(b"y", b"2");
        a.insert(b"z", b"3");
        let mut b = MerkleTree::new();
        b.insert(b"z", b"3");
        b.insert(b"x", b"1");
        b.insert(b"y", b"2");
        assert_eq!(a.root(), b.root());
    }

    #[test]
    fn test_root_changes_with_value() {
        let mut tree = MerkleTree::new();
        tree.insert(b"k", b"1");
        let before = tree.root();
        tree.insert(b"k", b"2");
        assert_ne!(tree.root(), before);
    }

    #[test]
    fn test_proofs_verify() {
        let mut tree = MerkleTree::new();
        for i in 0u8..7 {
            tree.insert(&[i], &[i * 2]);
        }
        let root = tree.root();
        for i in 0u8..7 {
            let proof = tree.prove(&[i]).unwrap();
            assert!(verify(&root, &[i], &[i * 2], &proof));
            assert!(!verify(&root, &[i], &[i * 2 + 1], &proof));
        }
        assert!(tree.prove(b"missing").is_none());
    }

    #[test]
    fn test_single_entry_proof_is_empty() {
        let mut tree = MerkleTree::new();
        tree.insert(b"only", b"v");
        let proof = tree.prove(b"only").unwrap();
        assert!(proof.is_empty());
        assert!(verify(&tree.root(), b"only", b"v", &proof));
    }
}
