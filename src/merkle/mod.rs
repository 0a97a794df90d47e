//! Layered binary Merkle commitments with multi-index proofs.
//!
//! A [Tree] is built over an ordered sequence of leaf byte strings: leaves
//! are hashed individually and interior nodes hash the concatenation of
//! their children. Odd fan-in is permitted at any layer; a lone node at the
//! end of a layer is promoted by hashing it alone, and its missing right
//! sibling is represented in proofs by an explicit absence marker.
//!
//! Multi-index proofs cover an arbitrary set of leaf positions with a single
//! flat sibling stream: the prover and verifier walk the tree in lock-step,
//! scanning the known set left-to-right at each layer, so no per-sibling
//! position information is needed on the wire.
//!
//! Leaf and interior hashing fan out across worker threads in chunks sized
//! to the thread pool; layers are serially dependent and are never hashed
//! concurrently with each other. Each worker owns a private hasher.

use crate::{Digest, Error, Hasher};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// A layered binary hash tree over a sequence of leaves.
#[derive(Clone)]
pub struct Tree<H: Hasher> {
    /// `layers[0]` holds the leaf digests; the last layer holds the root.
    layers: Vec<Vec<H::Digest>>,
}

impl<H: Hasher> Tree<H> {
    /// Build a tree over the given leaves. An empty input yields an empty
    /// tree whose [root](Self::root) is `None`.
    pub fn build<T: AsRef<[u8]> + Sync>(leaves: &[T]) -> Self {
        if leaves.is_empty() {
            return Self { layers: Vec::new() };
        }
        let mut layers = vec![hash_leaves::<H, T>(leaves)];
        while layers[layers.len() - 1].len() > 1 {
            let next = hash_layer::<H>(&layers[layers.len() - 1]);
            layers.push(next);
        }
        Self { layers }
    }

    /// The number of leaves committed to.
    pub fn len(&self) -> usize {
        self.layers.first().map_or(0, Vec::len)
    }

    /// Whether the tree commits to any leaves.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// The root digest, or `None` for an empty tree.
    pub fn root(&self) -> Option<H::Digest> {
        self.layers.last().map(|layer| layer[0])
    }

    /// Produce a multi-index proof for the given leaf positions.
    ///
    /// Duplicate positions are coalesced. Fails with [Error::OutOfRange] if
    /// any position does not address a leaf.
    pub fn prove(&self, positions: &[u64]) -> Result<Proof<H::Digest>, Error> {
        let n = self.len() as u64;
        let mut known = BTreeSet::new();
        for &position in positions {
            if position >= n {
                return Err(Error::OutOfRange(position));
            }
            known.insert(position);
        }

        let mut siblings = Vec::new();
        for layer in self.layers.iter().take(self.layers.len().saturating_sub(1)) {
            let indices: Vec<u64> = known.iter().copied().collect();
            let mut next = BTreeSet::new();
            let mut i = 0;
            while i < indices.len() {
                let index = indices[i];
                if index % 2 == 0 {
                    if i + 1 < indices.len() && indices[i + 1] == index + 1 {
                        // The right sibling is co-proven, skip it.
                        i += 1;
                    } else if let Some(right) = layer.get(index as usize + 1) {
                        siblings.push(Some(*right));
                    } else {
                        // Lone node at the end of an odd layer.
                        siblings.push(None);
                    }
                } else {
                    siblings.push(Some(layer[index as usize - 1]));
                }
                next.insert(index / 2);
                i += 1;
            }
            known = next;
        }

        Ok(Proof { siblings })
    }
}

/// A flat sibling stream proving the inclusion of a set of leaves.
///
/// `None` entries mark positions that do not exist in their layer (the
/// missing right sibling of a lone node); prover and verifier walk the tree
/// in lock-step, so the markers are unambiguous.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Proof<D: Digest> {
    pub siblings: Vec<Option<D>>,
}

impl<D: Digest> Proof<D> {
    /// Verify this proof against `root` for the given `position -> leaf
    /// digest` mapping.
    ///
    /// The mapping holds leaf *digests*, not leaf bytes. An empty mapping
    /// verifies trivially. Fails with [Error::InvalidProof] if the sibling
    /// stream is exhausted prematurely, carries items the mapping does not
    /// consume, or does not reconstruct `root`.
    pub fn verify<H: Hasher<Digest = D>>(
        &self,
        root: &D,
        leaves: &BTreeMap<u64, D>,
    ) -> Result<(), Error> {
        if leaves.is_empty() {
            return Ok(());
        }

        let mut hasher = H::new();
        let mut layer: Vec<(u64, D)> = leaves.iter().map(|(&index, &digest)| (index, digest)).collect();
        let mut consumed = 0;
        while layer.len() > 1 || consumed < self.siblings.len() {
            let mut next = Vec::with_capacity(layer.len().div_ceil(2));
            let mut i = 0;
            while i < layer.len() {
                let (index, digest) = layer[i];
                if index % 2 == 0 {
                    hasher.update(digest.as_ref());
                    if i + 1 < layer.len() && layer[i + 1].0 == index + 1 {
                        hasher.update(layer[i + 1].1.as_ref());
                        i += 1;
                    } else {
                        let Some(sibling) = self.siblings.get(consumed) else {
                            debug!(index, "sibling stream exhausted");
                            return Err(Error::InvalidProof);
                        };
                        consumed += 1;
                        if let Some(right) = sibling {
                            hasher.update(right.as_ref());
                        }
                    }
                } else {
                    // A right child always has a left sibling in its layer.
                    let Some(Some(left)) = self.siblings.get(consumed) else {
                        debug!(index, "missing left sibling");
                        return Err(Error::InvalidProof);
                    };
                    consumed += 1;
                    hasher.update(left.as_ref());
                    hasher.update(digest.as_ref());
                }
                next.push((index / 2, hasher.finalize()));
                i += 1;
            }
            layer = next;
        }

        if layer[0].1 != *root {
            debug!("root mismatch");
            return Err(Error::InvalidProof);
        }
        Ok(())
    }
}

fn chunk_size(len: usize) -> usize {
    (len / rayon::current_num_threads()).max(1)
}

fn hash_leaves<H: Hasher, T: AsRef<[u8]> + Sync>(data: &[T]) -> Vec<H::Digest> {
    let chunks: Vec<Vec<H::Digest>> = data
        .par_chunks(chunk_size(data.len()))
        .map(|chunk| {
            let mut hasher = H::new();
            chunk
                .iter()
                .map(|leaf| {
                    hasher.update(leaf.as_ref());
                    hasher.finalize()
                })
                .collect()
        })
        .collect();

    let mut layer = Vec::with_capacity(data.len());
    for chunk in chunks {
        layer.extend(chunk);
    }
    layer
}

fn hash_layer<H: Hasher>(children: &[H::Digest]) -> Vec<H::Digest> {
    let parents = children.len().div_ceil(2);
    // Chunks must hold whole sibling pairs.
    let chunk = chunk_size(parents) * 2;
    let chunks: Vec<Vec<H::Digest>> = children
        .par_chunks(chunk)
        .map(|pairs| {
            let mut hasher = H::new();
            pairs
                .chunks(2)
                .map(|pair| {
                    hasher.update(pair[0].as_ref());
                    if let Some(right) = pair.get(1) {
                        hasher.update(right.as_ref());
                    }
                    hasher.finalize()
                })
                .collect()
        })
        .collect();

    let mut layer = Vec::with_capacity(parents);
    for chunk in chunks {
        layer.extend(chunk);
    }
    layer
}
