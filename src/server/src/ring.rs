// Copyright 2022 The Engula Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Consistent hash ring with virtual nodes.
//!
//! A physical node owns `weight` positions on a ring of 32-bit hashes. A key is owned by the
//! first position whose hash is greater than or equal to the key hash, wrapping to the start of
//! the ring. Replicas are found by walking forward until enough distinct physical nodes are seen;
//! the order of the walk is the replica slot of each node.

const FNV_OFFSET_BASIS: u32 = 0x811c9dc5;
const FNV_PRIME: u32 = 0x01000193;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RingError {
    #[error("node {0} not found")]
    NodeNotFound(String),

    #[error("node {0} already exists")]
    DuplicateNode(String),

    #[error("not enough nodes, want {want} but only {have}")]
    NotEnoughNodes { want: usize, have: usize },

    #[error("invalid weight {0}")]
    InvalidWeight(usize),
}

/// A virtual node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Node {
    pub id: String,
    pub virtual_index: usize,
    pub hash_id: u32,
}

/// Copy the range `(low_hash, high_hash]` held in slot `from_replica_idx` of `from_node` into slot
/// `to_replica_idx` of the node the instruction was computed for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instruction {
    pub from_node: String,
    pub from_replica_idx: u32,
    pub to_replica_idx: u32,
    pub low_hash: u32,
    pub high_hash: u32,
}

impl Instruction {
    /// The target takes over the slot the source held, rather than receiving an extra copy.
    #[inline]
    pub fn is_handover(&self) -> bool {
        self.from_replica_idx == self.to_replica_idx
    }
}

/// 32-bit FNV-1a of `key`. Every ring of the cluster must hash with this function.
#[inline]
pub fn hash(key: &[u8]) -> u32 {
    fnv1a(FNV_OFFSET_BASIS, key)
}

/// Position of the `index`-th virtual node of `id`.
#[inline]
pub fn vnode_hash(id: &str, index: usize) -> u32 {
    let state = fnv1a(FNV_OFFSET_BASIS, id.as_bytes());
    fnv1a(state, index.to_string().as_bytes())
}

fn fnv1a(mut state: u32, bytes: &[u8]) -> u32 {
    for &b in bytes {
        state ^= b as u32;
        state = state.wrapping_mul(FNV_PRIME);
    }
    state
}

#[derive(Clone, Debug)]
pub struct HashRing {
    // Sorted by `hash_id`, which is unique.
    nodes: Vec<Node>,
    weight: usize,
}

impl HashRing {
    pub fn new(weight: usize) -> Result<Self, RingError> {
        if weight == 0 {
            return Err(RingError::InvalidWeight(weight));
        }
        Ok(HashRing {
            nodes: Vec::default(),
            weight,
        })
    }

    #[inline]
    pub fn weight(&self) -> usize {
        self.weight
    }

    /// The number of virtual nodes.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The number of physical nodes.
    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.nodes.len() / self.weight
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id, 0).is_some()
    }

    /// The ids of the physical nodes, sorted.
    pub fn nodes(&self) -> Vec<String> {
        let mut ids = self
            .nodes
            .iter()
            .filter(|n| n.virtual_index == 0)
            .map(|n| n.id.clone())
            .collect::<Vec<_>>();
        ids.sort_unstable();
        ids
    }

    pub fn add_node(&mut self, id: &str) -> Result<(), RingError> {
        if self.contains(id) {
            return Err(RingError::DuplicateNode(id.to_owned()));
        }

        let mut vnodes = (0..self.weight)
            .map(|virtual_index| Node {
                id: id.to_owned(),
                virtual_index,
                hash_id: vnode_hash(id, virtual_index),
            })
            .collect::<Vec<_>>();
        vnodes.sort_unstable_by_key(|n| n.hash_id);
        let collided = vnodes.windows(2).any(|w| w[0].hash_id == w[1].hash_id)
            || vnodes.iter().any(|n| self.search_exact(n.hash_id).is_some());
        if collided {
            return Err(RingError::DuplicateNode(id.to_owned()));
        }

        self.nodes.extend(vnodes);
        self.nodes.sort_unstable_by_key(|n| n.hash_id);
        Ok(())
    }

    /// Remove every virtual node of `id`. Either all of them are removed or the ring is left
    /// untouched.
    pub fn remove_node(&mut self, id: &str) -> Result<(), RingError> {
        for virtual_index in 0..self.weight {
            if self.position(id, virtual_index).is_none() {
                return Err(RingError::NodeNotFound(id.to_owned()));
            }
        }
        self.nodes.retain(|n| n.id != id);
        Ok(())
    }

    /// The owner of `hash_key`.
    pub fn get(&self, hash_key: u32) -> Result<Node, RingError> {
        if self.nodes.is_empty() {
            return Err(RingError::NotEnoughNodes { want: 1, have: 0 });
        }
        Ok(self.nodes[self.search(hash_key)].clone())
    }

    /// The first `n` distinct physical nodes met walking forward from the owner of `hash_key`.
    /// The index of a node in the result is its replica slot.
    pub fn get_n(&self, hash_key: u32, n: usize) -> Result<Vec<Node>, RingError> {
        let have = self.num_nodes();
        if have < n {
            return Err(RingError::NotEnoughNodes { want: n, have });
        }

        let mut replicas: Vec<Node> = Vec::with_capacity(n);
        if n == 0 {
            return Ok(replicas);
        }
        let start = self.search(hash_key);
        for offset in 0..self.nodes.len() {
            let node = &self.nodes[(start + offset) % self.nodes.len()];
            if replicas.iter().any(|r| r.id == node.id) {
                continue;
            }
            replicas.push(node.clone());
            if replicas.len() == n {
                break;
            }
        }
        Ok(replicas)
    }

    /// The ranges a node joining as `id` must receive to hold its share of data, two per
    /// virtual node. The sources are read in the slots they held before `id` joined.
    ///
    /// For a virtual node `v` with `p1` the nearest preceding position of another node and `p2`
    /// the one before it:
    /// - `(p1, v]` is now owned by `v`. It comes from slot 0 of the nearest following position
    ///   of another node, the owner of the range before `id` joined.
    /// - `(p2, p1]` is a replica `v` holds in slot 1. It comes from slot 0 of `p1`.
    ///
    /// A ring without any other node yields no instruction.
    pub fn rebalance_instructions(&self, id: &str) -> Result<Vec<Instruction>, RingError> {
        self.instructions(id, 0)
    }

    /// The ranges a restarted `id` must receive back. Same ranges as
    /// [`HashRing::rebalance_instructions`], but `id` was on the ring when the data was written,
    /// so the following node holds `(p1, v]` in slot 1.
    pub fn restore_instructions(&self, id: &str) -> Result<Vec<Instruction>, RingError> {
        self.instructions(id, 1)
    }

    fn instructions(&self, id: &str, owned_slot: u32) -> Result<Vec<Instruction>, RingError> {
        let mut instructions = Vec::with_capacity(2 * self.weight);
        for virtual_index in 0..self.weight {
            let pos = self
                .position(id, virtual_index)
                .ok_or_else(|| RingError::NodeNotFound(id.to_owned()))?;
            let (Some(prev), Some(next)) = (self.prev_other(pos, id), self.next_other(pos, id))
            else {
                // Only `id` lives on the ring.
                return Ok(vec![]);
            };
            let prev_prev = self.prev_other(prev, id).unwrap_or(prev);

            let vnode = &self.nodes[pos];
            let p1 = &self.nodes[prev];
            let p2 = &self.nodes[prev_prev];
            let successor = &self.nodes[next];
            instructions.push(Instruction {
                from_node: successor.id.clone(),
                from_replica_idx: owned_slot,
                to_replica_idx: 0,
                low_hash: p1.hash_id,
                high_hash: vnode.hash_id,
            });
            instructions.push(Instruction {
                from_node: p1.id.clone(),
                from_replica_idx: 0,
                to_replica_idx: 1,
                low_hash: p2.hash_id,
                high_hash: p1.hash_id,
            });
        }
        Ok(instructions)
    }

    /// Index of the first position with `hash_id >= hash_key`, wrapping to 0.
    fn search(&self, hash_key: u32) -> usize {
        let idx = self.nodes.partition_point(|n| n.hash_id < hash_key);
        if idx == self.nodes.len() {
            0
        } else {
            idx
        }
    }

    fn search_exact(&self, hash_id: u32) -> Option<usize> {
        self.nodes.binary_search_by_key(&hash_id, |n| n.hash_id).ok()
    }

    fn position(&self, id: &str, virtual_index: usize) -> Option<usize> {
        self.search_exact(vnode_hash(id, virtual_index))
            .filter(|&pos| self.nodes[pos].id == id)
    }

    fn prev_other(&self, pos: usize, id: &str) -> Option<usize> {
        let len = self.nodes.len();
        (1..len)
            .map(|step| (pos + len - step) % len)
            .find(|&idx| self.nodes[idx].id != id)
    }

    fn next_other(&self, pos: usize, id: &str) -> Option<usize> {
        let len = self.nodes.len();
        (1..len)
            .map(|step| (pos + step) % len)
            .find(|&idx| self.nodes[idx].id != id)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn ring_of(weight: usize, ids: &[&str]) -> HashRing {
        let mut ring = HashRing::new(weight).unwrap();
        for id in ids {
            ring.add_node(id).unwrap();
        }
        ring
    }

    #[test]
    fn fnv1a_vectors() {
        assert_eq!(hash(b""), 0x811c9dc5);
        assert_eq!(hash(b"a"), 0xe40c292c);
        assert_eq!(vnode_hash("server1", 0), hash(b"server10"));
    }

    #[test]
    fn ring_length_follows_membership() {
        let mut ring = HashRing::new(10).unwrap();
        let mut present = HashSet::new();
        let steps: &[(&str, bool)] = &[
            ("n1", true),
            ("n2", true),
            ("n3", true),
            ("n2", false),
            ("n4", true),
            ("n1", false),
            ("n2", true),
        ];
        for (id, add) in steps {
            if *add {
                ring.add_node(id).unwrap();
                present.insert(*id);
            } else {
                ring.remove_node(id).unwrap();
                present.remove(id);
            }
            assert_eq!(ring.len(), ring.weight() * present.len());
            assert_eq!(ring.num_nodes(), present.len());
            assert!(ring.nodes.windows(2).all(|w| w[0].hash_id < w[1].hash_id));
        }
    }

    #[test]
    fn add_existing_node_is_rejected() {
        let mut ring = ring_of(4, &["n1"]);
        assert_eq!(
            ring.add_node("n1"),
            Err(RingError::DuplicateNode("n1".to_owned()))
        );
        assert_eq!(ring.len(), 4);
    }

    #[test]
    fn remove_unknown_node_leaves_ring_unchanged() {
        let mut ring = ring_of(4, &["n1", "n2"]);
        let before = ring.nodes.clone();
        assert_eq!(
            ring.remove_node("n3"),
            Err(RingError::NodeNotFound("n3".to_owned()))
        );
        assert_eq!(ring.nodes, before);
    }

    #[test]
    fn get_n_returns_distinct_nodes() {
        let ring = ring_of(8, &["n1", "n2", "n3", "n4"]);
        for key in ["a", "b", "book_100", "test", "k"] {
            let h = hash(key.as_bytes());
            for n in 0..=4 {
                let replicas = ring.get_n(h, n).unwrap();
                assert_eq!(replicas.len(), n);
                let ids = replicas.iter().map(|r| r.id.as_str()).collect::<HashSet<_>>();
                assert_eq!(ids.len(), n);
            }
            assert_eq!(
                ring.get_n(h, 5),
                Err(RingError::NotEnoughNodes { want: 5, have: 4 })
            );
            // The first replica is the owner.
            assert_eq!(ring.get_n(h, 1).unwrap()[0], ring.get(h).unwrap());
        }
    }

    #[test]
    fn lookups_are_deterministic() {
        let a = ring_of(16, &["n1", "n2", "n3"]);
        let b = ring_of(16, &["n3", "n1", "n2"]);
        for key in ["a", "b", "c", "d", "e"] {
            let h = hash(key.as_bytes());
            assert_eq!(a.get(h).unwrap(), b.get(h).unwrap());
            assert_eq!(a.get_n(h, 3).unwrap(), b.get_n(h, 3).unwrap());
        }
    }

    #[test]
    fn get_wraps_around() {
        let ring = ring_of(1, &["server1", "server2"]);
        let s1 = vnode_hash("server1", 0);
        let s2 = vnode_hash("server2", 0);
        assert!(s2 < s1);

        // Hashes between server2 and server1 belong to server1.
        assert_eq!(ring.get(s1).unwrap().id, "server1");
        assert_eq!(ring.get(s1 - 1).unwrap().id, "server1");
        assert_eq!(ring.get(hash(b"test")).unwrap().id, "server1");
        // Past the last position the walk wraps to the first one.
        assert_eq!(ring.get(s1 + 1).unwrap().id, "server2");
        assert_eq!(ring.get(0).unwrap().id, "server2");
        assert_eq!(ring.get(u32::MAX).unwrap().id, "server2");
    }

    #[test]
    fn get_on_empty_ring() {
        let ring = HashRing::new(3).unwrap();
        assert!(matches!(
            ring.get(42),
            Err(RingError::NotEnoughNodes { want: 1, have: 0 })
        ));
    }

    #[test]
    fn instructions_per_added_node() {
        let mut ring = ring_of(8, &["n1", "n2", "n3"]);
        ring.add_node("n4").unwrap();
        let instructions = ring.rebalance_instructions("n4").unwrap();
        assert_eq!(instructions.len(), 2 * ring.weight());
        assert!(instructions.iter().all(|i| i.from_node != "n4"));
        assert_eq!(instructions.iter().filter(|i| i.is_handover()).count(), 8);
    }

    #[test]
    fn instructions_reference_prior_neighbours() {
        let mut ring = ring_of(1, &["server1", "server2"]);
        ring.add_node("server3").unwrap();

        let s1 = vnode_hash("server1", 0);
        let s2 = vnode_hash("server2", 0);
        let s3 = vnode_hash("server3", 0);
        // server2 < server3 < server1 on the ring.
        assert!(s2 < s3 && s3 < s1);

        let instructions = ring.rebalance_instructions("server3").unwrap();
        assert_eq!(
            instructions,
            vec![
                Instruction {
                    from_node: "server1".to_owned(),
                    from_replica_idx: 0,
                    to_replica_idx: 0,
                    low_hash: s2,
                    high_hash: s3,
                },
                Instruction {
                    from_node: "server2".to_owned(),
                    from_replica_idx: 0,
                    to_replica_idx: 1,
                    low_hash: s1,
                    high_hash: s2,
                },
            ]
        );
    }

    #[test]
    fn instructions_skip_own_virtual_nodes() {
        let ring = ring_of(32, &["n1", "n2"]);
        for i in ring.rebalance_instructions("n2").unwrap() {
            assert_eq!(i.from_node, "n1");
        }
    }

    #[test]
    fn restore_reads_owned_range_from_following_slot() {
        let ring = ring_of(8, &["n1", "n2", "n3"]);
        let joined = ring.rebalance_instructions("n3").unwrap();
        let restored = ring.restore_instructions("n3").unwrap();
        assert_eq!(joined.len(), restored.len());
        for (joined, restored) in joined.iter().zip(&restored) {
            assert_eq!(joined.low_hash, restored.low_hash);
            assert_eq!(joined.high_hash, restored.high_hash);
            assert_eq!(joined.from_node, restored.from_node);
            assert_eq!(joined.to_replica_idx, restored.to_replica_idx);
            // Nothing is handed over on a restart.
            assert!(!restored.is_handover());
        }
        for i in restored.iter().filter(|i| i.to_replica_idx == 0) {
            assert_eq!(i.from_replica_idx, 1);
            // The source is the second replica of the range it sends.
            let replicas = ring.get_n(i.high_hash, 2).unwrap();
            assert_eq!(replicas[0].id, "n3");
            assert_eq!(replicas[1].id, i.from_node);
        }
    }

    #[test]
    fn zero_weight_is_rejected() {
        assert_eq!(HashRing::new(0).unwrap_err(), RingError::InvalidWeight(0));
    }

    #[test]
    fn instructions_of_lonely_or_unknown_node() {
        let ring = ring_of(4, &["n1"]);
        assert!(ring.rebalance_instructions("n1").unwrap().is_empty());
        assert_eq!(
            ring.rebalance_instructions("n2"),
            Err(RingError::NodeNotFound("n2".to_owned()))
        );
    }
}
