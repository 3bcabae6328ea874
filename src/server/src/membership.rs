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

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use ringkv_api::v1::BatchSendRequest;
use tracing::{info, warn};

use crate::{
    cluster::{Cluster, Peer},
    config::{ClusterConfig, TimeoutConfig},
    metrics::*,
    ring::Instruction,
    Error, Result,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Registration {
    /// The cluster is still forming, no data to move.
    Bootstrap,
    /// A known node came back empty, copy its share back without touching the sources.
    Restart,
    /// A new node takes over part of the ring.
    ScaleOut,
}

impl Registration {
    fn as_str(&self) -> &'static str {
        match self {
            Registration::Bootstrap => "bootstrap",
            Registration::Restart => "restart",
            Registration::ScaleOut => "scale_out",
        }
    }
}

/// Whether a registered node has received its data yet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeStatus {
    Migrating { pending: usize },
    Ready,
}

pub struct Membership {
    cluster: Arc<Cluster>,
    cfg: ClusterConfig,
    timeout: TimeoutConfig,

    /// Serializes registrations, so two of them never classify against the same view.
    register_lock: tokio::sync::Mutex<()>,
    status: Arc<Mutex<HashMap<String, NodeStatus>>>,
}

impl Membership {
    pub fn new(cluster: Arc<Cluster>, cfg: ClusterConfig, timeout: TimeoutConfig) -> Self {
        Membership {
            cluster,
            cfg,
            timeout,
            register_lock: tokio::sync::Mutex::default(),
            status: Arc::default(),
        }
    }

    /// Admit `address` to the cluster and return every known node, the new one included.
    /// Registering this node itself changes nothing.
    ///
    /// The response does not wait for rebalancing, see [`Membership::node_status`].
    pub async fn register_node(&self, address: String) -> Result<Vec<String>> {
        if address.is_empty() {
            return Err(Error::InvalidArgument("address is empty".to_owned()));
        }
        if address == self.cluster.self_addr() {
            info!("node {} register itself, ignored", address);
            return Ok(self.cluster.members());
        }
        let peer = self.cluster.connector().connect(&address).await?;

        let _guard = self.register_lock.lock().await;
        let kind = self.classify(&address);
        info!("register node {} as {}", address, kind.as_str());
        MEMBERSHIP_REGISTER_TOTAL
            .with_label_values(&[kind.as_str()])
            .inc();

        match kind {
            Registration::Restart => {
                self.cluster.insert_peer(&address, peer);
                self.cluster.add_to_ring(&address)?;
                let instructions = self.cluster.restore_instructions(&address)?;
                self.rebalance(&address, instructions, false);
            }
            Registration::Bootstrap => {
                self.cluster.add_to_ring(&address)?;
                self.cluster.insert_peer(&address, peer);
                self.propagate(&address).await;
                self.set_status(&address, NodeStatus::Ready);
            }
            Registration::ScaleOut => {
                self.cluster.add_to_ring(&address)?;
                self.cluster.insert_peer(&address, peer);
                self.propagate(&address).await;
                let instructions = self.cluster.rebalance_instructions(&address)?;
                self.rebalance(&address, instructions, true);
            }
        }

        Ok(self.cluster.members())
    }

    pub fn node_status(&self, address: &str) -> Option<NodeStatus> {
        self.status.lock().unwrap().get(address).copied()
    }

    fn classify(&self, address: &str) -> Registration {
        if self.cluster.contains_peer(address) {
            Registration::Restart
        } else if self.cluster.num_peers() < self.cfg.min_servers {
            Registration::Bootstrap
        } else {
            Registration::ScaleOut
        }
    }

    /// Tell the other nodes about `address`. Failures are logged, a node missing the update
    /// learns it on its next registration.
    async fn propagate(&self, address: &str) {
        let timeout = self.timeout.propagate();
        let calls = self
            .cluster
            .peers()
            .into_iter()
            .filter(|(addr, _)| addr != address && addr != self.cluster.self_addr())
            .map(|(addr, peer)| async move {
                match tokio::time::timeout(timeout, peer.add_node(address.to_owned())).await {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => warn!("propagate node {} to {}: {}", address, addr, err),
                    Err(_) => warn!("propagate node {} to {}: timeout", address, addr),
                }
            });
        futures::future::join_all(calls).await;
    }

    /// Start one task per instruction copying a range into `target`. With `handover` set, a range
    /// whose slot moved to `target` is deleted from that slot of its source once copied.
    fn rebalance(&self, target: &str, instructions: Vec<Instruction>, handover: bool) {
        if instructions.is_empty() {
            self.set_status(target, NodeStatus::Ready);
            return;
        }

        info!(
            "node {} rebalance {} ranges, handover {}",
            target,
            instructions.len(),
            handover
        );
        self.add_pending(target, instructions.len());
        for instruction in instructions {
            let source = self.cluster.peer(&instruction.from_node);
            let target = target.to_owned();
            let status = self.status.clone();
            let timeout = self.timeout.propagate();
            tokio::spawn(async move {
                let result = match source {
                    Some(source) => {
                        transfer(source, &target, &instruction, handover, timeout).await
                    }
                    None => Err(Error::Internal(format!(
                        "source {} has no client",
                        instruction.from_node
                    ))),
                };
                match result {
                    Ok(()) => {
                        REBALANCE_INSTRUCTION_TOTAL
                            .with_label_values(&["success"])
                            .inc();
                    }
                    Err(err) => {
                        REBALANCE_INSTRUCTION_TOTAL
                            .with_label_values(&["abandon"])
                            .inc();
                        warn!(
                            "node {} abandon range ({}, {}] from {}: {}",
                            target, instruction.low_hash, instruction.high_hash,
                            instruction.from_node, err
                        );
                    }
                }
                finish_one(&status, &target);
            });
        }
    }

    fn set_status(&self, address: &str, status: NodeStatus) {
        self.status
            .lock()
            .unwrap()
            .insert(address.to_owned(), status);
    }

    fn add_pending(&self, address: &str, n: usize) {
        let mut status = self.status.lock().unwrap();
        let entry = status.entry(address.to_owned()).or_insert(NodeStatus::Ready);
        *entry = match *entry {
            NodeStatus::Migrating { pending } => NodeStatus::Migrating { pending: pending + n },
            NodeStatus::Ready => NodeStatus::Migrating { pending: n },
        };
    }
}

async fn transfer(
    source: Arc<dyn Peer>,
    target: &str,
    instruction: &Instruction,
    handover: bool,
    timeout: Duration,
) -> Result<()> {
    let req = BatchSendRequest {
        from_replica_idx: instruction.from_replica_idx,
        to_replica_idx: instruction.to_replica_idx,
        target: target.to_owned(),
        low: instruction.low_hash,
        high: instruction.high_hash,
    };
    tokio::time::timeout(timeout, source.batch_send(req))
        .await
        .map_err(|_| Error::Canceled("batch send timeout".to_owned()))??;

    if handover && instruction.is_handover() {
        tokio::time::timeout(
            timeout,
            source.batch_delete(
                Some(instruction.from_replica_idx),
                instruction.low_hash,
                instruction.high_hash,
            ),
        )
        .await
        .map_err(|_| Error::Canceled("batch delete timeout".to_owned()))??;
    }
    Ok(())
}

fn finish_one(status: &Mutex<HashMap<String, NodeStatus>>, address: &str) {
    let mut status = status.lock().unwrap();
    if let Some(entry) = status.get_mut(address) {
        *entry = match *entry {
            NodeStatus::Migrating { pending } if pending > 1 => NodeStatus::Migrating {
                pending: pending - 1,
            },
            _ => NodeStatus::Ready,
        };
        if *entry == NodeStatus::Ready {
            info!("node {} is ready", address);
        }
    }
}

#[cfg(test)]
mod tests {
    use ringkv_api::v1::Pair;

    use super::*;
    use crate::{cluster::testing::*, ring};

    const WEIGHT: usize = 4;

    fn membership(cluster: Arc<Cluster>) -> Membership {
        let timeout = TimeoutConfig {
            propagate_ms: 1000,
            ..Default::default()
        };
        Membership::new(cluster, ClusterConfig::default(), timeout)
    }

    async fn wait_ready(membership: &Membership, address: &str) {
        for _ in 0..100 {
            if membership.node_status(address) == Some(NodeStatus::Ready) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("node {} is not ready", address);
    }

    /// Write `n` keys to every node of the ring, each in its replica slot, the way a put
    /// reaching all nodes does.
    fn fill(network: &Arc<FakeNetwork>, cluster: &Cluster, n: usize) -> Vec<Pair> {
        let pairs = (0..n)
            .map(|i| {
                let key = format!("key-{}", i);
                let hash = ring::hash(key.as_bytes());
                Pair::new(key, hash, b"v".to_vec())
            })
            .collect::<Vec<_>>();
        for pair in &pairs {
            for (idx, node) in cluster.placement(pair.hash).unwrap().iter().enumerate() {
                network
                    .node(&node.id)
                    .store
                    .set(pair.clone(), idx as u32, "w".to_owned())
                    .unwrap();
            }
        }
        pairs
    }

    #[tokio::test]
    async fn bootstrap_propagates_without_moving_data() {
        let network = FakeNetwork::new();
        let cluster = cluster_of(&network, WEIGHT, &["n1"]);
        let membership = membership(cluster.clone());

        let nodes = membership.register_node("n2".to_owned()).await.unwrap();
        assert_eq!(nodes, vec!["n1", "n2"]);
        let nodes = membership.register_node("n3".to_owned()).await.unwrap();
        assert_eq!(nodes, vec!["n1", "n2", "n3"]);

        assert_eq!(cluster.ring_nodes(), vec!["n1", "n2", "n3"]);
        assert_eq!(membership.node_status("n3"), Some(NodeStatus::Ready));
        // Only n2 is told about n3; n1 is the registering node itself.
        let added = network.added.read().unwrap().clone();
        assert_eq!(added, vec![("n2".to_owned(), "n3".to_owned())]);
    }

    #[tokio::test]
    async fn scale_out_hands_over_ranges() {
        let network = FakeNetwork::new();
        let cluster = cluster_of(&network, WEIGHT, &["n1", "n2", "n3"]);
        let membership = membership(cluster.clone());
        let pairs = fill(&network, &cluster, 64);

        let nodes = membership.register_node("n4".to_owned()).await.unwrap();
        assert_eq!(nodes, vec!["n1", "n2", "n3", "n4"]);
        wait_ready(&membership, "n4").await;

        let added = network.added.read().unwrap().clone();
        assert_eq!(added.len(), 2);
        assert!(added.iter().all(|(_, address)| address == "n4"));

        let n4 = network.node("n4");
        assert!(!n4.store.is_empty());
        // Every key lives on at least three nodes, and n4 holds the keys it now owns.
        for pair in &pairs {
            let holders = ["n1", "n2", "n3", "n4"]
                .iter()
                .filter(|addr| network.node(addr).store.get(&pair.key).is_ok())
                .count();
            assert!(holders >= 3, "key {} on {} nodes", pair.key, holders);
            let owner = cluster.replicas(pair.hash, 1).unwrap().remove(0);
            if owner.id == "n4" {
                assert!(n4.store.get(&pair.key).is_ok());
            }
        }
        let total: usize = ["n1", "n2", "n3"]
            .iter()
            .map(|addr| network.node(addr).store.len())
            .sum();
        assert!(total < 3 * pairs.len());
    }

    #[tokio::test]
    async fn restart_copies_back_without_deleting() {
        let network = FakeNetwork::new();
        let cluster = cluster_of(&network, WEIGHT, &["n1", "n2", "n3"]);
        let membership = membership(cluster.clone());
        let pairs = fill(&network, &cluster, 64);

        let restarted = network.restart("n3");
        assert!(restarted.store.is_empty());
        let nodes = membership.register_node("n3".to_owned()).await.unwrap();
        assert_eq!(nodes, vec!["n1", "n2", "n3"]);
        wait_ready(&membership, "n3").await;

        assert!(!restarted.store.is_empty());
        // The keys n3 owns come back in slot 0.
        let owned = pairs
            .iter()
            .filter(|pair| cluster.replicas(pair.hash, 1).unwrap()[0].id == "n3")
            .collect::<Vec<_>>();
        for pair in &owned {
            assert!(restarted.store.get(&pair.key).is_ok(), "key {}", pair.key);
        }
        assert_eq!(restarted.store.partition_len(0), owned.len());
        assert_eq!(network.node("n1").store.len(), pairs.len());
        assert_eq!(network.node("n2").store.len(), pairs.len());
        assert!(network.added.read().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unreachable_node_is_rejected() {
        let network = FakeNetwork::new();
        let cluster = cluster_of(&network, WEIGHT, &["n1"]);
        let membership = membership(cluster.clone());
        network.unreachable.write().unwrap().push("n2".to_owned());

        let err = membership
            .register_node("n2".to_owned())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unavailable(_)));
        assert_eq!(cluster.members(), vec!["n1"]);

        let err = membership.register_node(String::new()).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn register_self_is_ignored() {
        let network = FakeNetwork::new();
        let cluster = cluster_of(&network, WEIGHT, &["n1", "n2", "n3"]);
        let membership = membership(cluster.clone());
        fill(&network, &cluster, 16);

        let nodes = membership.register_node("n1".to_owned()).await.unwrap();
        assert_eq!(nodes, vec!["n1", "n2", "n3"]);
        assert_eq!(membership.node_status("n1"), None);
        assert_eq!(network.node("n1").store.len(), 16);
        assert!(network.added.read().unwrap().is_empty());
    }

    #[test]
    fn status_counts_down_to_ready() {
        let membership = membership(cluster_of(&FakeNetwork::new(), WEIGHT, &["n1"]));
        membership.add_pending("n2", 2);
        membership.add_pending("n2", 1);
        assert_eq!(
            membership.node_status("n2"),
            Some(NodeStatus::Migrating { pending: 3 })
        );
        for _ in 0..3 {
            finish_one(&membership.status, "n2");
        }
        assert_eq!(membership.node_status("n2"), Some(NodeStatus::Ready));
    }
}
