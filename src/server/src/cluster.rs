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
    sync::{Arc, RwLock},
    time::Duration,
};

use ringkv_api::v1::{BatchSendRequest, Pair};
use ringkv_client::{ConnManager, NodeClient};
use tracing::info;

use crate::{
    ring::{HashRing, Instruction, Node},
    Error, Result,
};

/// The primitives a node exposes to its peers.
#[tonic::async_trait]
pub trait Peer: Send + Sync {
    async fn ping(&self) -> Result<()>;

    async fn set(&self, pair: Pair, replica_idx: u32, write_id: String) -> Result<()>;

    async fn get(&self, key: String) -> Result<Vec<u8>>;

    async fn delete(&self, key: String, write_id: String) -> Result<()>;

    async fn batch_get(&self, low: u32, high: u32) -> Result<Vec<Pair>>;

    async fn batch_set(&self, replica_idx: u32, pairs: Vec<Pair>) -> Result<()>;

    async fn batch_delete(&self, replica_idx: Option<u32>, low: u32, high: u32) -> Result<()>;

    async fn batch_send(&self, req: BatchSendRequest) -> Result<()>;

    async fn add_node(&self, address: String) -> Result<()>;
}

/// Turns node addresses into peers.
#[tonic::async_trait]
pub trait Connector: Send + Sync {
    /// Dial `addr` now, failing if it is not reachable.
    async fn connect(&self, addr: &str) -> Result<Arc<dyn Peer>>;

    /// A peer that connects on first use.
    fn lazy(&self, addr: &str) -> Result<Arc<dyn Peer>>;
}

#[tonic::async_trait]
impl Peer for NodeClient {
    async fn ping(&self) -> Result<()> {
        Ok(NodeClient::ping(self).await?)
    }

    async fn set(&self, pair: Pair, replica_idx: u32, write_id: String) -> Result<()> {
        Ok(NodeClient::set(self, pair, replica_idx, write_id).await?)
    }

    async fn get(&self, key: String) -> Result<Vec<u8>> {
        Ok(NodeClient::get(self, key).await?)
    }

    async fn delete(&self, key: String, write_id: String) -> Result<()> {
        Ok(NodeClient::delete(self, key, write_id).await?)
    }

    async fn batch_get(&self, low: u32, high: u32) -> Result<Vec<Pair>> {
        Ok(NodeClient::batch_get(self, low, high).await?)
    }

    async fn batch_set(&self, replica_idx: u32, pairs: Vec<Pair>) -> Result<()> {
        Ok(NodeClient::batch_set(self, replica_idx, pairs).await?)
    }

    async fn batch_delete(&self, replica_idx: Option<u32>, low: u32, high: u32) -> Result<()> {
        Ok(NodeClient::batch_delete(self, replica_idx, low, high).await?)
    }

    async fn batch_send(&self, req: BatchSendRequest) -> Result<()> {
        Ok(NodeClient::batch_send(self, req).await?)
    }

    async fn add_node(&self, address: String) -> Result<()> {
        Ok(NodeClient::add_node(self, address).await?)
    }
}

/// Connects peers over tonic channels.
pub struct RemoteConnector {
    conn_manager: ConnManager,
    dial_timeout: Duration,
}

impl RemoteConnector {
    pub fn new(dial_timeout: Duration) -> Self {
        RemoteConnector {
            conn_manager: ConnManager::new(),
            dial_timeout,
        }
    }
}

#[tonic::async_trait]
impl Connector for RemoteConnector {
    async fn connect(&self, addr: &str) -> Result<Arc<dyn Peer>> {
        let channel = tokio::time::timeout(
            self.dial_timeout,
            self.conn_manager
                .connect(addr.to_owned(), self.dial_timeout),
        )
        .await
        .map_err(|_| Error::Unavailable(format!("dial {} timeout", addr)))??;
        Ok(Arc::new(NodeClient::new(channel)))
    }

    fn lazy(&self, addr: &str) -> Result<Arc<dyn Peer>> {
        Ok(Arc::new(self.conn_manager.get_node_client(addr.to_owned())?))
    }
}

/// The view a node has of the cluster: the hash ring and a client per known node.
///
/// The ring and the client map are guarded by separate locks, and neither is held across an
/// await point.
pub struct Cluster {
    self_addr: String,
    ring: RwLock<HashRing>,
    peers: RwLock<HashMap<String, Arc<dyn Peer>>>,
    connector: Arc<dyn Connector>,
}

impl Cluster {
    pub fn new(self_addr: String, weight: usize, connector: Arc<dyn Connector>) -> Result<Self> {
        Ok(Cluster {
            self_addr,
            ring: RwLock::new(HashRing::new(weight)?),
            peers: RwLock::default(),
            connector,
        })
    }

    #[inline]
    pub fn self_addr(&self) -> &str {
        &self.self_addr
    }

    #[inline]
    pub fn connector(&self) -> &Arc<dyn Connector> {
        &self.connector
    }

    /// Make `addr` part of this node's view, connecting lazily. Does nothing if it is known.
    pub fn add_member(&self, addr: &str) -> Result<()> {
        if self.add_to_ring(addr)? {
            info!("node {} add {} to ring", self.self_addr, addr);
        }
        if !self.contains_peer(addr) {
            let peer = self.connector.lazy(addr)?;
            self.peers
                .write()
                .unwrap()
                .entry(addr.to_owned())
                .or_insert(peer);
        }
        Ok(())
    }

    /// Returns `false` if `addr` was already on the ring.
    pub fn add_to_ring(&self, addr: &str) -> Result<bool> {
        let mut ring = self.ring.write().unwrap();
        if ring.contains(addr) {
            return Ok(false);
        }
        ring.add_node(addr)?;
        Ok(true)
    }

    /// The `n` replicas of `hash`, see [`HashRing::get_n`].
    pub fn replicas(&self, hash: u32, n: usize) -> Result<Vec<Node>> {
        Ok(self.ring.read().unwrap().get_n(hash, n)?)
    }

    /// Every node of the ring, in the replica order of `hash`.
    pub fn placement(&self, hash: u32) -> Result<Vec<Node>> {
        let ring = self.ring.read().unwrap();
        Ok(ring.get_n(hash, ring.num_nodes())?)
    }

    pub fn rebalance_instructions(&self, addr: &str) -> Result<Vec<Instruction>> {
        Ok(self.ring.read().unwrap().rebalance_instructions(addr)?)
    }

    pub fn restore_instructions(&self, addr: &str) -> Result<Vec<Instruction>> {
        Ok(self.ring.read().unwrap().restore_instructions(addr)?)
    }

    pub fn ring_nodes(&self) -> Vec<String> {
        self.ring.read().unwrap().nodes()
    }

    pub fn peer(&self, addr: &str) -> Option<Arc<dyn Peer>> {
        self.peers.read().unwrap().get(addr).cloned()
    }

    /// The peer of `addr`, or a lazily connected one if `addr` is not a member.
    pub fn peer_or_connect(&self, addr: &str) -> Result<Arc<dyn Peer>> {
        match self.peer(addr) {
            Some(peer) => Ok(peer),
            None => self.connector.lazy(addr),
        }
    }

    /// A snapshot of the client map.
    pub fn peers(&self) -> Vec<(String, Arc<dyn Peer>)> {
        let peers = self.peers.read().unwrap();
        let mut peers = peers
            .iter()
            .map(|(addr, peer)| (addr.clone(), peer.clone()))
            .collect::<Vec<_>>();
        peers.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        peers
    }

    pub fn contains_peer(&self, addr: &str) -> bool {
        self.peers.read().unwrap().contains_key(addr)
    }

    pub fn num_peers(&self) -> usize {
        self.peers.read().unwrap().len()
    }

    /// Insert or replace the client of `addr`.
    pub fn insert_peer(&self, addr: &str, peer: Arc<dyn Peer>) {
        self.peers.write().unwrap().insert(addr.to_owned(), peer);
    }

    /// The addresses of the known nodes, sorted.
    pub fn members(&self) -> Vec<String> {
        let mut members = self
            .peers
            .read()
            .unwrap()
            .keys()
            .cloned()
            .collect::<Vec<_>>();
        members.sort_unstable();
        members
    }
}
