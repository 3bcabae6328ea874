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

//! Quorum reads and writes over every known node.
//!
//! A request is proposed to all nodes of the cluster, not only to the replicas selected by the
//! ring, so the nodes outside the replica set act as fallback acceptors. Two matching answers
//! decide the request.

use std::{collections::HashMap, future::Future, sync::Arc, time::Duration};

use futures::{channel::mpsc, StreamExt};
use ringkv_api::v1::Pair;
use tokio::{task::JoinHandle, time::Instant};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    cluster::{Cluster, Peer},
    config::ClusterConfig,
    metrics::*,
    ring, Error, Result,
};

/// A node a request is proposed to.
struct Target {
    addr: String,
    peer: Arc<dyn Peer>,
    /// Position of the node in the ring walk of the key.
    replica_idx: u32,
}

/// The in-flight calls of a fan-out. Dropping it aborts the calls not yet finished.
struct FanOut<T> {
    handles: Vec<JoinHandle<()>>,
    receiver: mpsc::Receiver<(String, u32, Result<T>)>,
}

impl<T: Send + 'static> FanOut<T> {
    fn spawn<F, Fut>(targets: Vec<Target>, deadline: Instant, call: F) -> Self
    where
        F: Fn(Arc<dyn Peer>, u32) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel(targets.len());
        let mut handles = Vec::with_capacity(targets.len());
        for Target {
            addr,
            peer,
            replica_idx,
        } in targets
        {
            let mut sender = sender.clone();
            let fut = call(peer, replica_idx);
            handles.push(tokio::spawn(async move {
                let result = match tokio::time::timeout_at(deadline, fut).await {
                    Ok(result) => result,
                    Err(_) => Err(Error::Canceled(format!(
                        "request to {} deadline exceeded",
                        addr
                    ))),
                };
                sender
                    .try_send((addr, replica_idx, result))
                    .unwrap_or_default();
            }));
        }
        FanOut { handles, receiver }
    }

    async fn next(&mut self) -> Option<(String, u32, Result<T>)> {
        self.receiver.next().await
    }

    /// Let the calls still in flight run to completion, bounded by their deadline.
    fn detach(mut self) {
        self.handles.clear();
    }
}

impl<T> Drop for FanOut<T> {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

pub struct Coordinator {
    cluster: Arc<Cluster>,
    cfg: ClusterConfig,
    request_timeout: Duration,
}

impl Coordinator {
    pub fn new(cluster: Arc<Cluster>, cfg: ClusterConfig, request_timeout: Duration) -> Self {
        Coordinator {
            cluster,
            cfg,
            request_timeout,
        }
    }

    /// Write `key` unless it exists.
    ///
    /// On an abort quorum the writes this proposal made are reverted in the background, and the
    /// last error observed is returned.
    pub async fn put(&self, key: String, value: Option<Vec<u8>>) -> Result<()> {
        let _timer = take_put_metrics().start_timer();
        let result = self.put_inner(key, value).await;
        let outcome = match &result {
            Ok(()) => "commit",
            Err(Error::InvalidArgument(_) | Error::Unavailable(_)) => "reject",
            Err(_) => "abort",
        };
        COORDINATOR_PUT_TOTAL.with_label_values(&[outcome]).inc();
        result
    }

    async fn put_inner(&self, key: String, value: Option<Vec<u8>>) -> Result<()> {
        let value = match value {
            Some(value) if !key.is_empty() => value,
            _ => {
                return Err(Error::InvalidArgument(
                    "key and value must be set".to_owned(),
                ))
            }
        };
        let hash = ring::hash(key.as_bytes());
        let targets = self.targets(hash)?;

        let write_id = Uuid::new_v4().to_string();
        let pair = Pair::new(key.clone(), hash, value);
        let deadline = Instant::now() + self.request_timeout;
        let mut fan_out = FanOut::spawn(targets, deadline, |peer, replica_idx| {
            let pair = pair.clone();
            let write_id = write_id.clone();
            async move { peer.set(pair, replica_idx, write_id).await }
        });

        let (mut successes, mut failures) = (0, 0);
        while let Some((addr, replica_idx, result)) = fan_out.next().await {
            match result {
                Ok(()) => {
                    successes += 1;
                    if successes >= self.cfg.quorum {
                        debug!(
                            "put key {} commit, last ack from {} slot {}",
                            key, addr, replica_idx
                        );
                        // The remaining writes still land, keeping every known node a copy.
                        fan_out.detach();
                        return Ok(());
                    }
                }
                Err(err) => {
                    debug!("put key {} to {} slot {}: {}", key, addr, replica_idx, err);
                    failures += 1;
                    if failures >= self.cfg.quorum {
                        drop(fan_out);
                        self.revert(key, write_id);
                        return Err(err);
                    }
                }
            }
        }

        warn!(
            "put key {} without quorum, {} successes {} failures",
            key, successes, failures
        );
        Err(Error::Aborted("no quorum was reached".to_owned()))
    }

    /// Read `key`, returning the first value two nodes agree on.
    pub async fn fetch(&self, key: String) -> Result<Vec<u8>> {
        let _timer = take_fetch_metrics().start_timer();
        let result = self.fetch_inner(key).await;
        let outcome = match &result {
            Ok(_) => "found",
            Err(Error::NotFound(_)) => "not_found",
            Err(Error::InvalidArgument(_) | Error::Unavailable(_)) => "reject",
            Err(_) => "abort",
        };
        COORDINATOR_FETCH_TOTAL.with_label_values(&[outcome]).inc();
        result
    }

    async fn fetch_inner(&self, key: String) -> Result<Vec<u8>> {
        if key.is_empty() {
            return Err(Error::InvalidArgument("key must be set".to_owned()));
        }
        let hash = ring::hash(key.as_bytes());
        let targets = self.targets(hash)?;

        let deadline = Instant::now() + self.request_timeout;
        let mut fan_out = FanOut::spawn(targets, deadline, |peer, _| {
            let key = key.clone();
            async move { peer.get(key).await }
        });

        let mut values: HashMap<Vec<u8>, usize> = HashMap::new();
        let mut errors: HashMap<tonic::Code, usize> = HashMap::new();
        let mut last_err = None;
        while let Some((addr, replica_idx, result)) = fan_out.next().await {
            match result {
                Ok(value) => {
                    let count = values.entry(value.clone()).or_default();
                    *count += 1;
                    if *count >= self.cfg.quorum {
                        debug!(
                            "fetch key {} agreed, last answer from {} slot {}",
                            key, addr, replica_idx
                        );
                        return Ok(value);
                    }
                }
                Err(err) => {
                    debug!(
                        "fetch key {} from {} slot {}: {}",
                        key, addr, replica_idx, err
                    );
                    let count = errors.entry(err.code()).or_default();
                    *count += 1;
                    if *count >= self.cfg.quorum {
                        return Err(err);
                    }
                    last_err = Some(err);
                }
            }
        }

        match last_err {
            Some(err) => Err(err),
            None => Err(Error::Aborted("no quorum was reached".to_owned())),
        }
    }

    /// Every known node, tagged with its slot in the ring walk of `hash`.
    fn targets(&self, hash: u32) -> Result<Vec<Target>> {
        let peers = self.cluster.peers();
        if peers.len() < self.cfg.min_servers {
            return Err(Error::Unavailable(format!(
                "coordinator is not initialized, {} of {} nodes known",
                peers.len(),
                self.cfg.min_servers
            )));
        }

        // Fails unless the ring holds the replicas of the key.
        self.cluster.replicas(hash, self.cfg.replicas)?;
        let placement = self.cluster.placement(hash)?;
        let targets = peers
            .into_iter()
            .map(|(addr, peer)| {
                let replica_idx = placement
                    .iter()
                    .position(|node| node.id == addr)
                    .unwrap_or(placement.len());
                Target {
                    addr,
                    peer,
                    replica_idx: replica_idx as u32,
                }
            })
            .collect();
        Ok(targets)
    }

    /// Remove the writes of proposal `write_id` from every node, in the background.
    fn revert(&self, key: String, write_id: String) {
        let peers = self.cluster.peers();
        let timeout = self.request_timeout;
        tokio::spawn(async move {
            let deletes = peers.into_iter().map(|(addr, peer)| {
                let key = key.clone();
                let write_id = write_id.clone();
                async move {
                    match tokio::time::timeout(timeout, peer.delete(key.clone(), write_id)).await {
                        Ok(Ok(())) => {}
                        Ok(Err(err)) => warn!("revert key {} on {}: {}", key, addr, err),
                        Err(_) => warn!("revert key {} on {}: timeout", key, addr),
                    }
                }
            });
            futures::future::join_all(deletes).await;
        });
    }
}
