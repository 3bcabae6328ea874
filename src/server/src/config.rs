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

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub const DEFAULT_ADDR: &str = "127.0.0.1:21805";

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Config {
    /// The listen address, also the id of this node in the ring.
    pub addr: String,

    /// Address of a node to register with. `None` starts a new cluster.
    pub join: Option<String>,

    #[serde(default)]
    pub cluster: ClusterConfig,

    #[serde(default)]
    pub timeout: TimeoutConfig,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ClusterConfig {
    /// Replication factor.
    pub replicas: usize,

    /// Number of nodes forming the initial cluster. Requests are refused below it.
    pub min_servers: usize,

    /// Virtual nodes per physical node.
    pub weight: usize,

    /// Matching responses needed to commit, abort or answer a read.
    pub quorum: usize,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct TimeoutConfig {
    pub request_ms: u64,
    pub propagate_ms: u64,
    pub dial_ms: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        ClusterConfig {
            replicas: 3,
            min_servers: 3,
            weight: 16,
            quorum: 2,
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        TimeoutConfig {
            request_ms: 10_000,
            propagate_ms: 3_000,
            dial_ms: 1_000,
        }
    }
}

impl TimeoutConfig {
    /// Bounds the Set/Get fan-out of a single request.
    #[inline]
    pub fn request(&self) -> Duration {
        Duration::from_millis(self.request_ms)
    }

    /// Bounds AddNode propagation and each rebalancing RPC.
    #[inline]
    pub fn propagate(&self) -> Duration {
        Duration::from_millis(self.propagate_ms)
    }

    #[inline]
    pub fn dial(&self) -> Duration {
        Duration::from_millis(self.dial_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            addr: DEFAULT_ADDR.to_owned(),
            join: None,
            cluster: ClusterConfig::default(),
            timeout: TimeoutConfig::default(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        let cluster = &self.cluster;
        if self.addr.is_empty() {
            return Err(Error::InvalidArgument("addr is empty".to_owned()));
        }
        if cluster.weight == 0 {
            return Err(Error::InvalidArgument("weight must be positive".to_owned()));
        }
        if cluster.quorum == 0 {
            return Err(Error::InvalidArgument("quorum must be positive".to_owned()));
        }
        if cluster.replicas < cluster.quorum {
            return Err(Error::InvalidArgument(format!(
                "replicas {} is less than quorum {}",
                cluster.replicas, cluster.quorum
            )));
        }
        if cluster.min_servers < cluster.replicas {
            return Err(Error::InvalidArgument(format!(
                "min_servers {} is less than replicas {}",
                cluster.min_servers, cluster.replicas
            )));
        }
        Ok(())
    }
}

/// Config values from a file or the command line. Unset values fall back to the defaults.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigBuilder {
    pub addr: Option<String>,
    pub join: Option<String>,
    pub replicas: Option<usize>,
    pub min_servers: Option<usize>,
    pub weight: Option<usize>,
    pub quorum: Option<usize>,
    pub request_timeout_ms: Option<u64>,
    pub propagate_timeout_ms: Option<u64>,
    pub dial_timeout_ms: Option<u64>,
}

impl ConfigBuilder {
    /// Overwrite the values of `self` with those set in `other`.
    pub fn merge(&mut self, other: ConfigBuilder) {
        self.addr = other.addr.or(self.addr.take());
        self.join = other.join.or(self.join.take());
        self.replicas = other.replicas.or(self.replicas.take());
        self.min_servers = other.min_servers.or(self.min_servers.take());
        self.weight = other.weight.or(self.weight.take());
        self.quorum = other.quorum.or(self.quorum.take());
        self.request_timeout_ms = other.request_timeout_ms.or(self.request_timeout_ms.take());
        self.propagate_timeout_ms = other
            .propagate_timeout_ms
            .or(self.propagate_timeout_ms.take());
        self.dial_timeout_ms = other.dial_timeout_ms.or(self.dial_timeout_ms.take());
    }

    pub fn build(self) -> Result<Config> {
        let mut config = Config::default();
        if let Some(addr) = self.addr {
            config.addr = addr;
        }
        config.join = self.join;

        let cluster = &mut config.cluster;
        cluster.replicas = self.replicas.unwrap_or(cluster.replicas);
        cluster.min_servers = self.min_servers.unwrap_or(cluster.min_servers);
        cluster.weight = self.weight.unwrap_or(cluster.weight);
        cluster.quorum = self.quorum.unwrap_or(cluster.quorum);

        let timeout = &mut config.timeout;
        timeout.request_ms = self.request_timeout_ms.unwrap_or(timeout.request_ms);
        timeout.propagate_ms = self.propagate_timeout_ms.unwrap_or(timeout.propagate_ms);
        timeout.dial_ms = self.dial_timeout_ms.unwrap_or(timeout.dial_ms);

        config.validate()?;
        Ok(config)
    }
}
