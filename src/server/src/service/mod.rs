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

mod kv;
mod membership;
mod node;

use std::sync::Arc;

use crate::{
    cluster::{Cluster, Connector},
    config::{Config, TimeoutConfig},
    coordinator::Coordinator,
    membership::Membership,
    store::MemStore,
    Result,
};

/// The state shared by the services of a node.
#[derive(Clone)]
pub struct Server {
    store: Arc<MemStore>,
    cluster: Arc<Cluster>,
    coordinator: Arc<Coordinator>,
    membership: Arc<Membership>,
    timeout: TimeoutConfig,
}

impl Server {
    /// Build the state of the node listening on `config.addr`, which is the first member of its
    /// own cluster.
    pub fn new(config: &Config, connector: Arc<dyn Connector>) -> Result<Self> {
        let cluster = Arc::new(Cluster::new(
            config.addr.clone(),
            config.cluster.weight,
            connector,
        )?);
        cluster.add_member(&config.addr)?;

        let coordinator = Coordinator::new(
            cluster.clone(),
            config.cluster.clone(),
            config.timeout.request(),
        );
        let membership = Membership::new(
            cluster.clone(),
            config.cluster.clone(),
            config.timeout.clone(),
        );
        Ok(Server {
            store: Arc::new(MemStore::new()),
            cluster,
            coordinator: Arc::new(coordinator),
            membership: Arc::new(membership),
            timeout: config.timeout.clone(),
        })
    }

    #[inline]
    pub fn cluster(&self) -> &Arc<Cluster> {
        &self.cluster
    }
}
