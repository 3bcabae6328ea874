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

use tonic::transport::{Channel, Endpoint};
use tracing::debug;

use crate::NodeClient;

/// Caches one channel per node address.
#[derive(Clone, Debug, Default)]
pub struct ConnManager {
    core: Arc<Mutex<Core>>,
}

#[derive(Debug, Default)]
struct Core {
    channels: HashMap<String, Channel>,
}

impl ConnManager {
    pub fn new() -> Self {
        ConnManager::default()
    }

    /// Returns the cached channel of `addr`, or a lazily connected one.
    pub fn get(&self, addr: String) -> Result<Channel, tonic::transport::Error> {
        let mut core = self.core.lock().unwrap();
        if let Some(channel) = core.channels.get(&addr) {
            return Ok(channel.clone());
        }

        let channel = endpoint(&addr)?.connect_lazy();
        debug!("create lazy channel to {}", addr);
        core.channels.insert(addr, channel.clone());
        Ok(channel)
    }

    /// Dials `addr` eagerly and replaces any cached channel, so a restarted node gets a fresh
    /// connection.
    pub async fn connect(
        &self,
        addr: String,
        timeout: Duration,
    ) -> Result<Channel, tonic::transport::Error> {
        let channel = endpoint(&addr)?.connect_timeout(timeout).connect().await?;
        debug!("connect to {}", addr);
        let mut core = self.core.lock().unwrap();
        core.channels.insert(addr, channel.clone());
        Ok(channel)
    }

    #[inline]
    pub fn get_node_client(&self, addr: String) -> Result<NodeClient, tonic::transport::Error> {
        let channel = self.get(addr)?;
        Ok(NodeClient::new(channel))
    }
}

fn endpoint(addr: &str) -> Result<Endpoint, tonic::transport::Error> {
    Endpoint::new(format!("http://{}", addr))
}
