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

use std::{collections::HashMap, thread};

use ringkv_server::ConfigBuilder;
use tokio::sync::oneshot;
use tracing::{error, info};

use super::{
    client::{kv_client_when_available, node_client_with_retry},
    socket::free_loopback_addr,
};

/// Runs each node on its own thread and runtime, so a node can be stopped and restarted.
pub struct TestContext {
    name: String,
    weight: usize,

    notifiers: HashMap<String, oneshot::Sender<()>>,
    handles: HashMap<String, thread::JoinHandle<()>>,
}

#[allow(dead_code)]
impl TestContext {
    pub fn new(name: &str) -> Self {
        TestContext {
            name: name.to_owned(),
            weight: 8,
            notifiers: HashMap::default(),
            handles: HashMap::default(),
        }
    }

    pub fn next_listen_address(&self) -> String {
        free_loopback_addr()
    }

    pub fn spawn_server(&mut self, addr: &str, join: Option<String>) {
        let config = ConfigBuilder {
            addr: Some(addr.to_owned()),
            join,
            weight: Some(self.weight),
            ..Default::default()
        }
        .build()
        .unwrap();

        let (sender, receiver) = oneshot::channel::<()>();
        let name = self.name.clone();
        let handle = thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async move {
                let addr = config.addr.clone();
                tokio::select! {
                    result = ringkv_server::run(config) => {
                        if let Err(err) = result {
                            error!("{} node {} exit: {}", name, addr, err);
                        }
                    }
                    _ = receiver => {
                        info!("{} node {} is stopped", name, addr);
                    }
                }
            });
        });
        self.notifiers.insert(addr.to_owned(), sender);
        self.handles.insert(addr.to_owned(), handle);
    }

    /// Start `n` nodes joining the first one, returns once all of them serve requests.
    pub async fn bootstrap_servers(&mut self, n: usize) -> Vec<String> {
        let mut nodes: Vec<String> = Vec::with_capacity(n);
        for i in 0..n {
            let addr = self.next_listen_address();
            let join = if i == 0 { None } else { Some(nodes[0].clone()) };
            self.spawn_server(&addr, join);
            node_client_with_retry(&addr).await;
            nodes.push(addr);
        }
        for addr in &nodes {
            kv_client_when_available(addr).await;
        }
        nodes
    }

    pub fn stop_server(&mut self, addr: &str) {
        self.notifiers.remove(addr);
        if let Some(handle) = self.handles.remove(addr) {
            handle.join().unwrap_or_default();
        }
    }

    pub fn shutdown(&mut self) {
        info!("{} shutdown cluster ...", self.name);
        let _ = std::mem::take(&mut self.notifiers);
        for (_, handle) in std::mem::take(&mut self.handles) {
            handle.join().unwrap_or_default();
        }
        info!("{} shutdown cluster success", self.name);
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        self.shutdown();
    }
}
