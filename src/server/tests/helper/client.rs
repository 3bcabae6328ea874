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

use ringkv_api::v1::Pair;
use ringkv_client::{KvClient, NodeClient};

pub async fn node_client_with_retry(addr: &str) -> NodeClient {
    for _ in 0..1000 {
        match NodeClient::connect(addr.to_string()).await {
            Ok(client) => return client,
            Err(_) => {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        };
    }
    panic!("connect to {} timeout", addr);
}

/// A client of `addr` once its coordinator knows enough nodes to serve requests.
pub async fn kv_client_when_available(addr: &str) -> KvClient {
    let client = KvClient::connect(addr.to_string()).await.unwrap();
    for _ in 0..1000 {
        // Unavailable until the node knows the whole initial cluster.
        if client.fetch("ready-check").await.is_ok() {
            return client;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("node {} is not available", addr);
}

/// Every pair held by the node at `addr`.
pub async fn dump(addr: &str) -> Vec<Pair> {
    let client = node_client_with_retry(addr).await;
    client.batch_get(0, 0).await.unwrap()
}

/// Wait until `cond` holds on the pairs held by `addr`.
pub async fn wait_for_pairs<F>(addr: &str, cond: F) -> Vec<Pair>
where
    F: Fn(&[Pair]) -> bool,
{
    for _ in 0..500 {
        let pairs = dump(addr).await;
        if cond(&pairs) {
            return pairs;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("pairs of {} do not converge", addr);
}
