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

use ringkv_api::v1::*;
use tonic::transport::Channel;

/// Client of the peer primitives served by every node.
#[derive(Debug, Clone)]
pub struct NodeClient {
    client: node_client::NodeClient<Channel>,
}

impl NodeClient {
    pub fn new(channel: Channel) -> Self {
        NodeClient {
            client: node_client::NodeClient::new(channel),
        }
    }

    pub async fn connect(addr: String) -> Result<Self, tonic::transport::Error> {
        let addr = format!("http://{}", addr);
        let client = node_client::NodeClient::connect(addr).await?;
        Ok(Self { client })
    }

    pub async fn ping(&self) -> Result<(), tonic::Status> {
        let mut client = self.client.clone();
        client.ping(PingRequest {}).await?;
        Ok(())
    }

    pub async fn set(
        &self,
        pair: Pair,
        replica_idx: u32,
        write_id: String,
    ) -> Result<(), tonic::Status> {
        let mut client = self.client.clone();
        let req = SetRequest {
            key: pair.key,
            hash: pair.hash,
            value: pair.value,
            replica_idx,
            write_id,
        };
        client.set(req).await?;
        Ok(())
    }

    pub async fn get(&self, key: String) -> Result<Vec<u8>, tonic::Status> {
        let mut client = self.client.clone();
        let res = client.get(GetRequest { key }).await?;
        Ok(res.into_inner().value)
    }

    pub async fn delete(&self, key: String, write_id: String) -> Result<(), tonic::Status> {
        let mut client = self.client.clone();
        client.delete(DeleteRequest { key, write_id }).await?;
        Ok(())
    }

    pub async fn batch_get(&self, low: u32, high: u32) -> Result<Vec<Pair>, tonic::Status> {
        let mut client = self.client.clone();
        let res = client.batch_get(BatchGetRequest { low, high }).await?;
        Ok(res.into_inner().pairs)
    }

    pub async fn batch_set(&self, replica_idx: u32, pairs: Vec<Pair>) -> Result<(), tonic::Status> {
        let mut client = self.client.clone();
        client
            .batch_set(BatchSetRequest { replica_idx, pairs })
            .await?;
        Ok(())
    }

    pub async fn batch_delete(
        &self,
        replica_idx: Option<u32>,
        low: u32,
        high: u32,
    ) -> Result<(), tonic::Status> {
        let mut client = self.client.clone();
        client
            .batch_delete(BatchDeleteRequest {
                low,
                high,
                replica_idx,
            })
            .await?;
        Ok(())
    }

    /// Ask the node to read `(low, high]` of a slot locally and push it into `target`.
    pub async fn batch_send(&self, req: BatchSendRequest) -> Result<(), tonic::Status> {
        let mut client = self.client.clone();
        client.batch_send(req).await?;
        Ok(())
    }

    pub async fn add_node(&self, address: String) -> Result<(), tonic::Status> {
        let mut client = self.client.clone();
        client.add_node(AddNodeRequest { address }).await?;
        Ok(())
    }
}
