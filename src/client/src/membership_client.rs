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

#[derive(Debug, Clone)]
pub struct MembershipClient {
    client: membership_client::MembershipClient<Channel>,
}

impl MembershipClient {
    pub fn new(channel: Channel) -> Self {
        MembershipClient {
            client: membership_client::MembershipClient::new(channel),
        }
    }

    pub async fn connect(addr: String) -> Result<Self, tonic::transport::Error> {
        let addr = format!("http://{}", addr);
        let client = membership_client::MembershipClient::connect(addr).await?;
        Ok(Self { client })
    }

    /// Register `address` with the cluster, returns every node known after the registration.
    pub async fn register_node(&self, address: String) -> Result<Vec<String>, tonic::Status> {
        let mut client = self.client.clone();
        let res = client
            .register_node(RegisterNodeRequest { address })
            .await?;
        Ok(res.into_inner().existing_nodes)
    }
}
