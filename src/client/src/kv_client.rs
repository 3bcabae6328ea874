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
use tonic::{transport::Channel, Code};

use crate::{Error, Result};

/// Client of the coordinator surface. Any node of the cluster can coordinate a request.
#[derive(Debug, Clone)]
pub struct KvClient {
    client: kv_client::KvClient<Channel>,
}

impl KvClient {
    pub fn new(channel: Channel) -> Self {
        KvClient {
            client: kv_client::KvClient::new(channel),
        }
    }

    pub async fn connect(addr: String) -> Result<Self> {
        let addr = format!("http://{}", addr);
        let client = kv_client::KvClient::connect(addr).await?;
        Ok(Self { client })
    }

    pub async fn put(&self, key: impl Into<String>, value: Vec<u8>) -> Result<()> {
        let mut client = self.client.clone();
        let req = PutRequest {
            key: key.into(),
            value: Some(value),
        };
        client.put(req).await?;
        Ok(())
    }

    /// Fetch the value of `key`, `None` if the cluster agreed that the key is absent.
    pub async fn fetch(&self, key: impl Into<String>) -> Result<Option<Vec<u8>>> {
        let mut client = self.client.clone();
        let req = FetchRequest { key: key.into() };
        match client.fetch(req).await {
            Ok(res) => Ok(Some(res.into_inner().value)),
            Err(status) if status.code() == Code::NotFound => Ok(None),
            Err(status) => Err(Error::from(status)),
        }
    }
}
