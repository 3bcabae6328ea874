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

use anyhow::{anyhow, Result};
use clap::Parser;
use ringkv_client::KvClient;

#[derive(Parser)]
#[clap(about = "Write a key unless it exists")]
pub struct PutCommand {
    /// Address of any node of the cluster.
    #[clap(long, default_value = "127.0.0.1:21805")]
    addr: String,

    key: String,
    value: String,
}

impl PutCommand {
    pub fn run(self) -> Result<()> {
        block_on(async move {
            let client = KvClient::connect(self.addr).await?;
            client.put(self.key, self.value.into_bytes()).await?;
            println!("OK");
            Ok(())
        })
    }
}

#[derive(Parser)]
#[clap(about = "Read a key")]
pub struct FetchCommand {
    /// Address of any node of the cluster.
    #[clap(long, default_value = "127.0.0.1:21805")]
    addr: String,

    key: String,
}

impl FetchCommand {
    pub fn run(self) -> Result<()> {
        block_on(async move {
            let client = KvClient::connect(self.addr).await?;
            match client.fetch(self.key.clone()).await? {
                Some(value) => println!("{}", String::from_utf8_lossy(&value)),
                None => return Err(anyhow!("key {} not found", self.key)),
            }
            Ok(())
        })
    }
}

fn block_on<F: std::future::Future<Output = Result<()>>>(f: F) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(f)
}
