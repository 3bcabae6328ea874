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

use std::fs;

use anyhow::Result;
use clap::Parser;
use ringkv_server::{Config, ConfigBuilder};
use tracing::info;

#[derive(Parser)]
#[clap(about = "Start a ringkv node")]
pub struct StartCommand {
    /// Address to listen on, also the id of the node in the ring.
    #[clap(long)]
    addr: Option<String>,

    /// Address of a node of the cluster to join. Starts a new cluster if absent.
    #[clap(long)]
    join: Option<String>,

    /// Number of nodes forming the initial cluster.
    #[clap(long)]
    min_servers: Option<usize>,

    /// Virtual nodes per node.
    #[clap(long)]
    weight: Option<usize>,

    /// Path to toml config file.
    #[clap(short, long)]
    config: Option<String>,
}

impl StartCommand {
    pub fn run(self) -> Result<()> {
        let values = match &self.config {
            None => None,
            Some(config) => {
                let config = fs::read_to_string(config)?;
                let values: ConfigBuilder = toml::from_str(&config)?;
                Some(values)
            }
        };
        let config = merge_configs(self, values)?;
        info!("start with config {:?}", config);

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        runtime.block_on(ringkv_server::run(config))?;
        Ok(())
    }
}

/// Merge configs from args and files, and prefer those from args to those from file.
fn merge_configs(args: StartCommand, values: Option<ConfigBuilder>) -> Result<Config> {
    let mut config_builder = values.unwrap_or_default();
    config_builder.merge(ConfigBuilder {
        addr: args.addr,
        join: args.join,
        min_servers: args.min_servers,
        weight: args.weight,
        ..Default::default()
    });
    Ok(config_builder.build()?)
}
