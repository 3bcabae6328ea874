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

use std::sync::Arc;

use ringkv_api::v1::{
    kv_server::KvServer, membership_server::MembershipServer, node_server::NodeServer,
};
use ringkv_client::MembershipClient;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::{cluster::RemoteConnector, Config, Error, Result, Server};

/// The main entrance of ringkv server.
pub async fn run(config: Config) -> Result<()> {
    let listener = TcpListener::bind(&config.addr).await?;
    serve(config, listener).await
}

/// Serve on an already bound `listener`, joining the cluster of `config.join` if set.
pub async fn serve(config: Config, listener: TcpListener) -> Result<()> {
    config.validate()?;
    let connector = Arc::new(RemoteConnector::new(config.timeout.dial()));
    let server = Server::new(&config, connector)?;
    info!("node {} is serving", config.addr);

    let handle = tokio::spawn(bootstrap_services(listener, server.clone()));
    if let Some(seed) = &config.join {
        // The seed dials back while registering, so the services must be up already.
        if let Err(err) = join_cluster(&server, seed).await {
            error!("node {} join cluster of {}: {}", config.addr, seed, err);
            handle.abort();
            return Err(err);
        }
    }

    match handle.await {
        Ok(result) => result,
        Err(err) => Err(Error::Internal(format!("serve task: {}", err))),
    }
}

/// Listen and serve incoming rpc requests.
async fn bootstrap_services(listener: TcpListener, server: Server) -> Result<()> {
    use tokio_stream::wrappers::TcpListenerStream;
    use tonic::transport::Server;

    let listener = TcpListenerStream::new(listener);

    Server::builder()
        .add_service(NodeServer::new(server.clone()))
        .add_service(KvServer::new(server.clone()))
        .add_service(MembershipServer::new(server))
        .serve_with_incoming(listener)
        .await?;

    Ok(())
}

async fn join_cluster(server: &Server, seed: &str) -> Result<()> {
    let cluster = server.cluster();
    if seed == cluster.self_addr() {
        return Ok(());
    }

    let client = MembershipClient::connect(seed.to_owned()).await?;
    let existing_nodes = client
        .register_node(cluster.self_addr().to_owned())
        .await?;
    for addr in &existing_nodes {
        cluster.add_member(addr)?;
    }
    info!(
        "node {} join cluster of {}, members {:?}",
        cluster.self_addr(),
        seed,
        existing_nodes
    );
    Ok(())
}
