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
use tonic::{Request, Response, Status};
use tracing::{debug, info};

use crate::{Error, Server};

#[tonic::async_trait]
impl node_server::Node for Server {
    async fn ping(&self, _: Request<PingRequest>) -> Result<Response<PingResponse>, Status> {
        Ok(Response::new(PingResponse {}))
    }

    async fn set(&self, request: Request<SetRequest>) -> Result<Response<SetResponse>, Status> {
        let req = request.into_inner();
        let pair = Pair::new(req.key, req.hash, req.value);
        self.store.set(pair, req.replica_idx, req.write_id)?;
        Ok(Response::new(SetResponse {}))
    }

    async fn get(&self, request: Request<GetRequest>) -> Result<Response<GetResponse>, Status> {
        let req = request.into_inner();
        let pair = self.store.get(&req.key)?;
        Ok(Response::new(GetResponse {
            key: pair.key,
            value: pair.value,
        }))
    }

    async fn delete(
        &self,
        request: Request<DeleteRequest>,
    ) -> Result<Response<DeleteResponse>, Status> {
        let req = request.into_inner();
        if self.store.delete(&req.key, &req.write_id) {
            debug!("delete key {} write {:?}", req.key, req.write_id);
        }
        Ok(Response::new(DeleteResponse {}))
    }

    async fn batch_get(
        &self,
        request: Request<BatchGetRequest>,
    ) -> Result<Response<BatchGetResponse>, Status> {
        let req = request.into_inner();
        let pairs = self.store.batch_get(req.low, req.high);
        Ok(Response::new(BatchGetResponse { pairs }))
    }

    async fn batch_set(
        &self,
        request: Request<BatchSetRequest>,
    ) -> Result<Response<BatchSetResponse>, Status> {
        let req = request.into_inner();
        debug!("batch set {} pairs to slot {}", req.pairs.len(), req.replica_idx);
        self.store.batch_set(req.replica_idx, req.pairs);
        Ok(Response::new(BatchSetResponse {}))
    }

    async fn batch_delete(
        &self,
        request: Request<BatchDeleteRequest>,
    ) -> Result<Response<BatchDeleteResponse>, Status> {
        let req = request.into_inner();
        let n = self.store.batch_delete(req.replica_idx, req.low, req.high);
        info!(
            "batch delete ({}, {}] slot {:?} removes {} keys",
            req.low, req.high, req.replica_idx, n
        );
        Ok(Response::new(BatchDeleteResponse {}))
    }

    async fn batch_send(
        &self,
        request: Request<BatchSendRequest>,
    ) -> Result<Response<BatchSendResponse>, Status> {
        let req = request.into_inner();
        if req.target.is_empty() {
            return Err(Error::InvalidArgument("target is empty".to_owned()).into());
        }
        let pairs = self
            .store
            .batch_get_slot(req.from_replica_idx, req.low, req.high);
        info!(
            "batch send ({}, {}] slot {} with {} keys to {} slot {}",
            req.low,
            req.high,
            req.from_replica_idx,
            pairs.len(),
            req.target,
            req.to_replica_idx
        );
        let target = self.cluster.peer_or_connect(&req.target)?;
        tokio::time::timeout(
            self.timeout.propagate(),
            target.batch_set(req.to_replica_idx, pairs),
        )
        .await
        .map_err(|_| Error::Canceled(format!("batch set to {} timeout", req.target)))??;
        Ok(Response::new(BatchSendResponse {}))
    }

    async fn add_node(
        &self,
        request: Request<AddNodeRequest>,
    ) -> Result<Response<AddNodeResponse>, Status> {
        let req = request.into_inner();
        if req.address.is_empty() {
            return Err(Error::InvalidArgument("address is empty".to_owned()).into());
        }
        self.cluster.add_member(&req.address)?;
        Ok(Response::new(AddNodeResponse {}))
    }
}
