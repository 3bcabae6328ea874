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

use crate::Server;

#[tonic::async_trait]
impl kv_server::Kv for Server {
    async fn put(&self, request: Request<PutRequest>) -> Result<Response<PutResponse>, Status> {
        let req = request.into_inner();
        self.coordinator.put(req.key, req.value).await?;
        Ok(Response::new(PutResponse {}))
    }

    async fn fetch(
        &self,
        request: Request<FetchRequest>,
    ) -> Result<Response<FetchResponse>, Status> {
        let req = request.into_inner();
        let value = self.coordinator.fetch(req.key.clone()).await?;
        Ok(Response::new(FetchResponse {
            key: req.key,
            value,
        }))
    }
}
