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

use tonic_build::manual::{Builder, Method, Service};

const PACKAGE: &str = "ringkv.v1";
const CODEC: &str = "tonic::codec::ProstCodec";

fn method(name: &str, route: &str, input: &str, output: &str) -> Method {
    Method::builder()
        .name(name)
        .route_name(route)
        .input_type(format!("crate::v1::{}", input))
        .output_type(format!("crate::v1::{}", output))
        .codec_path(CODEC)
        .build()
}

fn main() {
    let node = Service::builder()
        .name("Node")
        .package(PACKAGE)
        .method(method("ping", "Ping", "PingRequest", "PingResponse"))
        .method(method("set", "Set", "SetRequest", "SetResponse"))
        .method(method("get", "Get", "GetRequest", "GetResponse"))
        .method(method("delete", "Delete", "DeleteRequest", "DeleteResponse"))
        .method(method(
            "batch_get",
            "BatchGet",
            "BatchGetRequest",
            "BatchGetResponse",
        ))
        .method(method(
            "batch_set",
            "BatchSet",
            "BatchSetRequest",
            "BatchSetResponse",
        ))
        .method(method(
            "batch_delete",
            "BatchDelete",
            "BatchDeleteRequest",
            "BatchDeleteResponse",
        ))
        .method(method(
            "batch_send",
            "BatchSend",
            "BatchSendRequest",
            "BatchSendResponse",
        ))
        .method(method(
            "add_node",
            "AddNode",
            "AddNodeRequest",
            "AddNodeResponse",
        ))
        .build();

    let kv = Service::builder()
        .name("Kv")
        .package(PACKAGE)
        .method(method("put", "Put", "PutRequest", "PutResponse"))
        .method(method("fetch", "Fetch", "FetchRequest", "FetchResponse"))
        .build();

    let membership = Service::builder()
        .name("Membership")
        .package(PACKAGE)
        .method(method(
            "register_node",
            "RegisterNode",
            "RegisterNodeRequest",
            "RegisterNodeResponse",
        ))
        .build();

    Builder::new().compile(&[node, kv, membership]);
}
