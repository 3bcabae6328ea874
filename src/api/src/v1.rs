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

include!(concat!(env!("OUT_DIR"), "/ringkv.v1.Node.rs"));
include!(concat!(env!("OUT_DIR"), "/ringkv.v1.Kv.rs"));
include!(concat!(env!("OUT_DIR"), "/ringkv.v1.Membership.rs"));

/// The unit of replication. `hash` is computed once by the coordinator and carried to every
/// replica.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Pair {
    #[prost(string, tag = "1")]
    pub key: String,
    #[prost(uint32, tag = "2")]
    pub hash: u32,
    #[prost(bytes = "vec", tag = "3")]
    pub value: Vec<u8>,
}

impl Pair {
    pub fn new(key: impl Into<String>, hash: u32, value: Vec<u8>) -> Self {
        Pair {
            key: key.into(),
            hash,
            value,
        }
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PingRequest {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PingResponse {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SetRequest {
    #[prost(string, tag = "1")]
    pub key: String,
    /// Supplied by the caller, never recomputed by the store.
    #[prost(uint32, tag = "2")]
    pub hash: u32,
    #[prost(bytes = "vec", tag = "3")]
    pub value: Vec<u8>,
    /// The replica slot this node holds the key in.
    #[prost(uint32, tag = "4")]
    pub replica_idx: u32,
    /// Id of the proposal that issued the write, empty for untracked writes.
    #[prost(string, tag = "5")]
    pub write_id: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SetResponse {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetRequest {
    #[prost(string, tag = "1")]
    pub key: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetResponse {
    #[prost(string, tag = "1")]
    pub key: String,
    #[prost(bytes = "vec", tag = "2")]
    pub value: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DeleteRequest {
    #[prost(string, tag = "1")]
    pub key: String,
    /// Only delete the record if it was written by this proposal. Empty deletes unconditionally.
    #[prost(string, tag = "2")]
    pub write_id: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DeleteResponse {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BatchGetRequest {
    #[prost(uint32, tag = "1")]
    pub low: u32,
    #[prost(uint32, tag = "2")]
    pub high: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BatchGetResponse {
    #[prost(message, repeated, tag = "1")]
    pub pairs: Vec<Pair>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BatchSetRequest {
    #[prost(uint32, tag = "1")]
    pub replica_idx: u32,
    #[prost(message, repeated, tag = "2")]
    pub pairs: Vec<Pair>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BatchSetResponse {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BatchDeleteRequest {
    #[prost(uint32, tag = "1")]
    pub low: u32,
    #[prost(uint32, tag = "2")]
    pub high: u32,
    /// Only remove records of this slot. Unset removes the range from every slot.
    #[prost(uint32, optional, tag = "3")]
    pub replica_idx: Option<u32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BatchDeleteResponse {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BatchSendRequest {
    #[prost(uint32, tag = "1")]
    pub from_replica_idx: u32,
    #[prost(uint32, tag = "2")]
    pub to_replica_idx: u32,
    /// Address of the node receiving the range.
    #[prost(string, tag = "3")]
    pub target: String,
    #[prost(uint32, tag = "4")]
    pub low: u32,
    #[prost(uint32, tag = "5")]
    pub high: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BatchSendResponse {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AddNodeRequest {
    #[prost(string, tag = "1")]
    pub address: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AddNodeResponse {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PutRequest {
    #[prost(string, tag = "1")]
    pub key: String,
    #[prost(bytes = "vec", optional, tag = "2")]
    pub value: Option<Vec<u8>>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PutResponse {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FetchRequest {
    #[prost(string, tag = "1")]
    pub key: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FetchResponse {
    #[prost(string, tag = "1")]
    pub key: String,
    #[prost(bytes = "vec", tag = "2")]
    pub value: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RegisterNodeRequest {
    #[prost(string, tag = "1")]
    pub address: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RegisterNodeResponse {
    #[prost(string, repeated, tag = "1")]
    pub existing_nodes: Vec<String>,
}
