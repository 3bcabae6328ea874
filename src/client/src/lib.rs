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

mod conn_manager;
mod error;
mod kv_client;
mod membership_client;
mod node_client;

pub use crate::{
    conn_manager::ConnManager,
    error::{Error, Result},
    kv_client::KvClient,
    membership_client::MembershipClient,
    node_client::NodeClient,
};
