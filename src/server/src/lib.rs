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

mod bootstrap;
pub mod cluster;
pub mod config;
pub mod coordinator;
mod error;
pub mod membership;
mod metrics;
pub mod ring;
mod service;
pub mod store;

pub use crate::{
    bootstrap::{run, serve},
    config::{Config, ConfigBuilder},
    error::{Error, Result},
    service::Server,
};
