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

use tonic::Code;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid argument {0}")]
    InvalidArgument(String),

    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("cluster is unavailable: {0}")]
    Unavailable(String),

    #[error("deadline is exceeded")]
    DeadlineExceeded,

    #[error("rpc {0}")]
    Rpc(tonic::Status),

    #[error("transport {0}")]
    Transport(#[from] tonic::transport::Error),
}

impl From<tonic::Status> for Error {
    fn from(status: tonic::Status) -> Self {
        match status.code() {
            Code::InvalidArgument => Error::InvalidArgument(status.message().to_owned()),
            Code::AlreadyExists => Error::AlreadyExists(status.message().to_owned()),
            Code::Unavailable => Error::Unavailable(status.message().to_owned()),
            Code::DeadlineExceeded => Error::DeadlineExceeded,
            _ => Error::Rpc(status),
        }
    }
}
