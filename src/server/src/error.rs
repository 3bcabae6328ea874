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

use crate::ring::RingError;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid argument {0}")]
    InvalidArgument(String),

    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("{0}")]
    AlreadyExists(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Aborted(String),

    #[error("canceled: {0}")]
    Canceled(String),

    #[error("internal {0}")]
    Internal(String),

    #[error("ring {0}")]
    Ring(#[from] RingError),

    #[error("rpc {0}")]
    Rpc(tonic::Status),

    #[error("transport {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("io {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// The status code a caller of this node observes for the error.
    pub fn code(&self) -> tonic::Code {
        use tonic::Code;

        match self {
            Error::InvalidArgument(_) => Code::InvalidArgument,
            Error::Unavailable(_) => Code::Unavailable,
            Error::AlreadyExists(_) => Code::AlreadyExists,
            Error::NotFound(_) => Code::NotFound,
            Error::Aborted(_) => Code::Aborted,
            Error::Canceled(_) => Code::Cancelled,
            Error::Internal(_) => Code::Internal,
            Error::Ring(RingError::NotEnoughNodes { .. }) => Code::Unavailable,
            Error::Ring(_) => Code::Internal,
            Error::Rpc(status) => status.code(),
            Error::Transport(_) => Code::Unavailable,
            Error::Io(_) => Code::Internal,
        }
    }
}

impl From<Error> for tonic::Status {
    fn from(e: Error) -> Self {
        use tonic::Status;

        match e {
            Error::InvalidArgument(msg) => Status::invalid_argument(msg),
            Error::Unavailable(msg) => Status::unavailable(msg),
            Error::AlreadyExists(msg) => Status::already_exists(msg),
            Error::NotFound(msg) => Status::not_found(msg),
            Error::Aborted(msg) => Status::aborted(msg),
            Error::Canceled(msg) => Status::cancelled(msg),
            Error::Internal(msg) => Status::internal(msg),
            Error::Rpc(status) => status,
            err @ Error::Ring(_) => Status::new(err.code(), err.to_string()),
            Error::Transport(inner) => Status::unavailable(inner.to_string()),
            Error::Io(inner) => inner.into(),
        }
    }
}

impl From<tonic::Status> for Error {
    fn from(status: tonic::Status) -> Self {
        use tonic::Code;

        let msg = status.message().to_owned();
        match status.code() {
            Code::InvalidArgument => Error::InvalidArgument(msg),
            Code::AlreadyExists => Error::AlreadyExists(msg),
            Code::NotFound => Error::NotFound(msg),
            Code::Aborted => Error::Aborted(msg),
            Code::Cancelled | Code::DeadlineExceeded => Error::Canceled(msg),
            _ => Error::Rpc(status),
        }
    }
}
