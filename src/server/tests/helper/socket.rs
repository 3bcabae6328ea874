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

use std::net::{Ipv4Addr, SocketAddrV4};

use socket2::{Domain, SockAddr, Socket, Type};

/// A loopback address no listener holds right now. The socket sets `SO_REUSEADDR`, so the
/// node started on the address right after can bind it.
pub fn free_loopback_addr() -> String {
    let socket = Socket::new(Domain::IPV4, Type::STREAM, None).unwrap();
    socket.set_reuse_address(true).unwrap();
    let any_port = SockAddr::from(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0));
    socket.bind(&any_port).unwrap();
    let local = socket.local_addr().unwrap().as_socket().unwrap();
    local.to_string()
}
