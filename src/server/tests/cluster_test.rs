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

mod helper;

use ringkv_client::Error;

use crate::helper::{client::*, context::*};

#[ctor::ctor]
fn init() {
    tracing_subscriber::fmt::init();
}

#[tokio::test(flavor = "multi_thread")]
async fn put_and_fetch() {
    let mut ctx = TestContext::new("cluster_test__put_and_fetch");
    let nodes = ctx.bootstrap_servers(3).await;

    let client = kv_client_when_available(&nodes[0]).await;
    client.put("test", b"hello".to_vec()).await.unwrap();

    for addr in &nodes {
        let client = kv_client_when_available(addr).await;
        let value = client.fetch("test").await.unwrap();
        assert_eq!(value.as_deref(), Some(b"hello".as_slice()));
    }

    assert!(client.fetch("missing").await.unwrap().is_none());
    assert!(matches!(
        client.put("", b"value".to_vec()).await,
        Err(Error::InvalidArgument(_))
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn first_write_wins() {
    let mut ctx = TestContext::new("cluster_test__first_write_wins");
    let nodes = ctx.bootstrap_servers(3).await;

    let client = kv_client_when_available(&nodes[1]).await;
    client.put("k", b"v1".to_vec()).await.unwrap();
    assert!(matches!(
        client.put("k", b"v2".to_vec()).await,
        Err(Error::AlreadyExists(_))
    ));

    // The reverted proposal must not remove the committed value.
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    let client = kv_client_when_available(&nodes[2]).await;
    let value = client.fetch("k").await.unwrap();
    assert_eq!(value.as_deref(), Some(b"v1".as_slice()));
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_puts_commit_at_most_once() {
    let mut ctx = TestContext::new("cluster_test__concurrent_puts_commit_at_most_once");
    let nodes = ctx.bootstrap_servers(3).await;

    let mut handles = vec![];
    for (i, addr) in nodes.iter().enumerate() {
        let client = kv_client_when_available(addr).await;
        handles.push(tokio::spawn(async move {
            let value = format!("value-{}", i).into_bytes();
            client.put("race", value.clone()).await.map(|_| value)
        }));
    }

    let mut committed = vec![];
    for handle in handles {
        if let Ok(value) = handle.await.unwrap() {
            committed.push(value);
        }
    }
    assert!(committed.len() <= 1, "{} puts committed", committed.len());

    if let Some(value) = committed.pop() {
        let client = kv_client_when_available(&nodes[0]).await;
        assert_eq!(client.fetch("race").await.unwrap(), Some(value));
    }
}
