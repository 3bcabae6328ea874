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

use std::{collections::HashMap, sync::RwLock};

use ringkv_api::{hash_in_range, v1::Pair};

use crate::{Error, Result};

/// The in-memory store of a node.
///
/// Each record remembers the replica slot it was written for, so the store is partitioned by slot.
/// A node holds at most one copy of a key, whatever its slot.
#[derive(Default)]
pub struct MemStore {
    core: RwLock<HashMap<String, Record>>,
}

#[derive(Clone, Debug)]
struct Record {
    hash: u32,
    value: Vec<u8>,
    replica_idx: u32,
    write_id: String,
}

impl Record {
    fn matches(&self, replica_idx: Option<u32>, low: u32, high: u32) -> bool {
        replica_idx.map_or(true, |idx| idx == self.replica_idx)
            && hash_in_range(self.hash, low, high)
    }
}

impl MemStore {
    pub fn new() -> Self {
        MemStore::default()
    }

    /// Insert a key. An existing key is never overwritten, so at most one write per key commits
    /// on a node.
    pub fn set(&self, pair: Pair, replica_idx: u32, write_id: String) -> Result<()> {
        let mut core = self.core.write().unwrap();
        if core.contains_key(&pair.key) {
            return Err(Error::AlreadyExists(format!(
                "key {} already exists",
                pair.key
            )));
        }
        core.insert(
            pair.key,
            Record {
                hash: pair.hash,
                value: pair.value,
                replica_idx,
                write_id,
            },
        );
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Pair> {
        let core = self.core.read().unwrap();
        core.get(key)
            .map(|record| Pair::new(key, record.hash, record.value.clone()))
            .ok_or_else(|| Error::NotFound(format!("key {} not found", key)))
    }

    /// Remove `key`. With a non-empty `write_id`, only a record written by that proposal is
    /// removed. Returns whether a record was removed.
    pub fn delete(&self, key: &str, write_id: &str) -> bool {
        let mut core = self.core.write().unwrap();
        match core.get(key) {
            Some(record) if write_id.is_empty() || record.write_id == write_id => {
                core.remove(key);
                true
            }
            _ => false,
        }
    }

    /// Every record whose hash is in `(low, high]`, ordered by hash.
    pub fn batch_get(&self, low: u32, high: u32) -> Vec<Pair> {
        self.scan(None, low, high)
    }

    /// The records of slot `replica_idx` whose hash is in `(low, high]`, ordered by hash.
    pub fn batch_get_slot(&self, replica_idx: u32, low: u32, high: u32) -> Vec<Pair> {
        self.scan(Some(replica_idx), low, high)
    }

    fn scan(&self, replica_idx: Option<u32>, low: u32, high: u32) -> Vec<Pair> {
        let core = self.core.read().unwrap();
        let mut pairs = core
            .iter()
            .filter(|(_, record)| record.matches(replica_idx, low, high))
            .map(|(key, record)| Pair::new(key.clone(), record.hash, record.value.clone()))
            .collect::<Vec<_>>();
        pairs.sort_unstable_by(|a, b| a.hash.cmp(&b.hash).then_with(|| a.key.cmp(&b.key)));
        pairs
    }

    /// Bulk load `pairs` into slot `replica_idx`, replacing existing copies.
    pub fn batch_set(&self, replica_idx: u32, pairs: Vec<Pair>) {
        let mut core = self.core.write().unwrap();
        for pair in pairs {
            core.insert(
                pair.key,
                Record {
                    hash: pair.hash,
                    value: pair.value,
                    replica_idx,
                    write_id: String::default(),
                },
            );
        }
    }

    /// Remove every record whose hash is in `(low, high]`, limited to slot `replica_idx` if set.
    /// Returns the number removed.
    pub fn batch_delete(&self, replica_idx: Option<u32>, low: u32, high: u32) -> usize {
        let mut core = self.core.write().unwrap();
        let before = core.len();
        core.retain(|_, record| !record.matches(replica_idx, low, high));
        before - core.len()
    }

    pub fn len(&self) -> usize {
        self.core.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The number of records held in slot `replica_idx`.
    pub fn partition_len(&self, replica_idx: u32) -> usize {
        let core = self.core.read().unwrap();
        core.values()
            .filter(|record| record.replica_idx == replica_idx)
            .count()
    }
}
