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

/// Whether `hash` falls into the half-open ring range `(low, high]`.
///
/// When `low >= high` the range crosses the zero point of the ring, and the predicate becomes
/// `hash <= high || hash > low`. Every component that evaluates a range must go through this
/// function.
#[inline]
pub fn hash_in_range(hash: u32, low: u32, high: u32) -> bool {
    if low < high {
        low < hash && hash <= high
    } else {
        hash <= high || hash > low
    }
}
