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
use lazy_static::lazy_static;
use prometheus::*;

lazy_static! {
    pub static ref COORDINATOR_PUT_TOTAL: IntCounterVec = register_int_counter_vec!(
        "coordinator_put_total",
        "The total puts of coordinator, by quorum outcome",
        &["outcome"]
    )
    .unwrap();
    pub static ref COORDINATOR_FETCH_TOTAL: IntCounterVec = register_int_counter_vec!(
        "coordinator_fetch_total",
        "The total fetches of coordinator, by quorum outcome",
        &["outcome"]
    )
    .unwrap();
    pub static ref COORDINATOR_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "coordinator_request_duration_seconds",
        "The intervals of coordinator requests",
        &["type"],
        exponential_buckets(0.00005, 1.8, 26).unwrap(),
    )
    .unwrap();
    pub static ref MEMBERSHIP_REGISTER_TOTAL: IntCounterVec = register_int_counter_vec!(
        "membership_register_total",
        "The total node registrations, by kind",
        &["kind"]
    )
    .unwrap();
    pub static ref REBALANCE_INSTRUCTION_TOTAL: IntCounterVec = register_int_counter_vec!(
        "rebalance_instruction_total",
        "The total rebalance instructions, by result",
        &["result"]
    )
    .unwrap();
}

lazy_static! {
    static ref PUT_DURATION_SECONDS: Histogram =
        COORDINATOR_REQUEST_DURATION_SECONDS.with_label_values(&["put"]);
    static ref FETCH_DURATION_SECONDS: Histogram =
        COORDINATOR_REQUEST_DURATION_SECONDS.with_label_values(&["fetch"]);
}

pub fn take_put_metrics() -> &'static Histogram {
    &PUT_DURATION_SECONDS
}

pub fn take_fetch_metrics() -> &'static Histogram {
    &FETCH_DURATION_SECONDS
}
