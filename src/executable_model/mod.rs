// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
pub mod api_server;
pub mod api_server_state;
pub mod fault_injection;

pub use api_server::ApiServer;
