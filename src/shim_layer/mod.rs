// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
pub mod controller_runtime;
pub mod kube_store;
pub mod store;
