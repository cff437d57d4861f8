// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
pub mod controls;
pub mod finalizer;
pub mod loader;
pub mod predicate;
pub mod reconcile;
pub mod render;
