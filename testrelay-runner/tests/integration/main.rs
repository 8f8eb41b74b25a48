// Copyright (c) The testrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests that replay whole runs through the reporting state machine.

mod drain;
mod fixtures;
mod jest_input;
mod lifecycle;
