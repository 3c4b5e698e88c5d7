/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types and traits that are used across both the leader-change and the state-transfer components.
//!
//! Types specific to a single component can be found in that component's own modules, e.g.,
//! [`crate::leader_change::messages`].

pub mod data_types;

pub mod crypto_primitives;
