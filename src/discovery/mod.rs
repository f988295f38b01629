//! Join / Discovery Module
//!
//! Bootstraps a new member into a running cluster. The joining side probes
//! the configured rendezvous addresses (locators) to learn the current
//! coordinator, then requests admission from it; the answering side lives in
//! the service's receive path, where any member replies with the coordinator
//! of its installed view.
//!
//! ## Core Mechanisms
//! - **Bounded retry**: every locator is tried each round, for a configured
//!   number of rounds with jittered backoff between them. Exhaustion is
//!   fatal and surfaced, never silently looped.
//! - **Correlation tokens**: replies carry the request token, so stale or
//!   foreign datagrams are ignored and an abandoned attempt leaves no side
//!   effects behind.

pub mod client;

pub use client::{Admission, JoinClient};
