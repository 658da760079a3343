//! Replenishment math and the exported reconciliation snapshot.

pub mod export;
pub mod replenish;
