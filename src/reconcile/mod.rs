mod catalog;
mod peer_reconciler;
mod queue;
mod registrar;
mod worker;

pub use catalog::*;
pub use peer_reconciler::*;
pub use queue::*;
pub use registrar::*;
pub use worker::*;

#[cfg(test)]
mod peer_reconciler_test;
