//! Guest messaging automation: trigger rules, rendering, and queueing.

pub mod scheduler;
pub mod template;
pub mod trigger;
pub mod writer;
