//! Outbound delivery: gateway client, pacing, and the queue processor.

pub mod gateway;
pub mod pacer;
pub mod processor;
