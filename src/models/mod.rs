//! Domain model module declarations.

pub mod automation;
pub mod conversation;
pub mod message;
pub mod property;
pub mod stay;
