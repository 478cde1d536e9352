//! Route assembly from enriched hops.

pub mod assemble;

pub use assemble::assemble;
