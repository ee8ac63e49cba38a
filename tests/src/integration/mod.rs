//! Cross-crate pipeline scenarios.

#[cfg(test)]
mod support;

mod pipeline;
mod recovery;
mod reorg;
