#[macro_use]
pub(crate) mod common;

pub mod job;
pub mod ledger;
pub mod scheduler;
pub mod server;

#[cfg(test)]
mod tests;
