pub mod config;
pub mod error;
pub mod fanout;
pub mod invoke;
pub mod pipeline;
pub mod run;
pub mod server;
pub mod shutdown;
pub mod store;
pub mod trigger;

#[cfg(test)]
pub(crate) mod testing;
