pub mod batch;
pub mod client;
pub mod transport;
pub mod types;

#[cfg(test)]
pub mod testutil;
