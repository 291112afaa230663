pub mod attachments;
pub mod blob;
pub mod config;
pub mod errors;
pub mod export;
pub mod logging;
pub mod mirror;
pub mod report;
pub mod session;
pub mod storage;

#[cfg(test)]
mod test_support;
