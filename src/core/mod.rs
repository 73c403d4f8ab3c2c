pub mod dependencies;
pub mod engine;
pub mod events;
pub mod executor;
pub mod fetcher;
pub mod filename;
pub mod formats;
pub mod process;
pub mod queue;
pub mod thumbnail;
pub mod ytdlp;

#[cfg(all(test, unix))]
pub(crate) mod test_support;
