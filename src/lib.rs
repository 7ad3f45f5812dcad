//! Rate-limited, cached, retry-aware request pipeline for the Jikan
//! REST API.
//!
//! The crate turns an arbitrary number of logical resource requests
//! into a bounded stream of upstream calls:
//!
//! - [`cache`]: disk-backed response cache with lazy per-entry expiry
//! - [`queue`]: bounded FIFO releasing one job per rate-limit interval
//! - [`transport`]: one HTTP attempt with timeout and classification
//! - [`api`]: the `fetch`/`fetch_paginated` orchestration over the above
//! - [`heartbeat`]: independent upstream availability polling
//!
//! Resource schema mapping and navigation helpers live in consumers of
//! this crate, built on [`Client::pipeline`].
//!
//! # Example
//!
//! ```no_run
//! use jikan_pipeline::{Client, ClientOptions};
//!
//! # async fn example() -> jikan_pipeline::Result<()> {
//! let client = Client::new(ClientOptions::default())?;
//!
//! let anime = client
//!   .pipeline()
//!   .fetch("anime:5", "https://api.jikan.moe/v4/anime/5")
//!   .await?;
//! println!("{anime}");
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod cache;
mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod heartbeat;
pub mod queue;
pub mod time;
pub mod transport;

pub use api::RequestPipeline;
pub use client::Client;
pub use config::ClientOptions;
pub use error::{Error, Result, TransportError};
pub use events::DebugEvent;
pub use heartbeat::{HeartBeatMonitor, HeartBeatStatus};
