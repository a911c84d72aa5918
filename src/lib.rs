//! Browser-backed scraping service
//!
//! Many concurrent callers are multiplexed onto one lazily started
//! processing loop over one shared Chromium instance. Each request is
//! matched to its asynchronous result through a correlation id and bounded
//! by its own deadline, independent of the engine's lifecycle.

pub mod config;
pub mod correlation;
pub mod engine;
pub mod error;
pub mod logging;
pub mod page_handler;
pub mod server;
pub mod service;
pub mod types;
pub mod utils;

pub use config::{ServiceArgs, ServiceConfig};
pub use correlation::{CompletionHandle, RequestCorrelator, ResultStore};
pub use engine::{BrowserEngine, ChromiumEngine, EngineLifecycleManager, LivePage, PageSnapshot};
pub use error::{ErrorKind, ScrapeError};
pub use page_handler::PageHandler;
pub use server::{App, AppState, router, run_server};
pub use service::{ScrapeService, ServiceTimeouts};
pub use types::{FieldMap, PageWorkUnit, ScrapeMeta, ScrapeRequest, ScrapeResult, SelectorConfig, SelectorSpec};
