//! Shared browser engine: the browser seam, the Chromium implementation and
//! the lifecycle manager that feeds it pages.

pub mod browser;
pub mod lifecycle;
pub mod retry;
pub mod snapshot;
pub mod stealth;
pub mod traits;

pub use browser::{ChromiumEngine, EngineOptions};
pub use lifecycle::{EngineLifecycleManager, LoopOptions};
pub use snapshot::{PageSnapshot, SnapshotDocument};
pub use stealth::StealthProfile;
pub use traits::{BrowserEngine, LivePage};
