//! Constants for the download module (timeouts, retry spacing).

use std::time::Duration;

/// Per-attempt request timeout (30 seconds).
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Connect timeout applied by the HTTP client (10 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Fixed wait between attempts of the same resource.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// User-Agent sent with every request.
pub const USER_AGENT: &str = concat!("archive-fetch/", env!("CARGO_PKG_VERSION"));
