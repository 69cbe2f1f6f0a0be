//! Wiremock servers for tests that need a localhost socket.
//!
//! Sandboxed runners sometimes refuse to bind. Those tests are skipped with a
//! note on stderr unless `ARCHIVE_FETCH_REQUIRE_SOCKET_TESTS` is set, in which
//! case they fail.

use std::net::TcpListener;
use std::panic::Location;

use wiremock::MockServer;

const REQUIRE_ENV: &str = "ARCHIVE_FETCH_REQUIRE_SOCKET_TESTS";

fn skipping_forbidden() -> bool {
    std::env::var(REQUIRE_ENV)
        .is_ok_and(|value| matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
}

/// Starts a mock server, or returns `None` when localhost cannot be bound.
///
/// # Panics
///
/// When binding fails and skipping is forbidden.
#[track_caller]
pub fn start_mock_server_or_skip() -> impl Future<Output = Option<MockServer>> {
    let caller = Location::caller();
    let bindable = TcpListener::bind("127.0.0.1:0").is_ok();
    async move {
        if bindable {
            return Some(MockServer::start().await);
        }
        assert!(
            !skipping_forbidden(),
            "{caller}: cannot bind a localhost socket and {REQUIRE_ENV} is set"
        );
        eprintln!("{caller}: cannot bind a localhost socket, skipping");
        None
    }
}
