//! CLI command implementations
//!
//! Each submodule implements a specific CLI command.

pub mod simulate;
pub mod sweep;
pub mod trial;

use std::time::Duration;

use snoop_kernel::CancellationToken;
use tracing::info;

/// Token that cancels itself after `time_limit_secs`, if set.
pub(crate) fn time_limited_token(time_limit_secs: Option<u64>) -> CancellationToken {
    let token = CancellationToken::new();
    if let Some(secs) = time_limit_secs {
        info!("  Time limit: {}s", secs);
        // The timer thread is detached; it only flips the flag
        token.cancel_after(Duration::from_secs(secs));
    }
    token
}
