// Metrics module for observability
// Describes the lock protocol counters recorded by the dfs-lock and dfs-lock-cache crates

use metrics::describe_counter;

/// Initialize all metric descriptions
/// Should be called once at application startup
pub fn init_metrics() {
    // Lock authority
    describe_counter!(
        "lock_acquire_granted_total",
        "Total number of Acquire calls that granted a lock"
    );
    describe_counter!(
        "lock_acquire_denied_total",
        "Total number of Acquire calls that queued the caller"
    );
    describe_counter!(
        "lock_release_total",
        "Total number of releases by the current holder"
    );
    describe_counter!(
        "lock_revoke_sent_total",
        "Total number of revoke callbacks delivered"
    );
    describe_counter!(
        "lock_retry_sent_total",
        "Total number of retry callbacks delivered"
    );
    describe_counter!(
        "lock_callback_failures_total",
        "Total number of revoke or retry callbacks that could not be delivered"
    );

    // Lock cache
    describe_counter!(
        "lock_cache_hits_total",
        "Total number of acquires served from a cached grant"
    );
    describe_counter!(
        "lock_cache_rpc_acquire_total",
        "Total number of Acquire RPCs sent by the lock cache"
    );
    describe_counter!(
        "lock_cache_rpc_release_total",
        "Total number of Release RPCs sent by the lock cache"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_metrics_without_recorder() {
        // Descriptions are no-ops until a recorder is installed
        init_metrics();
        init_metrics();
    }
}
