//! Waiting for the build container to get an address.

use crate::remote::Remote;
use lxb_lxd::InstanceState;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Attempt budget and spacing for the network poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessPolicy {
    pub attempts: u32,
    /// Sleep before each state query.
    pub interval: Duration,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            attempts: 20,
            interval: Duration::from_millis(2500),
        }
    }
}

/// Outcome of [`wait_for_network`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Usable address seen after `attempts` queries.
    Ready { attempts: u32 },
    /// Budget exhausted without an address.
    TimedOut { attempts: u32 },
    Cancelled,
}

/// True when some non-loopback interface is up with an IPv4 address.
pub fn has_usable_ipv4(state: &InstanceState) -> bool {
    state
        .interfaces()
        .filter(|(name, iface)| *name != "lo" && iface.state == "up")
        .flat_map(|(_, iface)| &iface.addresses)
        .any(|addr| addr.family == "inet" && addr.address != "127.0.0.1")
}

/// Poll the instance state until it reports a usable IPv4 address.
///
/// Query errors count as a failed attempt. Running out of attempts is not an
/// error: the build carries on without guaranteed networking.
pub async fn wait_for_network(
    remote: &dyn Remote,
    name: &str,
    policy: ReadinessPolicy,
    cancel: &CancellationToken,
) -> Readiness {
    let start = std::time::Instant::now();
    for attempt in 1..=policy.attempts {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!(instance = %name, attempt, "Network wait cancelled");
                return Readiness::Cancelled;
            }
            _ = tokio::time::sleep(policy.interval) => {}
        }

        match remote.instance_state(name).await {
            Ok(state) if has_usable_ipv4(&state) => {
                tracing::info!(
                    instance = %name,
                    attempt,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Network is up"
                );
                return Readiness::Ready { attempts: attempt };
            }
            Ok(_) => tracing::debug!(instance = %name, attempt, "No address yet"),
            Err(e) => tracing::debug!(instance = %name, attempt, error = %e, "State query failed"),
        }
    }

    tracing::warn!(
        instance = %name,
        attempts = policy.attempts,
        "Timed out waiting for network, continuing"
    );
    Readiness::TimedOut {
        attempts: policy.attempts,
    }
}
