//! Integration tests for lxb-lxd.
//!
//! These tests require:
//! - A running LXD daemon reachable through its Unix socket
//! - A trusted connection (membership of the `lxd` group)
//!
//! Run with: `cargo test -p lxb-lxd -- --ignored`

use lxb_lxd::{LxdClient, DIRECTORY_MANIPULATION};
use std::path::PathBuf;

fn socket_path() -> PathBuf {
    std::env::var("LXB_SOCKET")
        .map(PathBuf::from)
        .unwrap_or_else(|_| LxdClient::default_socket_path())
}

/// Connect and read the server description.
#[tokio::test]
#[ignore = "requires a local LXD daemon"]
async fn test_connect_reports_server_info() {
    let socket = socket_path();
    if !socket.exists() {
        eprintln!("Skipping test: {} not found", socket.display());
        eprintln!("Set LXB_SOCKET to the daemon socket");
        return;
    }

    let client = LxdClient::connect(&socket)
        .await
        .expect("Failed to connect to LXD");

    assert!(client.is_trusted(), "connection is not trusted by LXD");
    assert!(!client.server().api_version.is_empty());
    // Every LXD release since 2.x ships this extension
    assert!(client.has_extension(DIRECTORY_MANIPULATION));
}

/// Missing networks come back as `None`, not as an error.
#[tokio::test]
#[ignore = "requires a local LXD daemon"]
async fn test_missing_network_is_none() {
    let socket = socket_path();
    if !socket.exists() {
        eprintln!("Skipping test: {} not found", socket.display());
        return;
    }

    let client = LxdClient::connect(&socket)
        .await
        .expect("Failed to connect to LXD");

    let network = client
        .network("lxb-definitely-not-a-network")
        .await
        .expect("network lookup failed");
    assert!(network.is_none());
}
