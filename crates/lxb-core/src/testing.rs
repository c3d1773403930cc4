//! Recording fake of [`Remote`] for unit tests.

use crate::remote::{ImagePublish, InstanceCreate, NetworkLister, Remote};
use async_trait::async_trait;
use lxb_lxd::{
    Action, InstanceState, LxdError, Network, NetworkAddress, NetworkInterface, Result,
};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    GetNetwork(String),
    Create(InstanceCreate),
    Action {
        name: String,
        action: Action,
        timeout_secs: i64,
        force: bool,
    },
    State(String),
    PushFile {
        destination: String,
        uid: Option<u32>,
        gid: Option<u32>,
        mode: u32,
        content: Vec<u8>,
    },
    PushDirectory {
        source: PathBuf,
        destination: String,
    },
    Publish(ImagePublish),
    Delete(String),
    Exec {
        argv: Vec<String>,
        env: BTreeMap<String, String>,
    },
}

/// Which operation should fail, for pipeline tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOn {
    Create,
    Start,
    Stop,
    Publish,
}

#[derive(Default)]
pub struct FakeRemote {
    calls: Mutex<Vec<Call>>,
    networks: BTreeMap<String, Network>,
    capabilities: BTreeSet<String>,
    /// `None` entries answer with an API error.
    states: Mutex<VecDeque<Option<InstanceState>>>,
    exit_codes: Mutex<VecDeque<i32>>,
    failing_pushes: BTreeSet<String>,
    fail_on: Option<FailOn>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_network(mut self, name: &str, kind: &str) -> Self {
        self.networks.insert(
            name.to_string(),
            Network {
                name: name.to_string(),
                kind: kind.to_string(),
                managed: true,
            },
        );
        self
    }

    pub fn with_capability(mut self, capability: &str) -> Self {
        self.capabilities.insert(capability.to_string());
        self
    }

    pub fn with_states(self, states: impl IntoIterator<Item = Option<InstanceState>>) -> Self {
        self.states.lock().unwrap().extend(states);
        self
    }

    pub fn with_exit_codes(self, codes: impl IntoIterator<Item = i32>) -> Self {
        self.exit_codes.lock().unwrap().extend(codes);
        self
    }

    pub fn failing_push(mut self, destination: &str) -> Self {
        self.failing_pushes.insert(destination.to_string());
        self
    }

    pub fn failing_on(mut self, fail_on: FailOn) -> Self {
        self.fail_on = Some(fail_on);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| predicate(c)).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn fail_if(&self, fail_on: FailOn) -> Result<()> {
        if self.fail_on == Some(fail_on) {
            return Err(api_error(&format!("{fail_on:?} failed")));
        }
        Ok(())
    }
}

pub fn api_error(message: &str) -> LxdError {
    LxdError::Api {
        code: 500,
        message: message.to_string(),
    }
}

/// A running state with `eth0` up on `address`.
pub fn state_with_address(address: &str) -> InstanceState {
    let mut network = BTreeMap::new();
    network.insert(
        "lo".to_string(),
        interface("up", vec![inet("127.0.0.1")]),
    );
    network.insert("eth0".to_string(), interface("up", vec![inet(address)]));
    InstanceState {
        status: "Running".into(),
        network,
    }
}

/// A running state with only loopback configured.
pub fn state_without_address() -> InstanceState {
    let mut network = BTreeMap::new();
    network.insert(
        "lo".to_string(),
        interface("up", vec![inet("127.0.0.1")]),
    );
    network.insert("eth0".to_string(), interface("up", Vec::new()));
    InstanceState {
        status: "Running".into(),
        network,
    }
}

pub fn interface(state: &str, addresses: Vec<NetworkAddress>) -> NetworkInterface {
    NetworkInterface {
        addresses,
        state: state.to_string(),
        kind: "broadcast".into(),
    }
}

pub fn inet(address: &str) -> NetworkAddress {
    NetworkAddress {
        family: "inet".into(),
        address: address.to_string(),
        netmask: "24".into(),
        scope: "global".into(),
    }
}

#[async_trait]
impl NetworkLister for FakeRemote {
    async fn get_network(&self, name: &str) -> Result<Option<Network>> {
        self.record(Call::GetNetwork(name.to_string()));
        Ok(self.networks.get(name).cloned())
    }
}

#[async_trait]
impl Remote for FakeRemote {
    async fn create_instance(&self, request: &InstanceCreate) -> Result<()> {
        self.record(Call::Create(request.clone()));
        self.fail_if(FailOn::Create)
    }

    async fn perform_action(
        &self,
        name: &str,
        action: Action,
        timeout_secs: i64,
        force: bool,
        _stateful: bool,
    ) -> Result<()> {
        self.record(Call::Action {
            name: name.to_string(),
            action,
            timeout_secs,
            force,
        });
        match action {
            Action::Start => self.fail_if(FailOn::Start),
            Action::Stop => self.fail_if(FailOn::Stop),
            _ => Ok(()),
        }
    }

    async fn instance_state(&self, name: &str) -> Result<InstanceState> {
        self.record(Call::State(name.to_string()));
        match self.states.lock().unwrap().pop_front() {
            Some(Some(state)) => Ok(state),
            Some(None) => Err(api_error("state unavailable")),
            None => Ok(state_with_address("10.0.3.15")),
        }
    }

    async fn push_file(
        &self,
        _name: &str,
        destination: &str,
        uid: Option<u32>,
        gid: Option<u32>,
        mode: u32,
        content: Vec<u8>,
    ) -> Result<()> {
        self.record(Call::PushFile {
            destination: destination.to_string(),
            uid,
            gid,
            mode,
            content,
        });
        if self.failing_pushes.contains(destination) {
            return Err(api_error("push rejected"));
        }
        Ok(())
    }

    async fn push_directory_recursive(
        &self,
        _name: &str,
        source: &Path,
        destination: &str,
    ) -> Result<()> {
        self.record(Call::PushDirectory {
            source: source.to_path_buf(),
            destination: destination.to_string(),
        });
        if self.failing_pushes.contains(destination) {
            return Err(api_error("push rejected"));
        }
        Ok(())
    }

    async fn publish_image(&self, _name: &str, request: &ImagePublish) -> Result<String> {
        self.record(Call::Publish(request.clone()));
        self.fail_if(FailOn::Publish)?;
        Ok("f00dfeed".to_string())
    }

    async fn delete_instance(&self, name: &str) -> Result<()> {
        self.record(Call::Delete(name.to_string()));
        Ok(())
    }

    async fn exec(
        &self,
        _name: &str,
        argv: &[String],
        env: &BTreeMap<String, String>,
        _cols: u16,
        _rows: u16,
    ) -> Result<i32> {
        self.record(Call::Exec {
            argv: argv.to_vec(),
            env: env.clone(),
        });
        Ok(self.exit_codes.lock().unwrap().pop_front().unwrap_or(0))
    }

    fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.contains(capability)
    }
}
