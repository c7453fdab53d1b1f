//! Recording [`Link`] implementation for tests.

use super::{Error, Link};
use nix::unistd::Pid;
use std::sync::{Arc, Mutex};

/// Records link operations. Clones share the log. The operation named in
/// `failure` returns an error.
#[derive(Clone, Default)]
pub(crate) struct FakeLink {
    events: Arc<Mutex<Vec<String>>>,
    failure: Option<&'static str>,
}

impl FakeLink {
    pub fn failing(operation: &'static str) -> FakeLink {
        FakeLink {
            failure: Some(operation),
            ..FakeLink::default()
        }
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().expect("poisoned").clone()
    }

    fn record(&self, operation: &'static str, args: &[&str]) -> Result<(), Error> {
        let event = std::iter::once(operation)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");
        self.events.lock().expect("poisoned").push(event.clone());
        if self.failure == Some(operation) {
            Err(Error::Command(event, "operation not permitted".into()))
        } else {
            Ok(())
        }
    }
}

impl Link for FakeLink {
    fn add_veth(&self, host: &str, child: &str, _: Option<u32>) -> Result<(), Error> {
        self.record("add_veth", &[host, child])
    }

    fn delete(&self, name: &str) -> Result<(), Error> {
        self.record("delete", &[name])
    }

    fn set_master(&self, name: &str, bridge: &str) -> Result<(), Error> {
        self.record("set_master", &[name, bridge])
    }

    fn set_mtu(&self, name: &str, mtu: u32) -> Result<(), Error> {
        self.record("set_mtu", &[name, &mtu.to_string()])
    }

    fn set_up(&self, name: &str) -> Result<(), Error> {
        self.record("set_up", &[name])
    }

    fn set_down(&self, name: &str) -> Result<(), Error> {
        self.record("set_down", &[name])
    }

    fn set_netns(&self, name: &str, pid: Pid) -> Result<(), Error> {
        self.record("set_netns", &[name, &pid.to_string()])
    }

    fn rename(&self, name: &str, new_name: &str) -> Result<(), Error> {
        self.record("rename", &[name, new_name])
    }

    fn set_mac(&self, name: &str, mac: &str) -> Result<(), Error> {
        self.record("set_mac", &[name, mac])
    }

    fn add_address(&self, name: &str, address: &str) -> Result<(), Error> {
        self.record("add_address", &[name, address])
    }

    fn add_default_route(&self, name: &str, gateway: &str) -> Result<(), Error> {
        self.record("add_default_route", &[name, gateway])
    }
}
