use super::{Error, IpLink, Link, Network, NetworkState, Strategy};
use log::debug;
use nix::unistd::Pid;

/// Loopback only networking. There is nothing to create on the host.
pub struct Loopback<L = IpLink> {
    link: L,
}

impl<L: Link> Loopback<L> {
    /// New loopback strategy operating on `link`
    pub fn new(link: L) -> Loopback<L> {
        Loopback { link }
    }
}

impl<L: Link> Strategy for Loopback<L> {
    fn name(&self) -> &'static str {
        "loopback"
    }

    fn create(&self, _: &Network, _: Pid, _: &mut NetworkState) -> Result<(), Error> {
        Ok(())
    }

    fn initialize(&self, _: &Network, _: &NetworkState) -> Result<(), Error> {
        debug!("Bringing up loopback interface");
        self.link.set_up("lo")
    }
}

#[cfg(test)]
mod test {
    use super::Loopback;
    use crate::network::{fake::FakeLink, Network, NetworkState, Strategy};
    use nix::unistd::Pid;

    #[test]
    fn create_is_noop() -> anyhow::Result<()> {
        let link = FakeLink::default();
        let loopback = Loopback::new(link.clone());
        let mut state = NetworkState::default();
        loopback.create(&Network::new("loopback"), Pid::from_raw(100), &mut state)?;
        assert!(link.events().is_empty());
        assert_eq!(state, NetworkState::default());
        Ok(())
    }

    #[test]
    fn initialize_brings_up_lo() -> anyhow::Result<()> {
        let link = FakeLink::default();
        let loopback = Loopback::new(link.clone());
        loopback.initialize(&Network::new("loopback"), &NetworkState::default())?;
        assert_eq!(link.events(), vec!["set_up lo"]);
        Ok(())
    }

    #[test]
    fn initialize_failure() {
        let loopback = Loopback::new(FakeLink::failing("set_up"));
        assert!(loopback
            .initialize(&Network::new("loopback"), &NetworkState::default())
            .is_err());
    }
}
