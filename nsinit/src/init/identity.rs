use crate::{config::ContainerConfig, sys::Syscall};
use anyhow::{anyhow, Context, Result};
use caps::Capability;
use log::debug;
use std::{collections::HashSet, path::Path, str::FromStr};

/// First descriptor that is not stdio
const FIRST_NON_STDIO_FD: i32 = 3;

/// Parse capability names. Names are case insensitive and the `CAP_` prefix
/// is optional.
pub fn parse_capabilities<'a, I>(names: I) -> Result<HashSet<Capability>>
where
    I: IntoIterator<Item = &'a String>,
{
    names
        .into_iter()
        .map(|name| {
            let upper = name.trim().to_uppercase();
            let normalized = if upper.starts_with("CAP_") {
                upper
            } else {
                format!("CAP_{upper}")
            };
            Capability::from_str(&normalized).map_err(|_| anyhow!("invalid capability {name}"))
        })
        .collect()
}

/// Switch to the configured identity and enter `cwd`.
///
/// Descriptors above stdio are marked close on exec. Capabilities survive the
/// uid switch through keep caps and are narrowed to the configured set
/// afterwards. If no capability set is configured the sets are left alone.
pub fn finalize<S: Syscall>(sys: &S, config: &ContainerConfig, cwd: &Path) -> Result<()> {
    sys.close_exec_from(FIRST_NON_STDIO_FD)
        .context("failed to mark descriptors close on exec")?;

    let capabilities = config
        .capabilities
        .as_ref()
        .map(parse_capabilities)
        .transpose()?;

    if let Some(capabilities) = &capabilities {
        debug!("Dropping bounding set to {} capabilities", capabilities.len());
        sys.drop_bounding(capabilities)
            .context("failed to drop bounding set")?;
    }

    sys.set_keep_caps(true).context("failed to set keep caps")?;

    let user = &config.user;
    debug!(
        "Setting uid {}, gid {} and groups {:?}",
        user.uid, user.gid, user.additional_groups
    );
    sys.setgroups(&user.additional_groups)
        .context("failed to set supplementary groups")?;
    sys.setresgid(user.gid)
        .with_context(|| format!("failed to set gid to {}", user.gid))?;
    sys.setresuid(user.uid)
        .with_context(|| format!("failed to set uid to {}", user.uid))?;

    sys.set_keep_caps(false).context("failed to reset keep caps")?;

    if let Some(capabilities) = &capabilities {
        sys.set_capabilities(capabilities)
            .context("failed to set capabilities")?;
    }

    debug!("Changing working directory to {}", cwd.display());
    sys.chdir(cwd)
        .with_context(|| format!("failed to change directory to {}", cwd.display()))
}

#[cfg(test)]
mod test {
    use super::{finalize, parse_capabilities};
    use crate::{
        config::{ContainerConfig, User},
        sys::fake::FakeSyscall,
    };
    use anyhow::Result;
    use caps::Capability;
    use std::path::Path;

    fn config(capabilities: Option<&[&str]>) -> ContainerConfig {
        ContainerConfig {
            user: User {
                uid: 1000,
                gid: 1001,
                additional_groups: vec![20, 30],
            },
            capabilities: capabilities.map(|c| c.iter().map(ToString::to_string).collect()),
            ..ContainerConfig::default()
        }
    }

    #[test]
    fn parse() -> Result<()> {
        let names = ["CAP_CHOWN", "net_bind_service", "Kill"].map(String::from);
        let caps = parse_capabilities(&names)?;
        assert_eq!(caps.len(), 3);
        assert!(caps.contains(&Capability::CAP_CHOWN));
        assert!(caps.contains(&Capability::CAP_NET_BIND_SERVICE));
        assert!(caps.contains(&Capability::CAP_KILL));
        Ok(())
    }

    #[test]
    fn parse_invalid() {
        let names = ["CAP_FLY".to_string()];
        assert!(parse_capabilities(&names).is_err());
    }

    #[test]
    fn order() -> Result<()> {
        let sys = FakeSyscall::new();
        finalize(&sys, &config(Some(&["CAP_KILL"])), Path::new("/srv"))?;
        assert_eq!(
            sys.events(),
            vec![
                "close_exec_from 3",
                "drop_bounding CAP_KILL",
                "set_keep_caps true",
                "setgroups 20,30",
                "setresgid 1001",
                "setresuid 1000",
                "set_keep_caps false",
                "set_capabilities CAP_KILL",
                "chdir /srv",
            ]
        );
        Ok(())
    }

    #[test]
    fn capabilities_untouched() -> Result<()> {
        let sys = FakeSyscall::new();
        finalize(&sys, &config(None), Path::new("/"))?;
        assert!(!sys.called("drop_bounding"));
        assert!(!sys.called("set_capabilities"));
        assert!(sys.called("setresuid 1000"));
        Ok(())
    }

    #[test]
    fn invalid_capability_before_identity_change() {
        let sys = FakeSyscall::new();
        assert!(finalize(&sys, &config(Some(&["bogus"])), Path::new("/")).is_err());
        assert_eq!(sys.events(), vec!["close_exec_from 3"]);
    }

    #[test]
    fn uid_failure() {
        let sys = FakeSyscall::failing("setresuid");
        assert!(finalize(&sys, &config(None), Path::new("/")).is_err());
        assert_eq!(sys.events().last().map(String::as_str), Some("setresuid 1000"));
        assert!(!sys.called("chdir"));
    }
}
