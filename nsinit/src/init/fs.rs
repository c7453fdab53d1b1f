use crate::{
    config::{Mount, Rootfs},
    sys::Syscall,
};
use anyhow::{Context, Result};
use log::debug;
use nix::{libc, mount::MsFlags};
use std::{io, path::Path};

/// Prepare the mount namespace and pivot into the configured root. Without a
/// rootfs only the propagation of `/` is changed.
pub fn setup_rootfs<S: Syscall>(sys: &S, rootfs: Option<&Rootfs>) -> Result<()> {
    let propagation = rootfs.map(|rootfs| rootfs.propagation).unwrap_or_default();
    debug!("Setting propagation of / to {}", propagation);
    sys.mount(None, Path::new("/"), None, propagation.flags(), None)
        .with_context(|| format!("failed to set propagation of / to {propagation}"))?;

    let Some(rootfs) = rootfs else {
        debug!("No rootfs configured");
        return Ok(());
    };

    // pivot_root requires the new root to be a mount point
    let root = rootfs.path.as_path();
    sys.mount(
        Some(root),
        root,
        None,
        MsFlags::MS_BIND | MsFlags::MS_REC,
        None,
    )
    .with_context(|| format!("failed to bind mount {}", root.display()))?;

    for mount in &rootfs.mounts {
        mount_below(sys, root, mount)?;
    }

    debug!("Pivot rooting to {}", root.display());
    sys.pivot_root(root)
        .with_context(|| format!("failed to pivot root to {}", root.display()))?;
    Ok(())
}

fn mount_below<S: Syscall>(sys: &S, root: &Path, mount: &Mount) -> Result<()> {
    let destination = mount
        .destination
        .strip_prefix("/")
        .unwrap_or(&mount.destination);
    let target = root.join(destination);
    let (flags, data) = parse_options(&mount.options);

    let error_msg = || {
        format!(
            "failed to mount '{}' of type '{}' on '{}' with flags '{:?}' and data '{}'",
            mount.source.clone().unwrap_or_default().display(),
            mount.fstype.as_deref().unwrap_or_default(),
            target.display(),
            flags,
            data.as_deref().unwrap_or_default(),
        )
    };

    debug!("Mounting {}", target.display());
    sys.mount(
        mount.source.as_deref(),
        &target,
        mount.fstype.as_deref(),
        flags,
        data.as_deref(),
    )
    .with_context(error_msg)?;

    // Bind mounts ignore MS_RDONLY and friends on the first call
    let remount = MsFlags::MS_RDONLY | MsFlags::MS_NOSUID | MsFlags::MS_NODEV | MsFlags::MS_NOEXEC;
    if flags.contains(MsFlags::MS_BIND) && flags.intersects(remount) {
        sys.mount(
            Some(&target),
            &target,
            None,
            flags | MsFlags::MS_REMOUNT,
            None,
        )
        .with_context(error_msg)?;
    }
    Ok(())
}

/// Split fstab style options into mount flags and filesystem data
pub(crate) fn parse_options(options: &[String]) -> (MsFlags, Option<String>) {
    let mut flags = MsFlags::empty();
    let mut data = Vec::new();
    for option in options {
        match option.as_str() {
            "ro" => flags.insert(MsFlags::MS_RDONLY),
            "rw" => flags.remove(MsFlags::MS_RDONLY),
            "bind" => flags.insert(MsFlags::MS_BIND),
            "rbind" => flags.insert(MsFlags::MS_BIND | MsFlags::MS_REC),
            "nosuid" => flags.insert(MsFlags::MS_NOSUID),
            "suid" => flags.remove(MsFlags::MS_NOSUID),
            "nodev" => flags.insert(MsFlags::MS_NODEV),
            "dev" => flags.remove(MsFlags::MS_NODEV),
            "noexec" => flags.insert(MsFlags::MS_NOEXEC),
            "exec" => flags.remove(MsFlags::MS_NOEXEC),
            "noatime" => flags.insert(MsFlags::MS_NOATIME),
            "relatime" => flags.insert(MsFlags::MS_RELATIME),
            "strictatime" => flags.insert(MsFlags::MS_STRICTATIME),
            "sync" => flags.insert(MsFlags::MS_SYNCHRONOUS),
            "private" => flags.insert(MsFlags::MS_PRIVATE),
            "rprivate" => flags.insert(MsFlags::MS_PRIVATE | MsFlags::MS_REC),
            "slave" => flags.insert(MsFlags::MS_SLAVE),
            "rslave" => flags.insert(MsFlags::MS_SLAVE | MsFlags::MS_REC),
            "shared" => flags.insert(MsFlags::MS_SHARED),
            "rshared" => flags.insert(MsFlags::MS_SHARED | MsFlags::MS_REC),
            other => data.push(other),
        }
    }
    let data = (!data.is_empty()).then(|| data.join(","));
    (flags, data)
}

fn errno(error: &io::Error) -> Option<i32> {
    error.raw_os_error()
}

/// Bind `path` onto itself and remount it read only. Missing paths are skipped.
pub fn remount_readonly<S: Syscall>(sys: &S, path: &Path) -> Result<()> {
    debug!("Remounting {} read only", path.display());
    match sys.mount(
        Some(path),
        path,
        None,
        MsFlags::MS_BIND | MsFlags::MS_REC,
        None,
    ) {
        Err(e) if errno(&e) == Some(libc::ENOENT) => {
            debug!("Skipping missing read only path {}", path.display());
            return Ok(());
        }
        result => result.with_context(|| format!("failed to bind mount {}", path.display()))?,
    }
    sys.mount(
        Some(path),
        path,
        None,
        MsFlags::MS_BIND | MsFlags::MS_REC | MsFlags::MS_REMOUNT | MsFlags::MS_RDONLY,
        None,
    )
    .with_context(|| format!("failed to remount {} read only", path.display()))
}

/// Hide `path` by mounting `/dev/null` over files and an empty read only
/// tmpfs over directories. Missing paths are skipped.
pub fn mask<S: Syscall>(sys: &S, path: &Path) -> Result<()> {
    debug!("Masking {}", path.display());
    match sys.mount(
        Some(Path::new("/dev/null")),
        path,
        None,
        MsFlags::MS_BIND,
        None,
    ) {
        Ok(()) => Ok(()),
        Err(e) if errno(&e) == Some(libc::ENOENT) => {
            debug!("Skipping missing masked path {}", path.display());
            Ok(())
        }
        Err(e) if errno(&e) == Some(libc::ENOTDIR) => sys
            .mount(
                Some(Path::new("tmpfs")),
                path,
                Some("tmpfs"),
                MsFlags::MS_RDONLY,
                None,
            )
            .with_context(|| format!("failed to mask directory {}", path.display())),
        Err(e) => Err(e).with_context(|| format!("failed to mask {}", path.display())),
    }
}

#[cfg(test)]
mod test {
    use super::{mask, parse_options, remount_readonly, setup_rootfs};
    use crate::{
        config::{Mount, Propagation, Rootfs},
        sys::fake::FakeSyscall,
    };
    use anyhow::Result;
    use nix::{errno::Errno, mount::MsFlags};
    use std::path::Path;

    fn options(options: &[&str]) -> Vec<String> {
        options.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn options_to_flags() {
        let (flags, data) = parse_options(&options(&["rbind", "ro", "nosuid", "mode=755"]));
        assert_eq!(
            flags,
            MsFlags::MS_BIND | MsFlags::MS_REC | MsFlags::MS_RDONLY | MsFlags::MS_NOSUID
        );
        assert_eq!(data.as_deref(), Some("mode=755"));
    }

    #[test]
    fn later_options_win() {
        let (flags, data) = parse_options(&options(&["ro", "rw"]));
        assert!(flags.is_empty());
        assert!(data.is_none());
    }

    #[test]
    fn rootfs_mounts_below_root() -> Result<()> {
        let sys = FakeSyscall::new();
        let rootfs = Rootfs {
            path: "/run/hello".into(),
            mounts: vec![
                Mount {
                    source: Some("proc".into()),
                    destination: "/proc".into(),
                    fstype: Some("proc".into()),
                    options: options(&["nosuid"]),
                },
                Mount {
                    source: Some("/data".into()),
                    destination: "data".into(),
                    fstype: None,
                    options: options(&["bind", "ro"]),
                },
            ],
            propagation: Propagation::Private,
        };
        setup_rootfs(&sys, Some(&rootfs))?;

        let events = sys.events();
        assert_eq!(events.len(), 6);
        assert!(events[0].starts_with("mount - / -"));
        assert!(events[0].contains("MS_PRIVATE"));
        assert!(events[1].starts_with("mount /run/hello /run/hello -"));
        assert!(events[2].starts_with("mount proc /run/hello/proc proc"));
        assert!(events[3].starts_with("mount /data /run/hello/data -"));
        assert!(events[4].starts_with("mount /run/hello/data /run/hello/data -"));
        assert!(events[4].contains("MS_REMOUNT"));
        assert_eq!(events[5], "pivot_root /run/hello");
        Ok(())
    }

    #[test]
    fn rootfs_without_root() -> Result<()> {
        let sys = FakeSyscall::new();
        setup_rootfs(&sys, None)?;
        let events = sys.events();
        assert_eq!(events.len(), 1);
        assert!(events[0].contains("MS_SLAVE"));
        Ok(())
    }

    #[test]
    fn readonly() -> Result<()> {
        let sys = FakeSyscall::new();
        remount_readonly(&sys, Path::new("/proc/sys"))?;
        let events = sys.events();
        assert_eq!(events.len(), 2);
        assert!(events[1].starts_with("mount /proc/sys /proc/sys -"));
        assert!(events[1].contains("MS_RDONLY"));
        Ok(())
    }

    #[test]
    fn readonly_missing() -> Result<()> {
        let sys = FakeSyscall::failing_with("mount", Errno::ENOENT);
        remount_readonly(&sys, Path::new("/proc/missing"))?;
        assert_eq!(sys.events().len(), 1);
        Ok(())
    }

    #[test]
    fn mask_file() -> Result<()> {
        let sys = FakeSyscall::new();
        mask(&sys, Path::new("/proc/kcore"))?;
        let events = sys.events();
        assert_eq!(events.len(), 1);
        assert!(events[0].starts_with("mount /dev/null /proc/kcore -"));
        Ok(())
    }

    #[test]
    fn mask_directory() -> Result<()> {
        let sys = FakeSyscall::failing_with("mount /dev/null", Errno::ENOTDIR);
        mask(&sys, Path::new("/proc/acpi"))?;
        let events = sys.events();
        assert_eq!(events.len(), 2);
        assert!(events[1].starts_with("mount tmpfs /proc/acpi tmpfs"));
        assert!(events[1].contains("MS_RDONLY"));
        Ok(())
    }

    #[test]
    fn mask_missing() -> Result<()> {
        let sys = FakeSyscall::failing_with("mount /dev/null", Errno::ENOENT);
        mask(&sys, Path::new("/proc/missing"))?;
        assert_eq!(sys.events().len(), 1);
        Ok(())
    }

    #[test]
    fn mask_failure() {
        let sys = FakeSyscall::failing("mount /dev/null");
        assert!(mask(&sys, Path::new("/proc/kcore")).is_err());
    }
}
