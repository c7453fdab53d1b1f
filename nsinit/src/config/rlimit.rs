use serde::{Deserialize, Serialize};
use std::fmt;

/// Resource limits. See setrlimit(2)
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RLimitResource {
    /// Address space
    AS,
    /// Maximum size of core file
    CORE,
    /// CPU time limit in seconds
    CPU,
    /// Maximum size of the data segment
    DATA,
    /// Maximum size of files that the process may create
    FSIZE,
    /// Combined number of flock(2) locks and fcntl(2) leases
    LOCKS,
    /// Bytes of memory that may be locked into RAM
    MEMLOCK,
    /// Bytes that can be allocated for POSIX message queues
    MSGQUEUE,
    /// Ceiling of the nice value
    NICE,
    /// One greater than the maximum file descriptor number
    NOFILE,
    /// Number of threads of the real user id
    NPROC,
    /// Resident set in pages
    RSS,
    /// Ceiling on the real-time priority
    RTPRIO,
    /// CPU time in microseconds of a real-time process without a blocking call
    #[cfg(not(target_os = "android"))]
    RTTIME,
    /// Number of signals that may be queued
    SIGPENDING,
    /// Maximum size of the process stack
    STACK,
}

impl RLimitResource {
    pub(crate) fn resource(&self) -> rlimit::Resource {
        match self {
            RLimitResource::AS => rlimit::Resource::AS,
            RLimitResource::CORE => rlimit::Resource::CORE,
            RLimitResource::CPU => rlimit::Resource::CPU,
            RLimitResource::DATA => rlimit::Resource::DATA,
            RLimitResource::FSIZE => rlimit::Resource::FSIZE,
            RLimitResource::LOCKS => rlimit::Resource::LOCKS,
            RLimitResource::MEMLOCK => rlimit::Resource::MEMLOCK,
            RLimitResource::MSGQUEUE => rlimit::Resource::MSGQUEUE,
            RLimitResource::NICE => rlimit::Resource::NICE,
            RLimitResource::NOFILE => rlimit::Resource::NOFILE,
            RLimitResource::NPROC => rlimit::Resource::NPROC,
            RLimitResource::RSS => rlimit::Resource::RSS,
            RLimitResource::RTPRIO => rlimit::Resource::RTPRIO,
            #[cfg(not(target_os = "android"))]
            RLimitResource::RTTIME => rlimit::Resource::RTTIME,
            RLimitResource::SIGPENDING => rlimit::Resource::SIGPENDING,
            RLimitResource::STACK => rlimit::Resource::STACK,
        }
    }
}

impl fmt::Display for RLimitResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RLIMIT_{:?}", self)
    }
}

/// Value for a rlimit setting
#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RLimitValue {
    /// Soft limit value for resource. None indicates `unlimited`.
    pub soft: Option<u64>,
    /// Hard limit value for resource. None indicates `unlimited`.
    pub hard: Option<u64>,
}

impl RLimitValue {
    /// Soft and hard limit with `unlimited` mapped to `RLIM_INFINITY`
    pub fn limits(&self) -> (u64, u64) {
        (
            self.soft.unwrap_or(rlimit::INFINITY),
            self.hard.unwrap_or(rlimit::INFINITY),
        )
    }
}
