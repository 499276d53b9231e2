use std::fmt;

use serde::{Deserialize, Serialize};

#[cfg(target_arch = "x86_64")]
const ARCH: &str = "x86_64";

#[cfg(target_arch = "aarch64")]
const ARCH: &str = "aarch64";

#[cfg(target_os = "linux")]
const OS: &str = "linux";

#[cfg(target_os = "macos")]
const OS: &str = "darwin";

/// A target platform identifier, e.g. `x86_64-linux`. Resolution is
/// performed independently for every system a manifest declares.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct System(String);

impl System {
    pub fn new<P: AsRef<str>>(system: P) -> System {
        System(system.as_ref().to_string())
    }

    /// The system string of the host this binary was compiled for.
    pub fn current() -> System {
        System(format!("{}-{}", ARCH, OS))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for System {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for System {
    fn from(system: &str) -> System {
        System::new(system)
    }
}

impl fmt::Display for System {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
