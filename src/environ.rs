//! Host environment probing
//!
//! Maps os-release identification data and the raw machine architecture to a
//! normalized [`HostEnvironment`]. Resolution is two-stage: the `ID` field is
//! matched against known distributions first, then `ID_LIKE` is scanned for
//! family keywords before the host is declared unsupported. Probing never
//! mutates anything, so an unsupported host aborts the run cleanly.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use crate::error::{Result, ZagentError};

/// Operating-system family, grouping distributions that share package and
/// service management conventions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsFamily {
    Debian,
    Rhel,
    Suse,
    Windows,
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OsFamily::Debian => write!(f, "debian"),
            OsFamily::Rhel => write!(f, "rhel"),
            OsFamily::Suse => write!(f, "suse"),
            OsFamily::Windows => write!(f, "windows"),
        }
    }
}

/// Normalized machine architecture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arch {
    X86_64,
    Aarch64,
    /// Legacy 32-bit x86, explicitly excluded
    I686,
    /// Legacy 32-bit ARM, explicitly excluded
    Arm32,
}

impl Arch {
    /// RPM package architecture label
    pub fn rpm(&self) -> &'static str {
        match self {
            Arch::X86_64 => "x86_64",
            Arch::Aarch64 => "aarch64",
            Arch::I686 => "i686",
            Arch::Arm32 => "armv7hl",
        }
    }

    /// Whether the agent is not shipped for this architecture
    pub fn is_excluded(&self) -> bool {
        matches!(self, Arch::I686 | Arch::Arm32)
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arch::X86_64 => write!(f, "x86_64"),
            Arch::Aarch64 => write!(f, "aarch64"),
            Arch::I686 => write!(f, "i686"),
            Arch::Arm32 => write!(f, "arm32"),
        }
    }
}

/// Package-management mechanism for a family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Apt,
    Dnf,
    Zypper,
    Msi,
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageManager::Apt => write!(f, "apt"),
            PackageManager::Dnf => write!(f, "dnf"),
            PackageManager::Zypper => write!(f, "zypper"),
            PackageManager::Msi => write!(f, "msi"),
        }
    }
}

/// Normalized description of the host this run provisions
#[derive(Debug, Clone)]
pub struct HostEnvironment {
    pub family: OsFamily,
    pub distro_id: String,
    pub version_full: String,
    pub version_major: String,
    pub codename: String,
    pub arch: Arch,
    pub package_manager: PackageManager,
}

impl HostEnvironment {
    /// One-line description for the transcript
    pub fn describe(&self) -> String {
        let mut out = format!("{} {}", self.distro_id, self.version_full);
        if !self.codename.is_empty() {
            out.push_str(&format!(" ({})", self.codename));
        }
        out.push_str(&format!(
            ", {} family, {} via {}",
            self.family, self.arch, self.package_manager
        ));
        out
    }
}

/// Probe the host, reading os-release data on unix families.
///
/// On Windows there is no os-release file; the environment is constructed
/// directly from compile-time knowledge plus the runtime architecture.
pub fn detect(os_release_path: &Path) -> Result<HostEnvironment> {
    let arch = normalize_arch(std::env::consts::ARCH)?;

    if cfg!(windows) {
        return Ok(HostEnvironment {
            family: OsFamily::Windows,
            distro_id: "windows".to_string(),
            version_full: String::new(),
            version_major: String::new(),
            codename: String::new(),
            arch,
            package_manager: PackageManager::Msi,
        });
    }

    let text = std::fs::read_to_string(os_release_path).map_err(|e| {
        ZagentError::FileReadFailed {
            path: os_release_path.display().to_string(),
            reason: e.to_string(),
        }
    })?;
    probe(&text, std::env::consts::ARCH)
}

/// Resolve os-release text plus a raw architecture string into a
/// [`HostEnvironment`]
pub fn probe(os_release: &str, raw_arch: &str) -> Result<HostEnvironment> {
    let fields = parse_os_release(os_release);
    let arch = normalize_arch(raw_arch)?;

    let distro_id = fields.get("ID").cloned().unwrap_or_default();
    let family = family_from_id(&distro_id)
        .or_else(|| family_from_hint(fields.get("ID_LIKE").map(String::as_str).unwrap_or("")))
        .ok_or_else(|| ZagentError::EnvironmentUnsupported {
            detail: format!(
                "distribution '{}' does not map to a supported family",
                if distro_id.is_empty() {
                    "unknown"
                } else {
                    distro_id.as_str()
                }
            ),
        })?;

    if arch.is_excluded() {
        return Err(ZagentError::EnvironmentUnsupported {
            detail: format!("architecture '{raw_arch}' is not shipped for the agent"),
        });
    }

    let version_full = fields.get("VERSION_ID").cloned().unwrap_or_default();
    let version_major = version_full
        .split('.')
        .next()
        .unwrap_or_default()
        .to_string();
    let codename = fields.get("VERSION_CODENAME").cloned().unwrap_or_default();

    let package_manager = match family {
        OsFamily::Debian => PackageManager::Apt,
        OsFamily::Rhel => PackageManager::Dnf,
        OsFamily::Suse => PackageManager::Zypper,
        OsFamily::Windows => PackageManager::Msi,
    };

    Ok(HostEnvironment {
        family,
        distro_id,
        version_full,
        version_major,
        codename,
        arch,
        package_manager,
    })
}

/// Parse os-release `KEY=value` lines, stripping quotes
fn parse_os_release(text: &str) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let value = value.trim().trim_matches('"').trim_matches('\'');
            fields.insert(key.trim().to_string(), value.to_string());
        }
    }
    fields
}

fn family_from_id(id: &str) -> Option<OsFamily> {
    match id {
        "debian" | "ubuntu" | "raspbian" => Some(OsFamily::Debian),
        "rhel" | "centos" | "rocky" | "almalinux" | "ol" | "fedora" | "amzn" => {
            Some(OsFamily::Rhel)
        }
        "sles" | "sled" | "opensuse-leap" | "opensuse-tumbleweed" => Some(OsFamily::Suse),
        _ => None,
    }
}

/// Secondary resolution over the `ID_LIKE` keyword list
fn family_from_hint(id_like: &str) -> Option<OsFamily> {
    let hint = id_like.to_ascii_lowercase();
    if hint.contains("debian") || hint.contains("ubuntu") {
        Some(OsFamily::Debian)
    } else if hint.contains("rhel") || hint.contains("fedora") || hint.contains("centos") {
        Some(OsFamily::Rhel)
    } else if hint.contains("suse") {
        Some(OsFamily::Suse)
    } else {
        None
    }
}

/// Normalize a raw architecture string into the closed [`Arch`] set
pub fn normalize_arch(raw: &str) -> Result<Arch> {
    match raw {
        "x86_64" | "amd64" => Ok(Arch::X86_64),
        "aarch64" | "arm64" => Ok(Arch::Aarch64),
        "x86" | "i386" | "i486" | "i586" | "i686" => Ok(Arch::I686),
        "arm" | "armv6l" | "armv7l" => Ok(Arch::Arm32),
        other => Err(ZagentError::EnvironmentUnsupported {
            detail: format!("unrecognized architecture '{other}'"),
        }),
    }
}
