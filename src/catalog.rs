//! Static knowledge about where each Office technology leaves its traces.

use std::path::{Path, PathBuf};

use crate::args::OfficeVersion;
use crate::registry::{Hive, RegistryKeyRef, RegistryView};
use crate::system::{KnownFolder, SystemOps};

pub const UNINSTALL_ROOT: &str = r"SOFTWARE\Microsoft\Windows\CurrentVersion\Uninstall";
pub const OSPP_ROOT: &str = r"SOFTWARE\Microsoft\OfficeSoftwareProtectionPlatform";
pub const STORE_PACKAGE_PREFIX: &str = "Microsoft.Office.Desktop";
pub const STORE_PUBLISHER_ID: &str = "8wekyb3d8bbwe";
pub const APPMODEL_PACKAGES: &str =
    r"Software\Classes\Local Settings\Software\Microsoft\Windows\CurrentVersion\AppModel\Repository\Packages";
pub const CLICK_TO_RUN_CLIENT: &str = "OfficeClickToRun.exe";
pub const DEFAULT_CULTURE: &str = "en-us";

/// Activation data inside an Office version root, relative to that root.
pub const ACTIVATION_SUBKEYS: [&str; 3] = [r"Common\Licensing", r"Common\Identity", "Registration"];

/// Both views an MSI or ClickToRun install can register under on 64-bit Windows.
pub const MACHINE_VIEWS: [RegistryView; 2] = [RegistryView::Native, RegistryView::Wow64_32];

/// `SOFTWARE\Microsoft\Office\NN.0` under the given hive.
pub fn office_root(hive: Hive, version: OfficeVersion) -> RegistryKeyRef {
    let software = if hive == Hive::CurrentUser { "Software" } else { "SOFTWARE" };
    RegistryKeyRef::new(hive, format!(r"{}\Microsoft\Office\{}", software, version.registry_segment()))
}

/// Recognises Office MSI product codes and returns their major version.
///
/// Office codes look like `{90160000-0011-0000-1000-0000000FF1CE}`: the two
/// digits after the release digit are the major version and the last group
/// always ends in `0FF1CE`.
pub fn office_product_code_version(code: &str) -> Option<OfficeVersion> {
    let upper = code.trim().to_ascii_uppercase();
    if !is_guid(&upper) || !upper.ends_with("0000000FF1CE}") {
        return None;
    }
    let bytes = upper.as_bytes();
    if bytes[1] != b'9' {
        return None;
    }
    upper[3..5].parse::<u32>().ok().and_then(OfficeVersion::from_major)
}

fn is_guid(s: &str) -> bool {
    let bytes = s.as_bytes();
    if bytes.len() != 38 || bytes[0] != b'{' || bytes[37] != b'}' {
        return false;
    }
    bytes[1..37].iter().enumerate().all(|(i, b)| match i {
        8 | 13 | 18 | 23 => *b == b'-',
        _ => b.is_ascii_hexdigit(),
    })
}

/// Windows Installer "packed" form of a product code, as used under
/// `Installer\Products`. The first three groups are reversed whole and every
/// byte of the last two groups has its nibbles swapped.
pub fn packed_guid(code: &str) -> Option<String> {
    let upper = code.trim().to_ascii_uppercase();
    if !is_guid(&upper) {
        return None;
    }
    let hex: String = upper[1..37].chars().filter(|c| *c != '-').collect();
    let mut packed = String::with_capacity(32);
    for (start, len) in [(0, 8), (8, 4), (12, 4)] {
        packed.extend(hex[start..start + len].chars().rev());
    }
    let tail: Vec<char> = hex[16..].chars().collect();
    for pair in tail.chunks(2) {
        packed.push(pair[1]);
        packed.push(pair[0]);
    }
    Some(packed)
}

/// Keys Windows Installer keeps for a product besides its Uninstall entry.
pub fn installer_residue(packed: &str) -> Vec<RegistryKeyRef> {
    vec![
        RegistryKeyRef::new(Hive::ClassesRoot, format!(r"Installer\Products\{}", packed)),
        RegistryKeyRef::new(Hive::ClassesRoot, format!(r"Installer\Features\{}", packed)),
        RegistryKeyRef::new(
            Hive::LocalMachine,
            format!(
                r"SOFTWARE\Microsoft\Windows\CurrentVersion\Installer\UserData\S-1-5-18\Products\{}",
                packed
            ),
        ),
    ]
}

/// Per-version layout of a ClickToRun installation.
pub struct ClickToRunLayout {
    pub config_root: RegistryKeyRef,
    pub service: &'static str,
    pub client: PathBuf,
    pub scheduled_tasks: &'static [&'static str],
    pub payload_dirs: Vec<PathBuf>,
    pub extra_keys: Vec<RegistryKeyRef>,
}

impl ClickToRunLayout {
    pub fn configuration(&self) -> RegistryKeyRef {
        self.config_root.child("Configuration")
    }
}

const C2R_TASKS_16: [&str; 6] = [
    r"\Microsoft\Office\Office Automatic Updates",
    r"\Microsoft\Office\Office Automatic Updates 2.0",
    r"\Microsoft\Office\Office ClickToRun Service Monitor",
    r"\Microsoft\Office\Office Feature Updates",
    r"\Microsoft\Office\Office Feature Updates Logon",
    r"\Microsoft\Office\Office Subscription Maintenance",
];

const C2R_TASKS_15: [&str; 2] = [
    r"\Microsoft\Office\Office 15 Subscription Heartbeat",
    r"\Microsoft\Office\Office Automatic Updates",
];

/// ClickToRun only exists for 15 and 16; `None` for older versions.
pub fn click_to_run_layout(version: OfficeVersion, system: &dyn SystemOps) -> Option<ClickToRunLayout> {
    let program_files = system.known_folder(KnownFolder::ProgramFiles);
    let program_files_x86 = system.known_folder(KnownFolder::ProgramFilesX86);
    let common = system.known_folder(KnownFolder::ProgramFilesCommon);
    let program_data = system.known_folder(KnownFolder::ProgramData);

    match version {
        OfficeVersion::V16 => Some(ClickToRunLayout {
            config_root: RegistryKeyRef::new(Hive::LocalMachine, r"SOFTWARE\Microsoft\Office\ClickToRun"),
            service: "ClickToRunSvc",
            client: common.join(r"Microsoft Shared\ClickToRun").join(CLICK_TO_RUN_CLIENT),
            scheduled_tasks: &C2R_TASKS_16,
            payload_dirs: vec![
                program_files.join(r"Microsoft Office\root"),
                program_files.join(r"Microsoft Office\Updates"),
                program_files_x86.join(r"Microsoft Office\root"),
                common.join(r"Microsoft Shared\ClickToRun"),
                program_data.join(r"Microsoft\ClickToRun"),
                program_data.join(r"Microsoft\Office\ClickToRunPackageLocker"),
            ],
            extra_keys: vec![RegistryKeyRef::new(Hive::LocalMachine, r"SOFTWARE\Microsoft\AppVISV")],
        }),
        OfficeVersion::V15 => Some(ClickToRunLayout {
            config_root: RegistryKeyRef::new(Hive::LocalMachine, r"SOFTWARE\Microsoft\Office\15.0\ClickToRun"),
            service: "OfficeSvc",
            client: program_files.join(r"Microsoft Office 15\ClientX64").join(CLICK_TO_RUN_CLIENT),
            scheduled_tasks: &C2R_TASKS_15,
            payload_dirs: vec![
                program_files.join("Microsoft Office 15"),
                program_files_x86.join("Microsoft Office 15"),
                program_data.join(r"Microsoft\ClickToRun"),
            ],
            extra_keys: Vec::new(),
        }),
        OfficeVersion::V12 | OfficeVersion::V14 => None,
    }
}

/// Local installation source MSI-based Office caches on the system drive.
pub fn msocache_dir(system: &dyn SystemOps) -> PathBuf {
    let program_files = system.known_folder(KnownFolder::ProgramFiles);
    let drive = program_files.ancestors().last().unwrap_or(Path::new(r"C:\"));
    drive.join("MSOCache")
}

/// Splits a comma separated `ProductReleaseIds` value.
pub fn release_ids(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(String::from)
        .collect()
}
