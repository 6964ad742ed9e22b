use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Serialize;

use crate::cli::RawArgs;
use crate::error_handling::RemoverError;

pub const DEFAULT_LOG_PATH: &str = "./log";

/// Installer technology an Office installation was deployed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ProductType {
    Store,
    ClickToRun,
    WindowsInstaller,
}

impl ProductType {
    /// Versions this technology ever shipped for.
    pub fn supported_versions(self) -> &'static [OfficeVersion] {
        match self {
            ProductType::Store => &[OfficeVersion::V16],
            ProductType::ClickToRun => &[OfficeVersion::V15, OfficeVersion::V16],
            ProductType::WindowsInstaller => &OfficeVersion::ALL,
        }
    }
}

impl FromStr for ProductType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "store" | "appx" => Ok(ProductType::Store),
            "clicktorun" | "c2r" => Ok(ProductType::ClickToRun),
            "windowsinstaller" | "msi" => Ok(ProductType::WindowsInstaller),
            _ => Err(format!(
                "unknown office product type '{}' (expected Store, ClickToRun or WindowsInstaller)",
                s
            )),
        }
    }
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProductType::Store => "Store",
            ProductType::ClickToRun => "ClickToRun",
            ProductType::WindowsInstaller => "WindowsInstaller",
        };
        f.write_str(name)
    }
}

/// Office major version. Closed set: 12 (2007), 14 (2010), 15 (2013), 16 (2016 and later).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum OfficeVersion {
    V12,
    V14,
    V15,
    V16,
}

impl OfficeVersion {
    pub const ALL: [OfficeVersion; 4] = [
        OfficeVersion::V12,
        OfficeVersion::V14,
        OfficeVersion::V15,
        OfficeVersion::V16,
    ];

    pub fn from_major(major: u32) -> Option<Self> {
        match major {
            12 => Some(OfficeVersion::V12),
            14 => Some(OfficeVersion::V14),
            15 => Some(OfficeVersion::V15),
            16 => Some(OfficeVersion::V16),
            _ => None,
        }
    }

    pub fn major(self) -> u32 {
        match self {
            OfficeVersion::V12 => 12,
            OfficeVersion::V14 => 14,
            OfficeVersion::V15 => 15,
            OfficeVersion::V16 => 16,
        }
    }

    /// The `NN.0` segment Office uses in registry paths.
    pub fn registry_segment(self) -> String {
        format!("{}.0", self.major())
    }

    pub fn marketing_name(self) -> &'static str {
        match self {
            OfficeVersion::V12 => "Office 2007",
            OfficeVersion::V14 => "Office 2010",
            OfficeVersion::V15 => "Office 2013",
            OfficeVersion::V16 => "Office 2016/2019/2021/365",
        }
    }
}

impl fmt::Display for OfficeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.major())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum WorkMode {
    #[default]
    Detect,
    Remove,
    Uninstall,
}

impl WorkMode {
    pub fn requires_elevation(self) -> bool {
        match self {
            WorkMode::Detect => false,
            WorkMode::Remove | WorkMode::Uninstall => true,
        }
    }
}

impl FromStr for WorkMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "detect" => Ok(WorkMode::Detect),
            "remove" => Ok(WorkMode::Remove),
            "uninstall" => Ok(WorkMode::Uninstall),
            _ => Err(format!(
                "unknown work mode '{}' (expected Detect, Remove or Uninstall)",
                s
            )),
        }
    }
}

impl fmt::Display for WorkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkMode::Detect => "Detect",
            WorkMode::Remove => "Remove",
            WorkMode::Uninstall => "Uninstall",
        };
        f.write_str(name)
    }
}

/// Console verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum OutputState {
    /// Errors only
    Quiet,
    /// Regular output
    #[default]
    Normal,
    /// Extra verbose output
    Verbose,
}

impl FromStr for OutputState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quiet" => Ok(OutputState::Quiet),
            "normal" => Ok(OutputState::Normal),
            "verbose" => Ok(OutputState::Verbose),
            _ => Err(format!(
                "unknown output state '{}' (expected Quiet, Normal or Verbose)",
                s
            )),
        }
    }
}

/// Validated invocation parameters. Only obtainable through [`validate`] or
/// [`ParsedArgs::new`], so product type and version are always present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedArgs {
    product_type: ProductType,
    version: OfficeVersion,
    work_mode: WorkMode,
    keep_activation_info: bool,
    no_restart: bool,
    log_path: PathBuf,
    output_state: OutputState,
    suppress_banner: bool,
    relaunched: bool,
}

impl ParsedArgs {
    pub fn new(product_type: ProductType, version: OfficeVersion) -> Self {
        Self {
            product_type,
            version,
            work_mode: WorkMode::default(),
            keep_activation_info: false,
            no_restart: false,
            log_path: PathBuf::from(DEFAULT_LOG_PATH),
            output_state: OutputState::default(),
            suppress_banner: false,
            relaunched: false,
        }
    }

    pub fn with_work_mode(mut self, work_mode: WorkMode) -> Self {
        self.work_mode = work_mode;
        self
    }

    pub fn with_keep_activation_info(mut self, keep: bool) -> Self {
        self.keep_activation_info = keep;
        self
    }

    pub fn with_no_restart(mut self, no_restart: bool) -> Self {
        self.no_restart = no_restart;
        self
    }

    pub fn with_relaunched(mut self, relaunched: bool) -> Self {
        self.relaunched = relaunched;
        self
    }

    pub fn with_log_path(mut self, log_path: PathBuf) -> Self {
        self.log_path = log_path;
        self
    }

    pub fn product_type(&self) -> ProductType {
        self.product_type
    }

    pub fn version(&self) -> OfficeVersion {
        self.version
    }

    pub fn work_mode(&self) -> WorkMode {
        self.work_mode
    }

    pub fn keep_activation_info(&self) -> bool {
        self.keep_activation_info
    }

    pub fn no_restart(&self) -> bool {
        self.no_restart
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn output_state(&self) -> OutputState {
        self.output_state
    }

    pub fn suppress_banner(&self) -> bool {
        self.suppress_banner
    }

    pub fn relaunched(&self) -> bool {
        self.relaunched
    }
}

/// Turns the raw option set into `ParsedArgs`, collecting every problem.
///
/// Pure: nothing is elevated, logged or mutated here, so a rejected argument
/// set never leaves side effects behind.
pub fn validate(raw: &RawArgs) -> Result<ParsedArgs, RemoverError> {
    let mut errors = Vec::new();

    let product_type = match raw.office_product_type.as_deref() {
        None => {
            errors.push("--office-product-type (-p) is required".to_string());
            None
        }
        Some(value) => value.parse::<ProductType>().map_err(|e| errors.push(e)).ok(),
    };

    let version = match raw.office_version.as_deref() {
        None => {
            errors.push("--office-version (-o) is required".to_string());
            None
        }
        Some(value) => parse_version(value).map_err(|e| errors.push(e)).ok(),
    };

    let work_mode = match raw.work_mode.as_deref() {
        None => Some(WorkMode::default()),
        Some(value) => value.parse::<WorkMode>().map_err(|e| errors.push(e)).ok(),
    };

    let output_state = match raw.output_state.as_deref() {
        None => Some(OutputState::default()),
        Some(value) => value.parse::<OutputState>().map_err(|e| errors.push(e)).ok(),
    };

    let log_path = match raw.log_path.as_deref() {
        None => Some(PathBuf::from(DEFAULT_LOG_PATH)),
        Some(value) if value.trim().is_empty() => {
            errors.push("--log-path (-l) must not be empty".to_string());
            None
        }
        Some(value) => Some(PathBuf::from(value)),
    };

    if let (Some(product_type), Some(version)) = (product_type, version)
        && !product_type.supported_versions().contains(&version)
    {
        let supported: Vec<String> = product_type
            .supported_versions()
            .iter()
            .map(|v| v.to_string())
            .collect();
        errors.push(format!(
            "{} installations only exist for office version(s) {}, not {}",
            product_type,
            supported.join(", "),
            version
        ));
    }

    match (product_type, version, work_mode, output_state, log_path) {
        (Some(product_type), Some(version), Some(work_mode), Some(output_state), Some(log_path))
            if errors.is_empty() =>
        {
            Ok(ParsedArgs {
                product_type,
                version,
                work_mode,
                keep_activation_info: raw.keep_activation_info,
                no_restart: raw.no_restart,
                log_path,
                output_state,
                suppress_banner: raw.no_copyright_logo,
                relaunched: raw.relaunched,
            })
        }
        _ => Err(RemoverError::Validation(errors)),
    }
}

fn parse_version(value: &str) -> Result<OfficeVersion, String> {
    let trimmed = value.trim();
    let major = trimmed.strip_suffix(".0").unwrap_or(trimmed);
    major
        .parse::<u32>()
        .ok()
        .and_then(OfficeVersion::from_major)
        .ok_or_else(|| {
            format!(
                "office version '{}' is not supported (expected one of 12, 14, 15, 16)",
                value
            )
        })
}
