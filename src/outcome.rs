use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use tabled::{Table, Tabled, settings::Style};

use crate::args::{OfficeVersion, ProductType, WorkMode};
use crate::registry::RegistryKeyRef;

/// Result of attempting to remove a single target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RemovalOutcome {
    Succeeded,
    NotFound,
    AccessDenied,
    OtherFailure(String),
}

impl RemovalOutcome {
    /// `NotFound` is not a failure: the target is already gone.
    pub fn is_failure(&self) -> bool {
        matches!(self, RemovalOutcome::AccessDenied | RemovalOutcome::OtherFailure(_))
    }

    pub fn from_result(result: Result<(), RemovalOutcome>) -> Self {
        match result {
            Ok(()) => RemovalOutcome::Succeeded,
            Err(outcome) => outcome,
        }
    }

    pub fn from_io_error(err: &std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => RemovalOutcome::NotFound,
            std::io::ErrorKind::PermissionDenied => RemovalOutcome::AccessDenied,
            _ => match err.raw_os_error() {
                // ERROR_FILE_NOT_FOUND, ERROR_PATH_NOT_FOUND
                Some(2) | Some(3) => RemovalOutcome::NotFound,
                // ERROR_ACCESS_DENIED
                Some(5) => RemovalOutcome::AccessDenied,
                _ => RemovalOutcome::OtherFailure(err.to_string()),
            },
        }
    }
}

impl fmt::Display for RemovalOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemovalOutcome::Succeeded => write!(f, "Succeeded"),
            RemovalOutcome::NotFound => write!(f, "NotFound"),
            RemovalOutcome::AccessDenied => write!(f, "AccessDenied"),
            RemovalOutcome::OtherFailure(detail) => write!(f, "OtherFailure: {}", detail),
        }
    }
}

/// What a target is and which primitive removes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TargetKind {
    RegistryKey(RegistryKeyRef),
    Service(String),
    ScheduledTask(String),
    Directory(PathBuf),
    StorePackage(String),
    MsiProduct(String),
    ClickToRunProduct { client: PathBuf, release_id: String, culture: String, major: u32 },
}

impl TargetKind {
    pub fn label(&self) -> &'static str {
        match self {
            TargetKind::RegistryKey(_) => "Registry",
            TargetKind::Service(_) => "Service",
            TargetKind::ScheduledTask(_) => "Task",
            TargetKind::Directory(_) => "Directory",
            TargetKind::StorePackage(_) => "Package",
            TargetKind::MsiProduct(_) => "MSI",
            TargetKind::ClickToRunProduct { .. } => "ClickToRun",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetKind::RegistryKey(key) => write!(f, "{}", key),
            TargetKind::Service(name) => write!(f, "{}", name),
            TargetKind::ScheduledTask(path) => write!(f, "{}", path),
            TargetKind::Directory(path) => write!(f, "{}", path.display()),
            TargetKind::StorePackage(name) => write!(f, "{}", name),
            TargetKind::MsiProduct(code) => write!(f, "{}", code),
            TargetKind::ClickToRunProduct { release_id, culture, .. } => {
                write!(f, "{} ({})", release_id, culture)
            }
        }
    }
}

/// Whether a target belongs to the running product or to its installation record.
/// `Uninstall` removes both, `Remove` only components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TargetScope {
    Component,
    Installation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemovalTarget {
    pub kind: TargetKind,
    pub scope: TargetScope,
    /// Licensing/activation data, skipped entirely with `--keep-activation-info`.
    pub activation: bool,
}

impl RemovalTarget {
    pub fn component(kind: TargetKind) -> Self {
        Self { kind, scope: TargetScope::Component, activation: false }
    }

    pub fn installation(kind: TargetKind) -> Self {
        Self { kind, scope: TargetScope::Installation, activation: false }
    }

    pub fn activation(mut self) -> Self {
        self.activation = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetResult {
    pub target: RemovalTarget,
    pub outcome: RemovalOutcome,
}

#[derive(Tabled)]
struct ReportRow {
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Target")]
    target: String,
    #[tabled(rename = "Outcome")]
    outcome: String,
}

/// One outcome per attempted target, in attempt order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemovalReport {
    pub product_type: ProductType,
    pub version: OfficeVersion,
    pub work_mode: WorkMode,
    pub results: Vec<TargetResult>,
}

impl RemovalReport {
    pub fn new(product_type: ProductType, version: OfficeVersion, work_mode: WorkMode) -> Self {
        Self { product_type, version, work_mode, results: Vec::new() }
    }

    pub fn record(&mut self, target: RemovalTarget, outcome: RemovalOutcome) {
        self.results.push(TargetResult { target, outcome });
    }

    pub fn failures(&self) -> impl Iterator<Item = &TargetResult> {
        self.results.iter().filter(|r| r.outcome.is_failure())
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    /// True when at least one target was actually removed by this run.
    pub fn removed_anything(&self) -> bool {
        self.results.iter().any(|r| r.outcome == RemovalOutcome::Succeeded)
    }

    pub fn count(&self, predicate: impl Fn(&RemovalOutcome) -> bool) -> usize {
        self.results.iter().filter(|r| predicate(&r.outcome)).count()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} target(s): {} removed, {} already absent, {} failed",
            self.results.len(),
            self.count(|o| *o == RemovalOutcome::Succeeded),
            self.count(|o| *o == RemovalOutcome::NotFound),
            self.count(RemovalOutcome::is_failure),
        )
    }

    pub fn render_table(&self) -> String {
        let rows: Vec<ReportRow> = self
            .results
            .iter()
            .map(|r| ReportRow {
                kind: r.target.kind.label().to_string(),
                target: r.target.kind.to_string(),
                outcome: r.outcome.to_string(),
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        table.to_string()
    }
}
