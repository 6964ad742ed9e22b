mod click_to_run;
mod store;
mod windows_installer;

pub use click_to_run::ClickToRunProduct;
pub use store::StoreProduct;
pub use windows_installer::WindowsInstallerProduct;

use std::collections::BTreeMap;

use serde::Serialize;

use crate::args::{OfficeVersion, ParsedArgs, ProductType, WorkMode};
use crate::catalog;
use crate::logger::{Level, Logger};
use crate::outcome::{RemovalOutcome, RemovalReport, RemovalTarget, TargetKind, TargetScope};
use crate::registry::{Hive, Registry, RegistryKeyRef};
use crate::system::SystemOps;

/// The OS surfaces a strategy reads from and mutates.
pub struct Host<'a> {
    pub registry: &'a dyn Registry,
    pub system: &'a dyn SystemOps,
    pub logger: &'a Logger,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Presence {
    Present { version: OfficeVersion, metadata: BTreeMap<String, String> },
    Absent,
}

impl Presence {
    pub fn is_present(&self) -> bool {
        matches!(self, Presence::Present { .. })
    }
}

/// One removal procedure per installer technology.
pub trait OfficeProductStrategy {
    fn product_type(&self) -> ProductType;

    fn version(&self) -> OfficeVersion;

    /// Read-only check. Must not mutate anything and must work unelevated.
    fn detect(&self, host: &Host) -> Presence;

    /// Every target this technology knows, in execution order, before any
    /// work-mode or activation filtering.
    fn plan(&self, host: &Host) -> Vec<RemovalTarget>;

    /// Whether a successful teardown needs a reboot to finish.
    fn requires_restart(&self) -> bool;

    /// Targets for this invocation: installation-scope targets only in
    /// `Uninstall`, activation targets never with `--keep-activation-info`.
    fn targets(&self, host: &Host, args: &ParsedArgs) -> Vec<RemovalTarget> {
        self.plan(host)
            .into_iter()
            .filter(|t| args.work_mode() == WorkMode::Uninstall || t.scope == TargetScope::Component)
            .filter(|t| !(args.keep_activation_info() && t.activation))
            .collect()
    }

    /// Attempts every target and reports one outcome each. A failing target
    /// never stops the remaining ones.
    fn remove(&self, host: &Host, args: &ParsedArgs) -> RemovalReport {
        let mut report = RemovalReport::new(self.product_type(), self.version(), args.work_mode());
        for target in self.targets(host, args) {
            let label = target.kind.to_string();
            host.logger.target(Level::Debug, "target.attempt", &label, "Removing");
            let outcome = execute_target(host, &target.kind);
            log_outcome(host.logger, &label, &outcome);
            report.record(target, outcome);
        }
        report
    }
}

/// Picks the strategy for a technology. Adding a technology fails to compile here until handled.
pub fn strategy_for(product_type: ProductType, version: OfficeVersion) -> Box<dyn OfficeProductStrategy> {
    match product_type {
        ProductType::Store => Box::new(StoreProduct::new(version)),
        ProductType::ClickToRun => Box::new(ClickToRunProduct::new(version)),
        ProductType::WindowsInstaller => Box::new(WindowsInstallerProduct::new(version)),
    }
}

fn execute_target(host: &Host, kind: &TargetKind) -> RemovalOutcome {
    let result = match kind {
        TargetKind::RegistryKey(key) => host.registry.delete_subkey(key),
        TargetKind::Service(name) => host.system.stop_and_delete_service(name),
        TargetKind::ScheduledTask(path) => host.system.delete_scheduled_task(path),
        TargetKind::Directory(path) => host.system.remove_directory(path),
        TargetKind::StorePackage(full_name) => host.system.remove_store_package(full_name),
        TargetKind::MsiProduct(code) => host.system.uninstall_msi_product(code),
        TargetKind::ClickToRunProduct { client, release_id, culture, major } => {
            host.system.uninstall_click_to_run(client, release_id, culture, *major)
        }
    };
    RemovalOutcome::from_result(result)
}

fn log_outcome(logger: &Logger, label: &str, outcome: &RemovalOutcome) {
    match outcome {
        RemovalOutcome::Succeeded => logger.target(Level::Info, "target.outcome", label, "Removed"),
        RemovalOutcome::NotFound => logger.target(Level::Debug, "target.outcome", label, "Not found"),
        RemovalOutcome::AccessDenied => logger.target(Level::Warn, "target.outcome", label, "Access denied:"),
        RemovalOutcome::OtherFailure(detail) => {
            logger.target(Level::Warn, "target.outcome", label, &format!("Failed ({}):", detail))
        }
    }
}

fn registry_target(key: RegistryKeyRef) -> TargetKind {
    TargetKind::RegistryKey(key)
}

/// Targets that clear an Office version root while keeping activation data
/// separable. The activation subkeys are component-scope activation targets,
/// so `Remove` clears licensing unless `--keep-activation-info` is given.
/// Every other existing branch and then the root itself are installation
/// scope; the root is also tagged activation because it encloses that data.
pub(crate) fn office_root_targets(host: &Host, root: RegistryKeyRef) -> Vec<RemovalTarget> {
    let mut targets: Vec<RemovalTarget> = catalog::ACTIVATION_SUBKEYS
        .iter()
        .map(|sub| RemovalTarget::component(registry_target(root.child(sub))).activation())
        .collect();
    let preserved: Vec<String> = catalog::ACTIVATION_SUBKEYS.iter().map(|s| s.to_lowercase()).collect();
    for key in sweep_preserving(host.registry, &root, &preserved) {
        targets.push(RemovalTarget::installation(registry_target(key)));
    }
    targets.push(RemovalTarget::installation(registry_target(root)).activation());
    targets
}

/// The machine-wide Office Software Protection Platform licensing store.
pub(crate) fn ospp_target() -> RemovalTarget {
    RemovalTarget::component(registry_target(RegistryKeyRef::new(Hive::LocalMachine, catalog::OSPP_ROOT)))
        .activation()
}

/// Existing branches below `root` that contain none of the `preserved`
/// relative paths (lower-case, backslash separated).
fn sweep_preserving(registry: &dyn Registry, root: &RegistryKeyRef, preserved: &[String]) -> Vec<RegistryKeyRef> {
    let mut keys = Vec::new();
    for name in registry.subkey_names(root) {
        let lower = name.to_lowercase();
        if preserved.iter().any(|p| *p == lower) {
            continue;
        }
        let prefix = format!("{}\\", lower);
        let nested: Vec<String> = preserved
            .iter()
            .filter_map(|p| p.strip_prefix(&prefix).map(String::from))
            .collect();
        let child = root.child(&name);
        if nested.is_empty() {
            keys.push(child);
        } else {
            keys.extend(sweep_preserving(registry, &child, &nested));
        }
    }
    keys
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::registry::mock::MockRegistry;
    use crate::system::mock::MockSystem;

    pub struct Fixture {
        pub registry: MockRegistry,
        pub system: MockSystem,
        pub logger: Logger,
    }

    impl Fixture {
        pub fn new() -> Self {
            Self { registry: MockRegistry::new(), system: MockSystem::new(), logger: Logger::silent() }
        }

        pub fn host(&self) -> Host<'_> {
            Host { registry: &self.registry, system: &self.system, logger: &self.logger }
        }
    }

    pub fn activation_targets(targets: &[RemovalTarget]) -> Vec<&RemovalTarget> {
        targets.iter().filter(|t| t.activation).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::testing::Fixture;
    use super::*;

    #[test]
    fn test_sweep_skips_activation_branches() {
        let fixture = Fixture::new();
        let root = catalog::office_root(Hive::CurrentUser, OfficeVersion::V16);
        fixture.registry.add_key(&root.child(r"Common\Licensing\Data"));
        fixture.registry.add_key(&root.child(r"Common\General"));
        fixture.registry.add_key(&root.child(r"Word\Options"));
        fixture.registry.add_key(&root.child("Registration"));

        let preserved: Vec<String> = catalog::ACTIVATION_SUBKEYS.iter().map(|s| s.to_lowercase()).collect();
        let swept: Vec<String> = sweep_preserving(&fixture.registry, &root, &preserved)
            .into_iter()
            .map(|k| k.path.to_lowercase())
            .collect();
        assert_eq!(
            swept,
            vec![
                r"software\microsoft\office\16.0\common\general".to_string(),
                r"software\microsoft\office\16.0\word".to_string(),
            ]
        );
    }

    #[test]
    fn test_root_targets_order_activation_before_root() {
        let fixture = Fixture::new();
        let root = catalog::office_root(Hive::LocalMachine, OfficeVersion::V16);
        fixture.registry.add_key(&root.child("Excel"));
        let targets = office_root_targets(&fixture.host(), root.clone());
        let last = targets.last().unwrap();
        assert_eq!(last.kind, TargetKind::RegistryKey(root));
        assert!(last.activation);
        assert_eq!(last.scope, TargetScope::Installation);
        assert_eq!(targets.iter().filter(|t| !t.activation).count(), 1);
    }

    #[test]
    fn test_activation_subkeys_are_component_scope() {
        let fixture = Fixture::new();
        let root = catalog::office_root(Hive::CurrentUser, OfficeVersion::V16);
        let targets = office_root_targets(&fixture.host(), root.clone());
        let licensing = targets
            .iter()
            .find(|t| t.kind == TargetKind::RegistryKey(root.child(r"Common\Licensing")))
            .unwrap();
        assert!(licensing.activation);
        assert_eq!(licensing.scope, TargetScope::Component);
        assert_eq!(ospp_target().scope, TargetScope::Component);
        assert!(ospp_target().activation);
    }

    #[test]
    fn test_strategy_for_matches_product_type() {
        for product in [ProductType::Store, ProductType::ClickToRun, ProductType::WindowsInstaller] {
            let strategy = strategy_for(product, OfficeVersion::V16);
            assert_eq!(strategy.product_type(), product);
            assert_eq!(strategy.version(), OfficeVersion::V16);
        }
    }
}
