use std::collections::BTreeMap;

use super::{Host, OfficeProductStrategy, Presence, office_root_targets, ospp_target};
use crate::args::{OfficeVersion, ProductType};
use crate::catalog::{self, ClickToRunLayout};
use crate::outcome::{RemovalTarget, TargetKind};
use crate::registry::{Hive, RegistryKeyRef};

/// Values read from the ClickToRun configuration key for detection.
const REPORTED_VALUES: [&str; 4] = ["VersionToReport", "Platform", "ProductReleaseIds", "ClientCulture"];

/// Office streamed by the ClickToRun service.
pub struct ClickToRunProduct {
    version: OfficeVersion,
}

impl ClickToRunProduct {
    pub fn new(version: OfficeVersion) -> Self {
        Self { version }
    }

    fn layout(&self, host: &Host) -> Option<ClickToRunLayout> {
        catalog::click_to_run_layout(self.version, host.system)
    }

    /// ARP entries that hand their uninstall to the ClickToRun client.
    fn arp_entries(&self, host: &Host) -> Vec<RegistryKeyRef> {
        let mut entries = Vec::new();
        for view in catalog::MACHINE_VIEWS {
            let root = RegistryKeyRef::new(Hive::LocalMachine, catalog::UNINSTALL_ROOT).with_view(view);
            for name in host.registry.subkey_names(&root) {
                let entry = root.child(&name);
                let references_client = host
                    .registry
                    .string_value(&entry, "UninstallString")
                    .is_some_and(|s| s.to_lowercase().contains(&catalog::CLICK_TO_RUN_CLIENT.to_lowercase()));
                if references_client {
                    entries.push(entry);
                }
            }
        }
        entries
    }
}

impl OfficeProductStrategy for ClickToRunProduct {
    fn product_type(&self) -> ProductType {
        ProductType::ClickToRun
    }

    fn version(&self) -> OfficeVersion {
        self.version
    }

    fn detect(&self, host: &Host) -> Presence {
        let Some(layout) = self.layout(host) else {
            return Presence::Absent;
        };
        let configuration = layout.configuration();
        if !host.registry.key_exists(&configuration) {
            return Presence::Absent;
        }
        let mut metadata = BTreeMap::new();
        for name in REPORTED_VALUES {
            if let Some(value) = host.registry.string_value(&configuration, name) {
                metadata.insert(name.to_string(), value);
            }
        }
        Presence::Present { version: self.version, metadata }
    }

    fn plan(&self, host: &Host) -> Vec<RemovalTarget> {
        let Some(layout) = self.layout(host) else {
            return Vec::new();
        };
        let configuration = layout.configuration();
        let culture = host
            .registry
            .string_value(&configuration, "ClientCulture")
            .unwrap_or_else(|| catalog::DEFAULT_CULTURE.to_string());
        let releases = host
            .registry
            .string_value(&configuration, "ProductReleaseIds")
            .map(|v| catalog::release_ids(&v))
            .unwrap_or_default();

        // The client has to run before the service and its files disappear.
        let mut targets: Vec<RemovalTarget> = releases
            .into_iter()
            .map(|release_id| {
                RemovalTarget::installation(TargetKind::ClickToRunProduct {
                    client: layout.client.clone(),
                    release_id,
                    culture: culture.clone(),
                    major: self.version.major(),
                })
            })
            .collect();

        targets.push(RemovalTarget::component(TargetKind::Service(layout.service.to_string())));
        targets.extend(
            layout
                .scheduled_tasks
                .iter()
                .map(|task| RemovalTarget::component(TargetKind::ScheduledTask(task.to_string()))),
        );
        targets.push(RemovalTarget::component(TargetKind::RegistryKey(layout.config_root.clone())));
        targets.extend(
            layout
                .extra_keys
                .iter()
                .map(|key| RemovalTarget::component(TargetKind::RegistryKey(key.clone()))),
        );
        targets.extend(
            layout
                .payload_dirs
                .iter()
                .map(|dir| RemovalTarget::component(TargetKind::Directory(dir.clone()))),
        );

        targets.extend(
            self.arp_entries(host)
                .into_iter()
                .map(|entry| RemovalTarget::installation(TargetKind::RegistryKey(entry))),
        );
        targets.extend(office_root_targets(host, catalog::office_root(Hive::LocalMachine, self.version)));
        targets.extend(office_root_targets(host, catalog::office_root(Hive::CurrentUser, self.version)));
        targets.push(ospp_target());
        targets
    }

    fn requires_restart(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::{ParsedArgs, WorkMode};
    use crate::outcome::{RemovalOutcome, TargetScope};
    use crate::products::testing::{Fixture, activation_targets};
    use crate::registry::RegistryReader;

    fn installed_fixture() -> Fixture {
        let fixture = Fixture::new();
        let config = RegistryKeyRef::new(Hive::LocalMachine, r"SOFTWARE\Microsoft\Office\ClickToRun\Configuration");
        fixture.registry.set_value(&config, "VersionToReport", "16.0.17928.20156");
        fixture.registry.set_value(&config, "Platform", "x64");
        fixture.registry.set_value(&config, "ProductReleaseIds", "O365ProPlusRetail");
        fixture.registry.set_value(&config, "ClientCulture", "de-de");
        let arp = RegistryKeyRef::new(Hive::LocalMachine, catalog::UNINSTALL_ROOT).child("O365ProPlusRetail - de-de");
        fixture.registry.set_value(
            &arp,
            "UninstallString",
            r#""C:\Program Files\Common Files\Microsoft Shared\ClickToRun\OfficeClickToRun.exe" scenario=install"#,
        );
        let licensing = catalog::office_root(Hive::LocalMachine, OfficeVersion::V16).child(r"Common\Licensing");
        fixture.registry.add_key(&licensing);
        fixture.system.install("ClickToRunSvc");
        fixture.system.install(r"\Microsoft\Office\Office Automatic Updates 2.0");
        fixture
    }

    #[test]
    fn test_detect_reports_configuration() {
        let fixture = installed_fixture();
        let product = ClickToRunProduct::new(OfficeVersion::V16);
        match product.detect(&fixture.host()) {
            Presence::Present { version, metadata } => {
                assert_eq!(version, OfficeVersion::V16);
                assert_eq!(metadata["Platform"], "x64");
                assert_eq!(metadata["ProductReleaseIds"], "O365ProPlusRetail");
            }
            Presence::Absent => panic!("ClickToRun should be detected"),
        }
        assert!(fixture.registry.deletions().is_empty());
    }

    #[test]
    fn test_detect_absent_for_other_version() {
        let fixture = installed_fixture();
        assert_eq!(ClickToRunProduct::new(OfficeVersion::V15).detect(&fixture.host()), Presence::Absent);
        assert_eq!(ClickToRunProduct::new(OfficeVersion::V14).detect(&fixture.host()), Presence::Absent);
    }

    #[test]
    fn test_remove_stops_service_and_clears_configuration() {
        let fixture = installed_fixture();
        let product = ClickToRunProduct::new(OfficeVersion::V16);
        let args = ParsedArgs::new(ProductType::ClickToRun, OfficeVersion::V16).with_work_mode(WorkMode::Remove);
        let report = product.remove(&fixture.host(), &args);

        assert!(fixture.system.calls().contains(&"service:ClickToRunSvc".to_string()));
        assert!(!fixture.registry.key_exists(&RegistryKeyRef::new(
            Hive::LocalMachine,
            r"SOFTWARE\Microsoft\Office\ClickToRun"
        )));
        // Remove leaves the installation record alone.
        assert!(report.results.iter().all(|r| r.target.scope == TargetScope::Component));
        assert!(!fixture.system.calls().iter().any(|c| c.starts_with("c2r:")));
        assert!(!report.has_failures());
    }

    #[test]
    fn test_uninstall_runs_client_first_with_culture() {
        let fixture = installed_fixture();
        let product = ClickToRunProduct::new(OfficeVersion::V16);
        let args = ParsedArgs::new(ProductType::ClickToRun, OfficeVersion::V16).with_work_mode(WorkMode::Uninstall);
        let targets = product.targets(&fixture.host(), &args);

        match &targets[0].kind {
            TargetKind::ClickToRunProduct { release_id, culture, major, .. } => {
                assert_eq!(release_id, "O365ProPlusRetail");
                assert_eq!(culture, "de-de");
                assert_eq!(*major, 16);
            }
            other => panic!("expected the client uninstall first, got {:?}", other),
        }
        assert!(targets.iter().any(|t| matches!(&t.kind,
            TargetKind::RegistryKey(k) if k.path.to_lowercase().ends_with("o365proplusretail - de-de"))));
    }

    #[test]
    fn test_one_locked_target_does_not_stop_the_rest() {
        let fixture = installed_fixture();
        fixture.system.lock("ClickToRunSvc");
        let product = ClickToRunProduct::new(OfficeVersion::V16);
        let args = ParsedArgs::new(ProductType::ClickToRun, OfficeVersion::V16).with_work_mode(WorkMode::Remove);
        let report = product.remove(&fixture.host(), &args);

        assert_eq!(report.failures().count(), 1);
        assert_eq!(report.results.len(), product.targets(&fixture.host(), &args).len());
        let task = report
            .results
            .iter()
            .find(|r| r.target.kind == TargetKind::ScheduledTask(r"\Microsoft\Office\Office Automatic Updates 2.0".into()))
            .unwrap();
        assert_eq!(task.outcome, RemovalOutcome::Succeeded);
    }

    #[test]
    fn test_keep_activation_is_a_strict_subset() {
        let fixture = installed_fixture();
        let product = ClickToRunProduct::new(OfficeVersion::V16);
        for mode in [WorkMode::Remove, WorkMode::Uninstall] {
            let base = ParsedArgs::new(ProductType::ClickToRun, OfficeVersion::V16).with_work_mode(mode);
            let all = product.targets(&fixture.host(), &base);
            let kept = product.targets(&fixture.host(), &base.clone().with_keep_activation_info(true));
            assert!(!activation_targets(&all).is_empty(), "{:?}", mode);
            assert!(activation_targets(&kept).is_empty());
            assert!(kept.iter().all(|t| all.contains(t)));
            assert!(kept.len() < all.len());
        }
    }

    #[test]
    fn test_remove_clears_licensing_unless_kept() {
        let licensing = catalog::office_root(Hive::LocalMachine, OfficeVersion::V16).child(r"Common\Licensing");
        let product = ClickToRunProduct::new(OfficeVersion::V16);
        let args = ParsedArgs::new(ProductType::ClickToRun, OfficeVersion::V16).with_work_mode(WorkMode::Remove);

        let fixture = installed_fixture();
        product.remove(&fixture.host(), &args);
        assert!(!fixture.registry.key_exists(&licensing));

        let fixture = installed_fixture();
        product.remove(&fixture.host(), &args.clone().with_keep_activation_info(true));
        assert!(fixture.registry.key_exists(&licensing));
        assert!(!fixture.registry.deletions().contains(&licensing));
    }
}
