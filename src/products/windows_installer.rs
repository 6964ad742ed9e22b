use std::collections::BTreeMap;

use super::{Host, OfficeProductStrategy, Presence, office_root_targets, ospp_target};
use crate::args::{OfficeVersion, ProductType};
use crate::catalog;
use crate::outcome::{RemovalTarget, TargetKind};
use crate::registry::{Hive, RegistryKeyRef, RegistryView};

/// Office installed from MSI packages.
pub struct WindowsInstallerProduct {
    version: OfficeVersion,
}

/// An Office product code registered under one or both machine views.
struct InstalledCode {
    code: String,
    views: Vec<RegistryView>,
    display_name: Option<String>,
    display_version: Option<String>,
}

impl WindowsInstallerProduct {
    pub fn new(version: OfficeVersion) -> Self {
        Self { version }
    }

    /// Office product codes of this version, in registry order.
    fn installed_codes(&self, host: &Host) -> Vec<InstalledCode> {
        let mut found: Vec<InstalledCode> = Vec::new();
        for view in catalog::MACHINE_VIEWS {
            let root = RegistryKeyRef::new(Hive::LocalMachine, catalog::UNINSTALL_ROOT).with_view(view);
            for name in host.registry.subkey_names(&root) {
                if catalog::office_product_code_version(&name) != Some(self.version) {
                    continue;
                }
                let code = name.to_ascii_uppercase();
                let entry = root.child(&name);
                match found.iter_mut().find(|c| c.code == code) {
                    Some(existing) => existing.views.push(view),
                    None => found.push(InstalledCode {
                        display_name: host.registry.string_value(&entry, "DisplayName"),
                        display_version: host.registry.string_value(&entry, "DisplayVersion"),
                        code,
                        views: vec![view],
                    }),
                }
            }
        }
        found
    }
}

impl OfficeProductStrategy for WindowsInstallerProduct {
    fn product_type(&self) -> ProductType {
        ProductType::WindowsInstaller
    }

    fn version(&self) -> OfficeVersion {
        self.version
    }

    fn detect(&self, host: &Host) -> Presence {
        let codes = self.installed_codes(host);
        if codes.is_empty() {
            return Presence::Absent;
        }
        let mut metadata = BTreeMap::new();
        for installed in codes {
            let description = match (installed.display_name, installed.display_version) {
                (Some(name), Some(version)) => format!("{} {}", name, version),
                (Some(name), None) => name,
                (None, Some(version)) => version,
                (None, None) => String::new(),
            };
            metadata.insert(installed.code, description);
        }
        Presence::Present { version: self.version, metadata }
    }

    fn plan(&self, host: &Host) -> Vec<RemovalTarget> {
        let mut targets = Vec::new();
        for installed in self.installed_codes(host) {
            targets.push(RemovalTarget::component(TargetKind::MsiProduct(installed.code.clone())));
            // msiexec normally clears these; whatever it leaves behind still goes.
            for view in &installed.views {
                let entry = RegistryKeyRef::new(Hive::LocalMachine, catalog::UNINSTALL_ROOT)
                    .with_view(*view)
                    .child(&installed.code);
                targets.push(RemovalTarget::component(TargetKind::RegistryKey(entry)));
            }
            if let Some(packed) = catalog::packed_guid(&installed.code) {
                targets.extend(
                    catalog::installer_residue(&packed)
                        .into_iter()
                        .map(|key| RemovalTarget::component(TargetKind::RegistryKey(key))),
                );
            }
        }

        for view in catalog::MACHINE_VIEWS {
            let root = catalog::office_root(Hive::LocalMachine, self.version).with_view(view);
            targets.extend(office_root_targets(host, root));
        }
        targets.extend(office_root_targets(host, catalog::office_root(Hive::CurrentUser, self.version)));
        if self.version != OfficeVersion::V12 {
            targets.push(ospp_target());
        }
        targets.push(RemovalTarget::installation(TargetKind::Directory(catalog::msocache_dir(host.system))));
        targets
    }

    fn requires_restart(&self) -> bool {
        true
    }
}
