use std::collections::BTreeMap;

use super::{Host, OfficeProductStrategy, Presence, office_root_targets};
use crate::args::{OfficeVersion, ProductType};
use crate::catalog;
use crate::outcome::{RemovalTarget, TargetKind, TargetScope};
use crate::registry::{Hive, RegistryKeyRef};
use crate::system::KnownFolder;

/// Office delivered as a packaged (Desktop Bridge) Store application.
pub struct StoreProduct {
    version: OfficeVersion,
}

impl StoreProduct {
    pub fn new(version: OfficeVersion) -> Self {
        Self { version }
    }

    fn packages(&self, host: &Host) -> Vec<String> {
        if self.version != OfficeVersion::V16 {
            return Vec::new();
        }
        match host.system.find_store_packages(catalog::STORE_PACKAGE_PREFIX) {
            Ok(packages) => packages,
            Err(e) => {
                host.logger.warn("store.query", &format!("Treating Store Office as absent: {:#}", e));
                Vec::new()
            }
        }
    }
}

impl OfficeProductStrategy for StoreProduct {
    fn product_type(&self) -> ProductType {
        ProductType::Store
    }

    fn version(&self) -> OfficeVersion {
        self.version
    }

    fn detect(&self, host: &Host) -> Presence {
        let packages = self.packages(host);
        if packages.is_empty() {
            return Presence::Absent;
        }
        let metadata: BTreeMap<String, String> = packages
            .into_iter()
            .enumerate()
            .map(|(i, name)| (format!("package{}", i + 1), name))
            .collect();
        Presence::Present { version: self.version, metadata }
    }

    fn plan(&self, host: &Host) -> Vec<RemovalTarget> {
        let packages = self.packages(host);
        let local_app_data = host.system.known_folder(KnownFolder::LocalAppData);
        let family = format!("{}_{}", catalog::STORE_PACKAGE_PREFIX, catalog::STORE_PUBLISHER_ID);

        let mut targets: Vec<RemovalTarget> = packages
            .iter()
            .map(|name| RemovalTarget::component(TargetKind::StorePackage(name.clone())))
            .collect();

        targets.push(RemovalTarget::component(TargetKind::Directory(
            local_app_data.join("Packages").join(&family),
        )));

        // Per-user Office data the package writes outside its container.
        targets.extend(
            office_root_targets(host, catalog::office_root(Hive::CurrentUser, self.version))
                .into_iter()
                .map(|mut t| {
                    t.scope = TargetScope::Component;
                    t
                }),
        );

        for name in &packages {
            targets.push(RemovalTarget::installation(TargetKind::RegistryKey(RegistryKeyRef::new(
                Hive::CurrentUser,
                format!(r"{}\{}", catalog::APPMODEL_PACKAGES, name),
            ))));
        }
        targets.extend(office_root_targets(host, catalog::office_root(Hive::LocalMachine, self.version)));
        targets
    }

    fn requires_restart(&self) -> bool {
        false
    }
}
