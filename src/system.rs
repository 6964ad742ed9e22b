use std::path::{Path, PathBuf};

use crate::error_handling::Result;
use crate::outcome::RemovalOutcome;

/// Well-known install roots Office lays files under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnownFolder {
    ProgramFiles,
    ProgramFilesX86,
    ProgramFilesCommon,
    ProgramData,
    LocalAppData,
}

impl KnownFolder {
    /// Stock location, used when the shell cannot resolve the folder.
    pub fn fallback(self) -> PathBuf {
        PathBuf::from(match self {
            KnownFolder::ProgramFiles => r"C:\Program Files",
            KnownFolder::ProgramFilesX86 => r"C:\Program Files (x86)",
            KnownFolder::ProgramFilesCommon => r"C:\Program Files\Common Files",
            KnownFolder::ProgramData => r"C:\ProgramData",
            KnownFolder::LocalAppData => r"C:\Users\Default\AppData\Local",
        })
    }
}

/// Every OS mutation other than registry deletion, plus the read-only
/// queries detection needs. Each removal returns a typed outcome.
pub trait SystemOps {
    fn known_folder(&self, folder: KnownFolder) -> PathBuf;
    /// Full names of installed Store packages whose name starts with `name_prefix`.
    /// Must work without administrator rights.
    fn find_store_packages(&self, name_prefix: &str) -> Result<Vec<String>>;

    fn stop_and_delete_service(&self, name: &str) -> std::result::Result<(), RemovalOutcome>;
    fn delete_scheduled_task(&self, task_path: &str) -> std::result::Result<(), RemovalOutcome>;
    fn remove_directory(&self, path: &Path) -> std::result::Result<(), RemovalOutcome>;
    fn remove_store_package(&self, full_name: &str) -> std::result::Result<(), RemovalOutcome>;
    fn uninstall_msi_product(&self, product_code: &str) -> std::result::Result<(), RemovalOutcome>;
    fn uninstall_click_to_run(
        &self,
        client: &Path,
        release_id: &str,
        culture: &str,
        major: u32,
    ) -> std::result::Result<(), RemovalOutcome>;

    /// Schedules a delayed reboot so the report is printed first.
    fn schedule_restart(&self, delay_secs: u32) -> Result<()>;
}

/// Arguments passed to the ClickToRun client for an ARP-style uninstall of one release.
pub fn click_to_run_uninstall_args(release_id: &str, culture: &str, major: u32) -> Vec<String> {
    vec![
        "scenario=install".to_string(),
        "scenariosubtype=ARP".to_string(),
        "sourcetype=None".to_string(),
        format!("productstoremove={}.{}_{}_x-none", release_id, major, culture),
        format!("culture={}", culture),
        format!("version.{}={}.0", major, major),
        "DisplayLevel=False".to_string(),
        "forceappshutdown=True".to_string(),
    ]
}

/// PowerShell that lists matching package full names, one per line. Only an
/// administrator may pass `-AllUsers`.
pub fn store_package_query(name_prefix: &str, all_users: bool) -> String {
    format!(
        "$ErrorActionPreference = 'Stop'; Get-AppxPackage{} -Name '{}*' | Select-Object -ExpandProperty PackageFullName",
        if all_users { " -AllUsers" } else { "" },
        name_prefix.replace('\'', "''")
    )
}

/// Maps msiexec exit codes onto outcomes.
pub fn msiexec_outcome(code: i32) -> std::result::Result<(), RemovalOutcome> {
    match code {
        // ERROR_SUCCESS, ERROR_SUCCESS_REBOOT_INITIATED, ERROR_SUCCESS_REBOOT_REQUIRED
        0 | 1641 | 3010 => Ok(()),
        // ERROR_UNKNOWN_PRODUCT
        1605 => Err(RemovalOutcome::NotFound),
        // ERROR_INSTALL_PACKAGE_REJECTED by policy, insufficient privileges
        1625 | 1730 | 1925 => Err(RemovalOutcome::AccessDenied),
        other => Err(RemovalOutcome::OtherFailure(format!("msiexec exited with code {}", other))),
    }
}

pub fn system_ops() -> Box<dyn SystemOps> {
    #[cfg(windows)]
    {
        Box::new(windows_impl::WindowsSystem)
    }
    #[cfg(not(windows))]
    {
        Box::new(AbsentSystem)
    }
}

/// Stand-in for hosts without Windows: nothing is installed and nothing can be removed.
#[cfg(not(windows))]
struct AbsentSystem;

#[cfg(not(windows))]
impl SystemOps for AbsentSystem {
    fn known_folder(&self, folder: KnownFolder) -> PathBuf {
        folder.fallback()
    }

    fn find_store_packages(&self, _name_prefix: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    fn stop_and_delete_service(&self, _name: &str) -> std::result::Result<(), RemovalOutcome> {
        Err(RemovalOutcome::NotFound)
    }

    fn delete_scheduled_task(&self, _task_path: &str) -> std::result::Result<(), RemovalOutcome> {
        Err(RemovalOutcome::NotFound)
    }

    fn remove_directory(&self, _path: &Path) -> std::result::Result<(), RemovalOutcome> {
        Err(RemovalOutcome::NotFound)
    }

    fn remove_store_package(&self, _full_name: &str) -> std::result::Result<(), RemovalOutcome> {
        Err(RemovalOutcome::NotFound)
    }

    fn uninstall_msi_product(&self, _product_code: &str) -> std::result::Result<(), RemovalOutcome> {
        Err(RemovalOutcome::NotFound)
    }

    fn uninstall_click_to_run(
        &self,
        _client: &Path,
        _release_id: &str,
        _culture: &str,
        _major: u32,
    ) -> std::result::Result<(), RemovalOutcome> {
        Err(RemovalOutcome::NotFound)
    }

    fn schedule_restart(&self, _delay_secs: u32) -> Result<()> {
        anyhow::bail!("restarting the machine is only supported on Windows")
    }
}

// --- Windows Implementation ---

#[cfg(windows)]
mod windows_impl {
    use super::*;
    use crate::error_handling::Context;
    use std::process::{Command, Output};
    use std::time::{Duration, Instant};
    use windows_service::service::{ServiceAccess, ServiceState};
    use windows_service::service_manager::{ServiceManager, ServiceManagerAccess};

    pub struct WindowsSystem;

    const SERVICE_STOP_TIMEOUT: Duration = Duration::from_secs(30);

    fn run(program: &Path, args: &[String]) -> std::result::Result<Output, RemovalOutcome> {
        Command::new(program)
            .args(args)
            .output()
            .map_err(|e| RemovalOutcome::from_io_error(&e))
    }

    fn system32(tool: &str) -> PathBuf {
        use windows::Win32::UI::Shell::FOLDERID_System;
        known_folder_path(&FOLDERID_System)
            .unwrap_or_else(|| PathBuf::from(r"C:\Windows\System32"))
            .join(tool)
    }

    fn powershell(script: &str) -> std::result::Result<Output, RemovalOutcome> {
        run(
            &system32(r"WindowsPowerShell\v1.0\powershell.exe"),
            &[
                "-NoProfile".to_string(),
                "-NonInteractive".to_string(),
                "-Command".to_string(),
                script.to_string(),
            ],
        )
    }

    /// Classifies a failed helper process by what it printed.
    fn classify_failure(tool: &str, output: &Output) -> RemovalOutcome {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let text = format!("{}{}", stdout, stderr).to_lowercase();
        if text.contains("cannot find") || text.contains("does not exist") || text.contains("not found") {
            RemovalOutcome::NotFound
        } else if text.contains("access is denied") || text.contains("0x80070005") {
            RemovalOutcome::AccessDenied
        } else {
            RemovalOutcome::OtherFailure(format!(
                "{} exited with {}: {}",
                tool,
                output.status,
                stderr.trim()
            ))
        }
    }

    fn service_outcome(err: windows_service::Error) -> RemovalOutcome {
        match err {
            windows_service::Error::Winapi(io) => match io.raw_os_error() {
                // ERROR_SERVICE_DOES_NOT_EXIST
                Some(1060) => RemovalOutcome::NotFound,
                _ => RemovalOutcome::from_io_error(&io),
            },
            other => RemovalOutcome::OtherFailure(other.to_string()),
        }
    }

    // Escapes a value for a single-quoted PowerShell string.
    fn ps_quote(value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    fn known_folder_path(id: &windows::core::GUID) -> Option<PathBuf> {
        use windows::Win32::System::Com::CoTaskMemFree;
        use windows::Win32::UI::Shell::{KF_FLAG_DEFAULT, SHGetKnownFolderPath};
        use windows::core::PWSTR;

        // SAFETY: SHGetKnownFolderPath allocates the returned string with the COM allocator;
        // it is copied out and released with CoTaskMemFree before leaving the block.
        unsafe {
            let raw: PWSTR = SHGetKnownFolderPath(id, KF_FLAG_DEFAULT, None).ok()?;
            let s = raw.to_string().unwrap_or_default();
            CoTaskMemFree(Some(raw.0 as _));
            if s.is_empty() { None } else { Some(PathBuf::from(s)) }
        }
    }

    fn query_store_packages(name_prefix: &str, all_users: bool) -> Result<Vec<String>> {
        let output = powershell(&store_package_query(name_prefix, all_users))
            .map_err(|outcome| anyhow::anyhow!("powershell could not be started: {}", outcome))?;
        if !output.status.success() {
            anyhow::bail!(
                "Get-AppxPackage exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect())
    }

    impl SystemOps for WindowsSystem {
        fn known_folder(&self, folder: KnownFolder) -> PathBuf {
            use windows::Win32::UI::Shell::{
                FOLDERID_LocalAppData, FOLDERID_ProgramData, FOLDERID_ProgramFiles,
                FOLDERID_ProgramFilesCommon, FOLDERID_ProgramFilesX86,
            };
            let id = match folder {
                KnownFolder::ProgramFiles => &FOLDERID_ProgramFiles,
                KnownFolder::ProgramFilesX86 => &FOLDERID_ProgramFilesX86,
                KnownFolder::ProgramFilesCommon => &FOLDERID_ProgramFilesCommon,
                KnownFolder::ProgramData => &FOLDERID_ProgramData,
                KnownFolder::LocalAppData => &FOLDERID_LocalAppData,
            };
            known_folder_path(id).unwrap_or_else(|| folder.fallback())
        }

        fn find_store_packages(&self, name_prefix: &str) -> Result<Vec<String>> {
            // An unelevated Detect is refused -AllUsers; its own packages are still listed.
            query_store_packages(name_prefix, true)
                .or_else(|_| query_store_packages(name_prefix, false))
                .with_context(|| format!("Failed to list Store packages named '{}*'", name_prefix))
        }

        fn stop_and_delete_service(&self, name: &str) -> std::result::Result<(), RemovalOutcome> {
            let manager = ServiceManager::local_computer(None::<&str>, ServiceManagerAccess::CONNECT)
                .map_err(service_outcome)?;
            let service = manager
                .open_service(
                    name,
                    ServiceAccess::QUERY_STATUS | ServiceAccess::STOP | ServiceAccess::DELETE,
                )
                .map_err(service_outcome)?;

            if let Ok(status) = service.query_status()
                && status.current_state != ServiceState::Stopped
            {
                let _ = service.stop();
                let started = Instant::now();
                while started.elapsed() < SERVICE_STOP_TIMEOUT {
                    match service.query_status() {
                        Ok(status) if status.current_state == ServiceState::Stopped => break,
                        Ok(_) => std::thread::sleep(Duration::from_millis(500)),
                        Err(_) => break,
                    }
                }
            }

            match service.delete() {
                Ok(()) => Ok(()),
                // ERROR_SERVICE_MARKED_FOR_DELETE: removal completes once the last handle closes.
                Err(windows_service::Error::Winapi(io)) if io.raw_os_error() == Some(1072) => Ok(()),
                Err(e) => Err(service_outcome(e)),
            }
        }

        fn delete_scheduled_task(&self, task_path: &str) -> std::result::Result<(), RemovalOutcome> {
            let output = run(
                &system32("schtasks.exe"),
                &["/Delete".to_string(), "/TN".to_string(), task_path.to_string(), "/F".to_string()],
            )?;
            if output.status.success() {
                Ok(())
            } else {
                Err(classify_failure("schtasks", &output))
            }
        }

        fn remove_directory(&self, path: &Path) -> std::result::Result<(), RemovalOutcome> {
            std::fs::remove_dir_all(path).map_err(|e| RemovalOutcome::from_io_error(&e))
        }

        fn remove_store_package(&self, full_name: &str) -> std::result::Result<(), RemovalOutcome> {
            let script = format!("Remove-AppxPackage -AllUsers -Package {}", ps_quote(full_name));
            let output = powershell(&script)?;
            if output.status.success() {
                Ok(())
            } else {
                Err(classify_failure("Remove-AppxPackage", &output))
            }
        }

        fn uninstall_msi_product(&self, product_code: &str) -> std::result::Result<(), RemovalOutcome> {
            let output = run(
                &system32("msiexec.exe"),
                &[
                    "/x".to_string(),
                    product_code.to_string(),
                    "/qn".to_string(),
                    "/norestart".to_string(),
                ],
            )?;
            match output.status.code() {
                Some(code) => msiexec_outcome(code),
                None => Err(RemovalOutcome::OtherFailure("msiexec was terminated".to_string())),
            }
        }

        fn uninstall_click_to_run(
            &self,
            client: &Path,
            release_id: &str,
            culture: &str,
            major: u32,
        ) -> std::result::Result<(), RemovalOutcome> {
            if !client.exists() {
                return Err(RemovalOutcome::NotFound);
            }
            let output = run(client, &click_to_run_uninstall_args(release_id, culture, major))?;
            if output.status.success() {
                Ok(())
            } else {
                Err(classify_failure("OfficeClickToRun", &output))
            }
        }

        fn schedule_restart(&self, delay_secs: u32) -> Result<()> {
            let status = Command::new(system32("shutdown.exe"))
                .args([
                    "/r".to_string(),
                    "/t".to_string(),
                    delay_secs.to_string(),
                    "/c".to_string(),
                    "Restarting to finish removing Microsoft Office".to_string(),
                ])
                .status()
                .context("Failed to launch shutdown.exe")?;
            if !status.success() {
                anyhow::bail!("shutdown.exe exited with {}", status);
            }
            Ok(())
        }
    }
}

// --- Spy implementation for tests ---

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::collections::BTreeSet;
    use std::sync::{Arc, Mutex};

    /// Installed state plus a log of every mutating call.
    #[derive(Clone, Default)]
    pub struct MockSystem {
        installed: Arc<Mutex<BTreeSet<String>>>,
        locked: Arc<Mutex<BTreeSet<String>>>,
        calls: Arc<Mutex<Vec<String>>>,
        restarts: Arc<Mutex<Vec<u32>>>,
        store_query_fails: Arc<Mutex<bool>>,
    }

    impl MockSystem {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn install(&self, id: &str) {
            self.installed.lock().unwrap().insert(id.to_lowercase());
        }

        /// Removing this item yields `AccessDenied`.
        pub fn lock(&self, id: &str) {
            self.locked.lock().unwrap().insert(id.to_lowercase());
        }

        /// Package listing fails, as it does for a user the Appx service refuses.
        pub fn fail_store_query(&self) {
            *self.store_query_fails.lock().unwrap() = true;
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        pub fn restarts(&self) -> Vec<u32> {
            self.restarts.lock().unwrap().clone()
        }

        fn remove(&self, call: &str, id: &str) -> std::result::Result<(), RemovalOutcome> {
            self.calls.lock().unwrap().push(format!("{}:{}", call, id));
            let key = id.to_lowercase();
            if self.locked.lock().unwrap().contains(&key) {
                return Err(RemovalOutcome::AccessDenied);
            }
            if self.installed.lock().unwrap().remove(&key) {
                Ok(())
            } else {
                Err(RemovalOutcome::NotFound)
            }
        }
    }

    impl SystemOps for MockSystem {
        fn known_folder(&self, folder: KnownFolder) -> PathBuf {
            folder.fallback()
        }

        fn find_store_packages(&self, name_prefix: &str) -> Result<Vec<String>> {
            if *self.store_query_fails.lock().unwrap() {
                anyhow::bail!("Get-AppxPackage: Access is denied");
            }
            let prefix = name_prefix.to_lowercase();
            Ok(self
                .installed
                .lock()
                .unwrap()
                .iter()
                .filter(|id| id.starts_with(&prefix))
                .cloned()
                .collect())
        }

        fn stop_and_delete_service(&self, name: &str) -> std::result::Result<(), RemovalOutcome> {
            self.remove("service", name)
        }

        fn delete_scheduled_task(&self, task_path: &str) -> std::result::Result<(), RemovalOutcome> {
            self.remove("task", task_path)
        }

        fn remove_directory(&self, path: &Path) -> std::result::Result<(), RemovalOutcome> {
            self.remove("dir", &path.to_string_lossy())
        }

        fn remove_store_package(&self, full_name: &str) -> std::result::Result<(), RemovalOutcome> {
            self.remove("package", full_name)
        }

        fn uninstall_msi_product(&self, product_code: &str) -> std::result::Result<(), RemovalOutcome> {
            self.remove("msi", product_code)
        }

        fn uninstall_click_to_run(
            &self,
            _client: &Path,
            release_id: &str,
            _culture: &str,
            _major: u32,
        ) -> std::result::Result<(), RemovalOutcome> {
            self.remove("c2r", release_id)
        }

        fn schedule_restart(&self, delay_secs: u32) -> Result<()> {
            self.restarts.lock().unwrap().push(delay_secs);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_click_to_run_arguments_name_release_and_version() {
        let args = click_to_run_uninstall_args("O365ProPlusRetail", "en-us", 16);
        assert!(args.contains(&"productstoremove=O365ProPlusRetail.16_en-us_x-none".to_string()));
        assert!(args.contains(&"version.16=16.0".to_string()));
        assert!(args.contains(&"scenariosubtype=ARP".to_string()));
    }

    #[test]
    fn test_msiexec_exit_codes() {
        assert_eq!(msiexec_outcome(0), Ok(()));
        assert_eq!(msiexec_outcome(3010), Ok(()));
        assert_eq!(msiexec_outcome(1605), Err(RemovalOutcome::NotFound));
        assert_eq!(msiexec_outcome(1925), Err(RemovalOutcome::AccessDenied));
        assert!(matches!(msiexec_outcome(1603), Err(RemovalOutcome::OtherFailure(_))));
    }

    #[test]
    fn test_store_query_only_spans_all_users_when_asked() {
        let all = store_package_query("Microsoft.Office.Desktop", true);
        let own = store_package_query("Microsoft.Office.Desktop", false);
        assert!(all.contains("Get-AppxPackage -AllUsers -Name 'Microsoft.Office.Desktop*'"));
        assert!(!own.contains("-AllUsers"));
        assert!(own.contains("Get-AppxPackage -Name 'Microsoft.Office.Desktop*'"));
        assert!(store_package_query("it's", false).contains("'it''s*'"));
    }

    #[test]
    fn test_mock_removal_is_idempotent() {
        let system = mock::MockSystem::new();
        system.install("ClickToRunSvc");
        assert_eq!(system.stop_and_delete_service("ClickToRunSvc"), Ok(()));
        assert_eq!(system.stop_and_delete_service("ClickToRunSvc"), Err(RemovalOutcome::NotFound));
        assert_eq!(system.calls().len(), 2);
    }
}
