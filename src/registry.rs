use std::fmt;

use serde::Serialize;

use crate::outcome::RemovalOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Hive {
    LocalMachine,
    CurrentUser,
    ClassesRoot,
    Users,
}

impl fmt::Display for Hive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Hive::LocalMachine => "HKLM",
            Hive::CurrentUser => "HKCU",
            Hive::ClassesRoot => "HKCR",
            Hive::Users => "HKU",
        };
        f.write_str(name)
    }
}

/// 32/64-bit redirection view a key is addressed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize)]
pub enum RegistryView {
    #[default]
    Native,
    Wow64_32,
    Wow64_64,
}

/// Lookup descriptor for exactly one registry location. Holds no handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RegistryKeyRef {
    pub hive: Hive,
    pub path: String,
    pub view: RegistryView,
}

impl RegistryKeyRef {
    pub fn new(hive: Hive, path: impl Into<String>) -> Self {
        Self { hive, path: path.into(), view: RegistryView::Native }
    }

    pub fn with_view(mut self, view: RegistryView) -> Self {
        self.view = view;
        self
    }

    pub fn child(&self, name: &str) -> Self {
        Self {
            hive: self.hive,
            path: format!("{}\\{}", self.path.trim_end_matches('\\'), name),
            view: self.view,
        }
    }

    /// Splits the path into the parent that must be opened and the leaf to delete.
    pub fn parent_and_leaf(&self) -> (&str, &str) {
        let trimmed = self.path.trim_end_matches('\\');
        match trimmed.rsplit_once('\\') {
            Some((parent, leaf)) => (parent, leaf),
            None => ("", trimmed),
        }
    }
}

impl fmt::Display for RegistryKeyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\\{}", self.hive, self.path)?;
        match self.view {
            RegistryView::Native => Ok(()),
            RegistryView::Wow64_32 => write!(f, " [32-bit]"),
            RegistryView::Wow64_64 => write!(f, " [64-bit]"),
        }
    }
}

/// Read-only registry lookups used by detection. Missing keys and values are
/// reported as absence, never as errors.
pub trait RegistryReader {
    fn key_exists(&self, key: &RegistryKeyRef) -> bool;
    /// Returns the names of the direct subkeys, or an empty list if the key is missing.
    fn subkey_names(&self, key: &RegistryKeyRef) -> Vec<String>;
    /// Gets a string value of the key (name = "" for the default value).
    fn string_value(&self, key: &RegistryKeyRef, name: &str) -> Option<String>;
}

/// Side-effecting primitive: deletes one subtree. Never panics or returns
/// an opaque error; every failure is a typed `RemovalOutcome`. No retries.
pub trait RegistryMutator {
    fn delete_subkey(&self, key: &RegistryKeyRef) -> Result<(), RemovalOutcome>;
}

pub trait Registry: RegistryReader + RegistryMutator {}

impl<T: RegistryReader + RegistryMutator> Registry for T {}

/// The host's registry.
///
/// On Windows, this uses the real registry.
/// On other platforms there is nothing to find, so every key is absent.
pub fn system_registry() -> Box<dyn Registry> {
    #[cfg(windows)]
    {
        Box::new(windows_impl::WindowsRegistry)
    }
    #[cfg(not(windows))]
    {
        Box::new(AbsentRegistry)
    }
}

#[cfg(not(windows))]
struct AbsentRegistry;

#[cfg(not(windows))]
impl RegistryReader for AbsentRegistry {
    fn key_exists(&self, _key: &RegistryKeyRef) -> bool {
        false
    }

    fn subkey_names(&self, _key: &RegistryKeyRef) -> Vec<String> {
        Vec::new()
    }

    fn string_value(&self, _key: &RegistryKeyRef, _name: &str) -> Option<String> {
        None
    }
}

#[cfg(not(windows))]
impl RegistryMutator for AbsentRegistry {
    fn delete_subkey(&self, _key: &RegistryKeyRef) -> Result<(), RemovalOutcome> {
        Err(RemovalOutcome::NotFound)
    }
}

// --- Windows Implementation ---

#[cfg(windows)]
mod windows_impl {
    use super::*;
    use winreg::RegKey;
    use winreg::enums::*;

    pub struct WindowsRegistry;

    fn predef(hive: Hive) -> RegKey {
        RegKey::predef(match hive {
            Hive::LocalMachine => HKEY_LOCAL_MACHINE,
            Hive::CurrentUser => HKEY_CURRENT_USER,
            Hive::ClassesRoot => HKEY_CLASSES_ROOT,
            Hive::Users => HKEY_USERS,
        })
    }

    fn view_flag(view: RegistryView) -> u32 {
        match view {
            RegistryView::Native => 0,
            RegistryView::Wow64_32 => KEY_WOW64_32KEY,
            RegistryView::Wow64_64 => KEY_WOW64_64KEY,
        }
    }

    // The handle is dropped (closed) when the caller's scope ends.
    fn open_read(key: &RegistryKeyRef) -> std::io::Result<RegKey> {
        predef(key.hive).open_subkey_with_flags(&key.path, KEY_READ | view_flag(key.view))
    }

    impl RegistryReader for WindowsRegistry {
        fn key_exists(&self, key: &RegistryKeyRef) -> bool {
            open_read(key).is_ok()
        }

        fn subkey_names(&self, key: &RegistryKeyRef) -> Vec<String> {
            match open_read(key) {
                Ok(handle) => handle.enum_keys().filter_map(|name| name.ok()).collect(),
                Err(_) => Vec::new(),
            }
        }

        fn string_value(&self, key: &RegistryKeyRef, name: &str) -> Option<String> {
            open_read(key).ok()?.get_value::<String, _>(name).ok()
        }
    }

    impl RegistryMutator for WindowsRegistry {
        fn delete_subkey(&self, key: &RegistryKeyRef) -> Result<(), RemovalOutcome> {
            let (parent_path, leaf) = key.parent_and_leaf();
            if leaf.is_empty() {
                return Err(RemovalOutcome::OtherFailure(format!(
                    "refusing to delete the root of {}",
                    key.hive
                )));
            }
            let parent = predef(key.hive)
                .open_subkey_with_flags(parent_path, KEY_ALL_ACCESS | view_flag(key.view))
                .map_err(|e| RemovalOutcome::from_io_error(&e))?;
            parent
                .delete_subkey_all(leaf)
                .map_err(|e| RemovalOutcome::from_io_error(&e))
        }
    }
}

// --- In-memory registry for tests ---


// --- In-memory registry tests ---
