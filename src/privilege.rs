// src/privilege.rs
use std::path::{Path, PathBuf};

use crate::args::ParsedArgs;
use crate::error_handling::RemoverError;

/// Flag appended to the relaunch so the elevated instance never asks again.
pub const RELAUNCHED_FLAG: &str = "--relaunched";
const NO_BANNER_FLAG: &str = "--no-copyright-logo";
const LOG_PATH_FLAG: &str = "--log-path";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElevationState {
    NotElevated,
    /// An elevated copy was started; this process must exit without doing work.
    ElevationRequested,
    Elevated,
}

/// OS identity query and the elevated relaunch.
pub trait Privileges {
    fn is_admin(&self) -> bool;

    /// Starts `program` with `args` in `working_dir` through the elevation
    /// prompt. Does not wait for it.
    fn relaunch_elevated(&self, program: &Path, args: &[String], working_dir: &Path) -> std::result::Result<(), String>;
}

pub struct PrivilegeElevator {
    privileges: Box<dyn Privileges>,
    self_path: PathBuf,
    original_args: Vec<String>,
    working_dir: PathBuf,
}

impl PrivilegeElevator {
    pub fn new(
        privileges: Box<dyn Privileges>,
        self_path: PathBuf,
        original_args: Vec<String>,
        working_dir: PathBuf,
    ) -> Self {
        Self { privileges, self_path, original_args, working_dir }
    }

    /// Elevator for the running executable, its command line and its current directory.
    pub fn for_current_process() -> Self {
        let mut argv = std::env::args_os().map(|a| a.to_string_lossy().into_owned());
        let argv0 = argv.next();
        let self_path = std::env::current_exe()
            .ok()
            .or_else(|| argv0.map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("office-remover.exe"));
        let working_dir = std::env::current_dir()
            .ok()
            .or_else(|| self_path.parent().map(Path::to_path_buf))
            .unwrap_or_default();
        Self::new(system_privileges(), self_path, argv.collect(), working_dir)
    }

    pub fn is_admin(&self) -> bool {
        self.privileges.is_admin()
    }

    /// `Elevated` or `NotElevated` from the current token. Never relaunches.
    pub fn state(&self) -> ElevationState {
        if self.is_admin() {
            ElevationState::Elevated
        } else {
            ElevationState::NotElevated
        }
    }

    /// Returns `Elevated` when already admin, otherwise starts one elevated
    /// copy and returns `ElevationRequested`. A process that was itself
    /// relaunched and is still not admin is denied instead of looping.
    pub fn ensure_elevated(&self, args: &ParsedArgs) -> Result<ElevationState, RemoverError> {
        if self.is_admin() {
            return Ok(ElevationState::Elevated);
        }
        if args.relaunched() {
            return Err(RemoverError::ElevationDenied(
                "the relaunched process is still not running as administrator".to_string(),
            ));
        }
        self.privileges
            .relaunch_elevated(&self.self_path, &self.relaunch_args(args.log_path()), &self.working_dir)
            .map(|()| ElevationState::ElevationRequested)
            .map_err(RemoverError::ElevationDenied)
    }

    /// The original arguments, annotated so the relaunch skips the banner and
    /// elevation and writes its log where this process would have. The
    /// trailing `--log-path` wins over any earlier one.
    pub fn relaunch_args(&self, log_path: &Path) -> Vec<String> {
        let mut args: Vec<String> = self
            .original_args
            .iter()
            .filter(|a| a.as_str() != RELAUNCHED_FLAG)
            .cloned()
            .collect();
        args.push(LOG_PATH_FLAG.to_string());
        args.push(self.working_dir.join(log_path).to_string_lossy().into_owned());
        args.push(NO_BANNER_FLAG.to_string());
        args.push(RELAUNCHED_FLAG.to_string());
        args
    }
}

/// Quotes one argument so `CommandLineToArgvW` yields it back unchanged.
#[cfg_attr(not(windows), allow(dead_code))]
pub(crate) fn quote_windows_arg(arg: &str) -> String {
    if !arg.is_empty() && !arg.contains([' ', '\t', '"']) {
        return arg.to_string();
    }
    let mut quoted = String::from('"');
    let mut backslashes = 0;
    for c in arg.chars() {
        match c {
            '\\' => backslashes += 1,
            '"' => {
                quoted.push_str(&"\\".repeat(backslashes * 2 + 1));
                quoted.push('"');
                backslashes = 0;
            }
            _ => {
                quoted.push_str(&"\\".repeat(backslashes));
                quoted.push(c);
                backslashes = 0;
            }
        }
    }
    quoted.push_str(&"\\".repeat(backslashes * 2));
    quoted.push('"');
    quoted
}

#[cfg(windows)]
pub fn system_privileges() -> Box<dyn Privileges> {
    Box::new(windows_impl::ShellPrivileges)
}

#[cfg(not(windows))]
pub fn system_privileges() -> Box<dyn Privileges> {
    Box::new(Unprivileged)
}

/// Stand-in for hosts without UAC: never admin, relaunch always refused.
#[cfg(not(windows))]
struct Unprivileged;

#[cfg(not(windows))]
impl Privileges for Unprivileged {
    fn is_admin(&self) -> bool {
        false
    }

    fn relaunch_elevated(&self, _program: &Path, _args: &[String], _working_dir: &Path) -> std::result::Result<(), String> {
        Err("elevation is only available on Windows".to_string())
    }
}

#[cfg(windows)]
mod windows_impl {
    use super::*;
    use windows::Win32::UI::Shell::{IsUserAnAdmin, SEE_MASK_NOASYNC, SHELLEXECUTEINFOW, ShellExecuteExW};
    use windows::Win32::UI::WindowsAndMessaging::SW_SHOWNORMAL;
    use windows::core::{HSTRING, PCWSTR, w};

    /// ERROR_CANCELLED surfaced as an HRESULT when the consent prompt is declined.
    const ERROR_CANCELLED: i32 = 1223;

    pub struct ShellPrivileges;

    impl Privileges for ShellPrivileges {
        fn is_admin(&self) -> bool {
            // SAFETY: IsUserAnAdmin takes no arguments and only inspects the process token.
            unsafe { IsUserAnAdmin().as_bool() }
        }

        fn relaunch_elevated(&self, program: &Path, args: &[String], working_dir: &Path) -> std::result::Result<(), String> {
            let file = HSTRING::from(program.as_os_str());
            let parameters = HSTRING::from(
                args.iter().map(|a| quote_windows_arg(a)).collect::<Vec<_>>().join(" "),
            );
            // runas starts the child in System32 unless told otherwise.
            let directory = HSTRING::from(working_dir.as_os_str());
            let mut info = SHELLEXECUTEINFOW {
                cbSize: std::mem::size_of::<SHELLEXECUTEINFOW>() as u32,
                fMask: SEE_MASK_NOASYNC,
                lpVerb: w!("runas"),
                lpFile: PCWSTR::from_raw(file.as_ptr()),
                lpParameters: PCWSTR::from_raw(parameters.as_ptr()),
                lpDirectory: PCWSTR::from_raw(directory.as_ptr()),
                nShow: SW_SHOWNORMAL.0,
                ..Default::default()
            };
            // SAFETY: `info` is fully initialised with cbSize set, and the HSTRING
            // buffers it points into outlive the call.
            unsafe { ShellExecuteExW(&mut info) }.map_err(|e| {
                if e.code().0 & 0xFFFF == ERROR_CANCELLED {
                    "the elevation prompt was declined".to_string()
                } else {
                    format!("could not start the elevated process: {}", e.message())
                }
            })
        }
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Records every relaunch instead of starting a process.
    #[derive(Clone, Default)]
    pub struct MockPrivileges {
        admin: bool,
        deny: bool,
        spawns: Arc<Mutex<Vec<Vec<String>>>>,
        spawn_dirs: Arc<Mutex<Vec<PathBuf>>>,
    }

    impl MockPrivileges {
        pub fn admin() -> Self {
            Self { admin: true, ..Self::default() }
        }

        pub fn user() -> Self {
            Self::default()
        }

        pub fn declining() -> Self {
            Self { deny: true, ..Self::default() }
        }

        pub fn spawns(&self) -> Vec<Vec<String>> {
            self.spawns.lock().unwrap().clone()
        }

        pub fn spawn_dirs(&self) -> Vec<PathBuf> {
            self.spawn_dirs.lock().unwrap().clone()
        }

        pub fn elevator(&self, args: &[&str]) -> PrivilegeElevator {
            PrivilegeElevator::new(
                Box::new(self.clone()),
                PathBuf::from(r"C:\Tools\office-remover.exe"),
                args.iter().map(|a| a.to_string()).collect(),
                std::env::temp_dir(),
            )
        }
    }

    impl Privileges for MockPrivileges {
        fn is_admin(&self) -> bool {
            self.admin
        }

        fn relaunch_elevated(&self, _program: &Path, args: &[String], working_dir: &Path) -> std::result::Result<(), String> {
            self.spawns.lock().unwrap().push(args.to_vec());
            self.spawn_dirs.lock().unwrap().push(working_dir.to_path_buf());
            if self.deny {
                Err("the elevation prompt was declined".to_string())
            } else {
                Ok(())
            }
        }
    }
}
