// src/session.rs
use crate::args::{self, OutputState, ParsedArgs};
use crate::cli::RawArgs;
use crate::dispatcher::WorkModeDispatcher;
use crate::error_handling::RunStatus;
use crate::logger::Logger;
use crate::privilege::PrivilegeElevator;
use crate::products::Host;
use crate::registry::Registry;
use crate::system::SystemOps;

/// OS backends one run works against.
pub struct Backends<'a> {
    pub registry: &'a dyn Registry,
    pub system: &'a dyn SystemOps,
    pub elevator: &'a PrivilegeElevator,
}

pub fn banner() -> String {
    format!(
        "{} {} - Microsoft Office removal tool. Copyright (c) the {} authors.",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        env!("CARGO_PKG_NAME")
    )
}

/// Runs one invocation end to end and returns how it ended.
pub fn run(raw: &RawArgs, backends: &Backends) -> RunStatus {
    let parsed = match args::validate(raw) {
        Ok(parsed) => parsed,
        Err(err) => {
            // No log directory is created for a rejected invocation.
            Logger::new(OutputState::Normal).error("args.invalid", &err.to_string());
            return RunStatus::from(&err);
        }
    };
    let logger = open_logger(&parsed);
    run_parsed(&parsed, backends, &logger)
}

fn open_logger(parsed: &ParsedArgs) -> Logger {
    match Logger::new(parsed.output_state()).with_log_dir(parsed.log_path()) {
        Ok(logger) => logger,
        Err(e) => {
            let logger = Logger::new(parsed.output_state());
            logger.warn("run.start", &format!("Logging to the console only: {:#}", e));
            logger
        }
    }
}

pub(crate) fn run_parsed(parsed: &ParsedArgs, backends: &Backends, logger: &Logger) -> RunStatus {
    if !parsed.suppress_banner() {
        logger.echo(&banner());
    }
    logger.debug(
        "run.start",
        &format!(
            "{} {} {:?}",
            parsed.product_type(),
            parsed.version(),
            parsed.work_mode()
        ),
    );
    logger.record("run.start", "Arguments accepted", parsed);
    if let Some(path) = logger.log_file() {
        logger.debug("run.start", &format!("Logging to {}", path.display()));
    }

    let host = Host { registry: backends.registry, system: backends.system, logger };
    match WorkModeDispatcher::new(host, backends.elevator).dispatch(parsed) {
        Ok(outcome) => outcome.status(),
        Err(err) => RunStatus::from(&err),
    }
}
