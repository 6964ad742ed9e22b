// src/dispatcher.rs
use std::fmt::Write as FmtWrite;

use crate::args::{ParsedArgs, WorkMode};
use crate::error_handling::{RemoverError, RunStatus};
use crate::outcome::RemovalReport;
use crate::privilege::{ElevationState, PrivilegeElevator};
use crate::products::{Host, OfficeProductStrategy, Presence, strategy_for};

/// Seconds between scheduling the restart and the machine going down.
pub const RESTART_DELAY_SECS: u32 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Detected(Presence),
    Removed { report: RemovalReport, restart_scheduled: bool },
    /// Work was handed to an elevated relaunch.
    Deferred,
}

impl DispatchOutcome {
    pub fn status(&self) -> RunStatus {
        match self {
            DispatchOutcome::Removed { report, .. } if report.has_failures() => RunStatus::TargetsFailed,
            _ => RunStatus::Completed,
        }
    }
}

/// Routes a validated invocation to the strategy for its product type.
pub struct WorkModeDispatcher<'a> {
    host: Host<'a>,
    elevator: &'a PrivilegeElevator,
}

impl<'a> WorkModeDispatcher<'a> {
    pub fn new(host: Host<'a>, elevator: &'a PrivilegeElevator) -> Self {
        Self { host, elevator }
    }

    pub fn dispatch(&self, args: &ParsedArgs) -> Result<DispatchOutcome, RemoverError> {
        let strategy = strategy_for(args.product_type(), args.version());
        match args.work_mode() {
            WorkMode::Detect => Ok(self.detect(strategy.as_ref(), args)),
            WorkMode::Remove | WorkMode::Uninstall => {
                if !self.elevated(args)? {
                    return Ok(DispatchOutcome::Deferred);
                }
                Ok(self.remove(strategy.as_ref(), args))
            }
        }
    }

    fn detect(&self, strategy: &dyn OfficeProductStrategy, args: &ParsedArgs) -> DispatchOutcome {
        let logger = self.host.logger;
        let presence = strategy.detect(&self.host);
        let subject = format!("{} ({})", args.version().marketing_name(), args.product_type());
        match &presence {
            Presence::Present { metadata, .. } => {
                logger.info("detect.result", &format!("{}: Present", subject));
                let mut details = String::new();
                for (key, value) in metadata {
                    let _ = writeln!(details, "  {}: {}", key, value);
                }
                logger.echo(details.trim_end());
            }
            Presence::Absent => logger.info("detect.result", &format!("{}: Absent", subject)),
        }
        logger.record("detect.result", &subject, &presence);
        DispatchOutcome::Detected(presence)
    }

    /// True when this process may mutate; false when the work moved to a relaunch.
    fn elevated(&self, args: &ParsedArgs) -> Result<bool, RemoverError> {
        let logger = self.host.logger;
        let state = self.elevator.state();
        logger.debug("elevation.check", &format!("{:?}", state));
        if state == ElevationState::Elevated {
            return Ok(true);
        }
        let state = self
            .elevator
            .ensure_elevated(args)
            .inspect_err(|err| logger.error("elevation.denied", &err.to_string()))?;
        if state == ElevationState::ElevationRequested {
            logger.info("elevation.requested", "Continuing in an elevated window");
        }
        Ok(state == ElevationState::Elevated)
    }

    fn remove(&self, strategy: &dyn OfficeProductStrategy, args: &ParsedArgs) -> DispatchOutcome {
        let logger = self.host.logger;
        let report = strategy.remove(&self.host, args);

        if !report.results.is_empty() {
            logger.echo(&report.render_table());
        }
        let summary = report.summary();
        if report.has_failures() {
            logger.warn("report.summary", &summary);
        } else {
            logger.info("report.summary", &summary);
        }
        logger.record("report.summary", &summary, &report);

        let restart_scheduled = self.restart_if_needed(strategy, args, &report);
        DispatchOutcome::Removed { report, restart_scheduled }
    }

    fn restart_if_needed(&self, strategy: &dyn OfficeProductStrategy, args: &ParsedArgs, report: &RemovalReport) -> bool {
        let logger = self.host.logger;
        let reason = if args.no_restart() {
            Some("--no-restart was given")
        } else if !strategy.requires_restart() {
            Some("not needed for this product type")
        } else if !report.removed_anything() {
            Some("nothing was removed")
        } else {
            None
        };
        if let Some(reason) = reason {
            logger.debug("restart.skipped", &format!("Restart skipped: {}", reason));
            return false;
        }
        match self.host.system.schedule_restart(RESTART_DELAY_SECS) {
            Ok(()) => {
                logger.warn(
                    "restart.scheduled",
                    &format!("The computer will restart in {} seconds", RESTART_DELAY_SECS),
                );
                true
            }
            Err(e) => {
                logger.warn("restart.skipped", &format!("Could not schedule a restart: {:#}", e));
                false
            }
        }
    }
}
