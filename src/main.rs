// src/main.rs
use clap::Parser;
use office_remover::cli::RawArgs;
use office_remover::privilege::PrivilegeElevator;
use office_remover::registry::system_registry;
use office_remover::session::{self, Backends};
use office_remover::system::system_ops;

fn main() {
    let raw = RawArgs::parse();

    let registry = system_registry();
    let system = system_ops();
    let elevator = PrivilegeElevator::for_current_process();
    let backends = Backends { registry: registry.as_ref(), system: system.as_ref(), elevator: &elevator };

    let status = session::run(&raw, &backends);
    std::process::exit(status.exit_code());
}
