//! OS service manager control (`service` / `update-rc.d`).

use crate::command_builder;
use crate::error::Result;
use crate::session::Session;
use crate::ssh::CommandResult;

pub struct ServiceControl<'a> {
    session: &'a Session,
}

impl<'a> ServiceControl<'a> {
    pub fn new(session: &'a Session) -> Self {
        Self { session }
    }

    pub fn start(&self, name: &str) -> Result<CommandResult> {
        log_status!("service", "Starting {}", name);
        self.session.run(&command_builder::service(name, "start"))
    }

    pub fn stop(&self, name: &str) -> Result<CommandResult> {
        log_status!("service", "Stopping {}", name);
        self.session.run(&command_builder::service(name, "stop"))
    }

    /// Register an init script for the default runlevels.
    pub fn register_defaults(&self, name: &str) -> Result<CommandResult> {
        self.session.run(&command_builder::register_init_script(name))
    }
}
