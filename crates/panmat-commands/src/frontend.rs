//! The commands a host script calls to drive the simulator.

use std::path::Path;
use std::rc::{Rc, Weak};

use panmat_core::{
    Host, HostArray, HostValue, StatusOutcome, StatusPolicy, Workspace, propagate_status, to_host,
};
use panmat_engine::{BridgeConfig, Engine, initialise};

use crate::error::{CommandError, Result};
use crate::usage::{COMMANDS, PANCLEARWAV, PANGET, PANNET, PANRAW, PANREDRAW, PANSIMC};

/// Front-end commands bound to one host.
pub struct Frontend {
    config: BridgeConfig,
    host: Rc<dyn Host>,
}

impl Frontend {
    pub fn new(config: BridgeConfig, host: Rc<dyn Host>) -> Self {
        Self { config, host }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// `pannet('netlist args')`: load the engine and run it on a command line.
    pub fn pannet(&self, args: &[HostValue], nargout: usize) -> Result<StatusOutcome> {
        let inputs = PANNET.check(args, nargout)?;
        let code = initialise(&self.config, Rc::clone(&self.host), inputs[0])?;
        log::debug!("engine main returned {}", code);
        Ok(propagate_status(self.host.as_ref(), code, StatusPolicy::Replace)?)
    }

    /// `pansimc('command')`: run one simulator command.
    pub fn pansimc(&self, args: &[HostValue], nargout: usize) -> Result<StatusOutcome> {
        let inputs = PANSIMC.check(args, nargout)?;
        let engine = Engine::attach(&self.config)?;
        let code = engine.execute_command(inputs[0])?;
        Ok(propagate_status(self.host.as_ref(), code, StatusPolicy::Accumulate)?)
    }

    /// `y = panget('name')`: read a simulation result.
    pub fn panget(&self, args: &[HostValue], nargout: usize) -> Result<HostValue> {
        let inputs = PANGET.check(args, nargout)?;
        let engine = Engine::attach(&self.config)?;
        let value = engine.get_value(inputs[0])?;
        Ok(to_host(&value)?)
    }

    /// `panredraw('on' | 'off')`.
    pub fn panredraw(&self, args: &[HostValue], nargout: usize) -> Result<()> {
        let inputs = PANREDRAW.check(args, nargout)?;
        let on = if inputs[0].eq_ignore_ascii_case("on") {
            true
        } else if inputs[0].eq_ignore_ascii_case("off") {
            false
        } else {
            return Err(CommandError::usage(
                "Error: argument must be the 'on' or 'off' string.",
            ));
        };
        Engine::attach(&self.config)?.set_redraw(on)?;
        Ok(())
    }

    /// `panclearwav('name')`: delete a memory waveform.
    pub fn panclearwav(&self, args: &[HostValue], nargout: usize) -> Result<()> {
        let inputs = PANCLEARWAV.check(args, nargout)?;
        Engine::attach(&self.config)?.delete_waveform(inputs[0])?;
        Ok(())
    }

    /// `y = panraw('rawfile', 'variable')`: read a real raw-file variable.
    pub fn panraw(&self, args: &[HostValue], nargout: usize) -> Result<HostValue> {
        let inputs = PANRAW.check(args, nargout)?;
        let values = Engine::attach(&self.config)?.read_raw(Path::new(inputs[0]), inputs[1])?;
        Ok(HostArray::column(values).into())
    }

    /// Run a command by name.
    pub fn dispatch(&self, name: &str, args: &[HostValue], nargout: usize) -> Result<Vec<HostValue>> {
        match name {
            "pannet" => self.pannet(args, nargout).map(|_| Vec::new()),
            "pansimc" => self.pansimc(args, nargout).map(|_| Vec::new()),
            "panget" => self.panget(args, nargout).map(|v| vec![v]),
            "panredraw" => self.panredraw(args, nargout).map(|_| Vec::new()),
            "panclearwav" => self.panclearwav(args, nargout).map(|_| Vec::new()),
            "panraw" => self.panraw(args, nargout).map(|v| vec![v]),
            other => Err(CommandError::usage(format!("Error: unknown command <{}>", other))),
        }
    }

    /// Make every command callable as a function of `workspace`.
    ///
    /// Control functions running inside the engine can then drive it again.
    pub fn register_commands(self: &Rc<Self>, workspace: &Workspace) {
        for usage in COMMANDS {
            let frontend: Weak<Frontend> = Rc::downgrade(self);
            workspace.register_function(usage.name, move |_, args, nargout| {
                let frontend = frontend.upgrade().ok_or_else(|| {
                    panmat_core::Error::CommandFailed(format!("{} is no longer available", usage.name))
                })?;
                frontend
                    .dispatch(usage.name, args, nargout)
                    .map_err(|e| match e {
                        CommandError::Core(e) => e,
                        other => panmat_core::Error::CommandFailed(other.to_string()),
                    })
            });
        }
    }
}
