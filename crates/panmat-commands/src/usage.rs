//! Argument contracts of the front-end commands.

use panmat_core::HostValue;

use crate::error::{CommandError, Result};

/// Input/output contract of one command and the messages it reports.
#[derive(Debug, Clone, Copy)]
pub struct Usage {
    pub name: &'static str,
    /// Number of string inputs.
    pub inputs: usize,
    /// Number of outputs.
    pub outputs: usize,
    pub missing: &'static str,
    pub not_string: &'static str,
    pub wrong_outputs: &'static str,
}

pub const PANNET: Usage = Usage {
    name: "pannet",
    inputs: 1,
    outputs: 0,
    missing: "Error: missing filename. Usage: pannet('filename')",
    not_string: "Error: filename must be a string. Usage: pannet('filename')",
    wrong_outputs: "Error: output variable is not required. Usage: pannet('filename')",
};

pub const PANSIMC: Usage = Usage {
    name: "pansimc",
    inputs: 1,
    outputs: 0,
    missing: "Error: missed simulator command. Usage: pansimc('command')",
    not_string: "Error: 'command' must be a string. Usage: pansimc('command')",
    wrong_outputs: "Error: output variable is not required. Usage: pansimc('command')",
};

pub const PANGET: Usage = Usage {
    name: "panget",
    inputs: 1,
    outputs: 1,
    missing: "Error: missing waveform. Usage: panget('waveform')",
    not_string: "Error: waveform must be a string. Usage: y = panget('waveform')",
    wrong_outputs: "Error: output variable is required. Usage: y = panget('waveform')",
};

pub const PANREDRAW: Usage = Usage {
    name: "panredraw",
    inputs: 1,
    outputs: 0,
    missing: "Error: missing argument. Usage: panredraw('on/off')",
    not_string: "Error: argument must be a string. Usage: panredraw('on/off')",
    wrong_outputs: "Error: no output variable is required. Usage: panredraw('on/off')",
};

pub const PANCLEARWAV: Usage = Usage {
    name: "panclearwav",
    inputs: 1,
    outputs: 0,
    missing: "Error: missing argument. Usage: panclearwav('name')",
    not_string: "Error: argument must be a string. Usage: panclearwav('name')",
    wrong_outputs: "Error: no output variable is required. Usage: panclearwav('name')",
};

pub const PANRAW: Usage = Usage {
    name: "panraw",
    inputs: 2,
    outputs: 1,
    missing: "Error: missing arguments. Usage: y = panraw('rawfile', 'variable')",
    not_string: "Error: arguments must be strings. Usage: y = panraw('rawfile', 'variable')",
    wrong_outputs: "Error: output variable is required. Usage: y = panraw('rawfile', 'variable')",
};

/// Every command, for dispatch and listings.
pub const COMMANDS: [Usage; 6] = [PANNET, PANSIMC, PANGET, PANREDRAW, PANCLEARWAV, PANRAW];

impl Usage {
    /// Check the call shape and return the string inputs.
    pub fn check<'a>(&self, args: &'a [HostValue], nargout: usize) -> Result<Vec<&'a str>> {
        if args.len() != self.inputs {
            return Err(CommandError::usage(self.missing));
        }
        let strings = args
            .iter()
            .map(|a| a.as_str().ok_or_else(|| CommandError::usage(self.not_string)))
            .collect::<Result<Vec<_>>>()?;
        if nargout != self.outputs {
            return Err(CommandError::usage(self.wrong_outputs));
        }
        Ok(strings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_order() {
        let err = PANSIMC.check(&[], 0).unwrap_err();
        assert_eq!(err.to_string(), PANSIMC.missing);

        let err = PANSIMC.check(&[HostValue::from(1.0)], 0).unwrap_err();
        assert_eq!(err.to_string(), PANSIMC.not_string);

        let err = PANSIMC.check(&[HostValue::from("tran")], 1).unwrap_err();
        assert_eq!(err.to_string(), PANSIMC.wrong_outputs);

        assert_eq!(PANSIMC.check(&[HostValue::from("tran")], 0).unwrap(), vec!["tran"]);
    }

    #[test]
    fn test_panget_requires_output() {
        assert!(PANGET.check(&[HostValue::from("v(out)")], 0).is_err());
        assert!(PANGET.check(&[HostValue::from("v(out)")], 1).is_ok());
    }
}
