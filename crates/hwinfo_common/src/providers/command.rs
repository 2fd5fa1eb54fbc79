//! External command execution
//!
//! Every OS query is a child process that is spawned and waited on inside
//! the call that needs it; nothing outlives the call.

use std::process::Command;

use tracing::trace;

use crate::error::{HwInfoError, Result};

/// Absolute path avoids PATH-search hijacking
pub const POWERSHELL_EXE: &str = r"C:\Windows\System32\WindowsPowerShell\v1.0\powershell.exe";

pub trait CommandRunner {
    /// Run `program` to completion and return its stdout
    fn run(&self, program: &str, args: &[&str]) -> Result<String>;
}

/// Runs real processes
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<String> {
        trace!("Running {} {:?}", program, args);

        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|source| HwInfoError::Command {
                program: program.to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(HwInfoError::CommandFailed {
                program: program.to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

pub fn run_powershell(runner: &dyn CommandRunner, script: &str) -> Result<String> {
    runner.run(
        POWERSHELL_EXE,
        &["-NoProfile", "-NonInteractive", "-Command", script],
    )
}

/// Quote for a PowerShell single-quoted literal
pub fn ps_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Escape a value for use inside a WQL string literal
pub fn wql_escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::cell::RefCell;

    /// Answers each command with the output of the first rule whose needle
    /// occurs in the program name or arguments
    #[derive(Default)]
    pub struct CannedRunner {
        rules: Vec<(String, Result<String>)>,
        pub calls: RefCell<Vec<String>>,
    }

    impl CannedRunner {
        pub fn on(mut self, needle: &str, output: &str) -> Self {
            self.rules.push((needle.to_string(), Ok(output.to_string())));
            self
        }

        pub fn fail(mut self, needle: &str) -> Self {
            self.rules.push((
                needle.to_string(),
                Err(HwInfoError::Query(format!("{} failed", needle))),
            ));
            self
        }
    }

    impl CommandRunner for CannedRunner {
        fn run(&self, program: &str, args: &[&str]) -> Result<String> {
            let line = format!("{} {}", program, args.join(" "));
            self.calls.borrow_mut().push(line.clone());
            for (needle, output) in &self.rules {
                if line.contains(needle.as_str()) {
                    return match output {
                        Ok(text) => Ok(text.clone()),
                        Err(e) => Err(HwInfoError::Query(e.to_string())),
                    };
                }
            }
            Err(HwInfoError::Query(format!("no canned output for {}", line)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ps_quote() {
        assert_eq!(ps_quote("plain"), "'plain'");
        assert_eq!(ps_quote("it's"), "'it''s'");
    }

    #[test]
    fn test_wql_escape() {
        assert_eq!(
            wql_escape(r"USB\VID_046D&PID_C52B\5&2A"),
            r"USB\\VID_046D&PID_C52B\\5&2A"
        );
        assert_eq!(wql_escape("a'b"), r"a\'b");
    }

    #[test]
    fn test_missing_program_is_command_error() {
        let err = SystemRunner
            .run("hwinfo-definitely-not-a-real-program", &[])
            .unwrap_err();
        assert!(matches!(err, HwInfoError::Command { .. }));
    }
}
