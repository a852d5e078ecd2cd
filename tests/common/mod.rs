//! Shared helpers for integration tests.

#![allow(dead_code)]

use nbdns::command_runner::format_command;
use nbdns::{CommandOutput, CommandRunner, Result};
use std::cell::RefCell;

/// Records every command line instead of executing it.
///
/// Commands matching a prefix in `failing` exit 1; everything else succeeds
/// with empty output.
#[derive(Default)]
pub struct SpyRunner {
    calls: RefCell<Vec<String>>,
    failing: Vec<String>,
}

impl SpyRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(prefixes: &[&str]) -> Self {
        Self {
            failing: prefixes.iter().map(|p| p.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

impl CommandRunner for SpyRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        let line = format_command(program, args);
        self.calls.borrow_mut().push(line.clone());
        if self.failing.iter().any(|p| line.starts_with(p.as_str())) {
            Ok(CommandOutput {
                stdout: String::new(),
                stderr: format!("{}: simulated failure", program),
                exit_code: Some(1),
                success: false,
            })
        } else {
            Ok(CommandOutput::empty_success())
        }
    }
}
