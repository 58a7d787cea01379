use std::fs;
use std::io::Write;
use std::process::Command;
use std::sync::Arc;

use crate::types::{
    Instance, InputScope, OutputScope, PermissionType, RequiredPermission, TypeIdentifier,
};

use super::{required_input, Activity, ActivityFactory, ActivityFault, PermissionGuard};

const FILE_PATH: &str = "filePath";
const CONTENT: &str = "content";

fn text(value: impl Into<String>) -> Instance {
    Instance::new(TypeIdentifier::core("Text"), value)
}

/// `core.ReadFile(filePath: core.Path) -> content: core.Text`
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadFile;

impl Activity for ReadFile {
    fn identifier(&self) -> &str {
        "core.ReadFile"
    }

    fn run(&self, input: &InputScope, guard: &PermissionGuard) -> Result<OutputScope, ActivityFault> {
        let path = match required_input(input, FILE_PATH, "core.Path") {
            Ok(path) => path.read(),
            Err(message) => return Ok(OutputScope::failure(message)),
        };
        guard.check(RequiredPermission::new(PermissionType::ReadFile, path))?;
        let content = fs::read_to_string(path)?;
        Ok(OutputScope::new().with(CONTENT, text(content)))
    }
}

/// `core.WriteFile(filePath: core.Path, content: core.Text)`
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteFile;

impl Activity for WriteFile {
    fn identifier(&self) -> &str {
        "core.WriteFile"
    }

    fn run(&self, input: &InputScope, guard: &PermissionGuard) -> Result<OutputScope, ActivityFault> {
        let (path, content) = match (
            required_input(input, FILE_PATH, "core.Path"),
            required_input(input, CONTENT, "core.Text"),
        ) {
            (Ok(path), Ok(content)) => (path.read(), content.read()),
            (Err(message), _) | (_, Err(message)) => return Ok(OutputScope::failure(message)),
        };
        guard.check(RequiredPermission::new(PermissionType::WriteFile, path))?;
        fs::write(path, content)?;
        Ok(OutputScope::new())
    }
}

/// `core.PrintToConsole(text: core.Text)`
#[derive(Debug, Clone, Copy, Default)]
pub struct PrintToConsole;

impl Activity for PrintToConsole {
    fn identifier(&self) -> &str {
        "core.PrintToConsole"
    }

    fn run(&self, input: &InputScope, _guard: &PermissionGuard) -> Result<OutputScope, ActivityFault> {
        let line = match required_input(input, "text", "core.Text") {
            Ok(line) => line.read(),
            Err(message) => return Ok(OutputScope::failure(message)),
        };
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{line}")?;
        Ok(OutputScope::new())
    }
}

/// `core.ExecCmd(cmd: core.Text, args: core.Text) -> returnValue: core.Text`
///
/// `args` is split on whitespace. A non-zero exit status is a domain error.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecCmd;

impl Activity for ExecCmd {
    fn identifier(&self) -> &str {
        "core.ExecCmd"
    }

    fn run(&self, input: &InputScope, guard: &PermissionGuard) -> Result<OutputScope, ActivityFault> {
        let (cmd, args) = match (
            required_input(input, "cmd", "core.Text"),
            required_input(input, "args", "core.Text"),
        ) {
            (Ok(cmd), Ok(args)) => (cmd.read(), args.read()),
            (Err(message), _) | (_, Err(message)) => return Ok(OutputScope::failure(message)),
        };
        guard.check(RequiredPermission::new(PermissionType::ExecuteFile, cmd))?;
        let output = Command::new(cmd).args(args.split_whitespace()).output()?;
        if !output.status.success() {
            return Ok(OutputScope::failure(format!(
                "'{cmd}' exited with {}",
                output.status
            )));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(OutputScope::new().with("returnValue", text(stdout.trim_end())))
    }
}

/// Factories for every built-in activity, keyed by identifier.
#[must_use]
pub fn core_activities() -> Vec<(&'static str, ActivityFactory)> {
    vec![
        ("core.ReadFile", || Arc::new(ReadFile)),
        ("core.WriteFile", || Arc::new(WriteFile)),
        ("core.PrintToConsole", || Arc::new(PrintToConsole)),
        ("core.ExecCmd", || Arc::new(ExecCmd)),
    ]
}
