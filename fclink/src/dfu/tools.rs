//! External programs the flash sequence shells out to.

use {
    crate::error::{Error, Result},
    log::{debug, trace},
    std::{
        env,
        ffi::OsString,
        fmt,
        path::{Path, PathBuf},
        process::{Command, Stdio},
    },
};

/// One invocation of an external program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    /// Program name or path.
    pub program: PathBuf,
    /// Arguments.
    pub args: Vec<String>,
    /// Working directory, if not the current one.
    pub dir: Option<PathBuf>,
    /// Variables added to the inherited environment.
    pub env: Vec<(String, String)>,
}

impl ToolCommand {
    /// Invocation of `program` with no arguments.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            dir: None,
            env: Vec::new(),
        }
    }

    /// Append an argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args
            .extend(args.into_iter().map(Into::into));
        self
    }

    /// Run in `dir`.
    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    /// Add an environment variable.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env
            .push((key.into(), value.into()));
        self
    }

    fn tool_name(&self) -> String {
        self.program
            .display()
            .to_string()
    }

    fn to_process(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command.envs(
            self.env
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str())),
        );
        if let Some(dir) = &self.dir {
            command.current_dir(dir);
        }
        command
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.env {
            write!(f, "{key}={value} ")?;
        }
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Runs external programs.
pub trait ToolRunner {
    /// Full path of `program`, searching `PATH` for bare names.
    fn resolve(&self, program: &Path) -> Result<PathBuf>;

    /// Run to completion with inherited stdio. A nonzero exit is an error.
    fn run(&mut self, command: &ToolCommand) -> Result<()>;

    /// Run and capture stdout. The exit status is not checked.
    fn output(&mut self, command: &ToolCommand) -> Result<String>;
}

/// [`ToolRunner`] backed by [`std::process::Command`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ToolRunner for ProcessRunner {
    fn resolve(&self, program: &Path) -> Result<PathBuf> {
        let name = program.display();
        if program.components().count() > 1 {
            return if is_executable(program) {
                Ok(program.to_path_buf())
            } else {
                Err(Error::tool(name.to_string(), "not an executable file"))
            };
        }

        let path = env::var_os("PATH").unwrap_or_default();
        env::split_paths(&path)
            .flat_map(|dir| candidates(&dir, program))
            .find(|candidate| is_executable(candidate))
            .inspect(|found| debug!("Resolved {name} to {}", found.display()))
            .ok_or_else(|| Error::tool(name.to_string(), "not found in PATH"))
    }

    fn run(&mut self, command: &ToolCommand) -> Result<()> {
        debug!("Running {command}");
        let status = command
            .to_process()
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|e| Error::tool(command.tool_name(), format!("failed to launch: {e}")))?;

        if status.success() {
            Ok(())
        } else {
            Err(Error::tool(command.tool_name(), format!("exited with {status}")))
        }
    }

    fn output(&mut self, command: &ToolCommand) -> Result<String> {
        trace!("Capturing {command}");
        let output = command
            .to_process()
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .map_err(|e| Error::tool(command.tool_name(), format!("failed to launch: {e}")))?;
        if !output.status.success() {
            trace!("{command} exited with {}", output.status);
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn candidates(dir: &Path, program: &Path) -> Vec<PathBuf> {
    let plain = dir.join(program);
    if cfg!(windows) && program.extension().is_none() {
        let mut exe = OsString::from(plain.as_os_str());
        exe.push(".exe");
        vec![plain, PathBuf::from(exe)]
    } else {
        vec![plain]
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .is_ok_and(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
