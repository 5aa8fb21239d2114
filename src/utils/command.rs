// src/utils/command.rs

use std::{
    io::{self, Read},
    process::{Child, Command, Stdio},
    thread,
    time::{Duration, Instant},
};

use crate::{constants::COMMAND_POLL_INTERVAL, errors::CommandError};

/// Captured result of an external command that ran to completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` if the process was terminated by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// Converts a non-zero exit into [`CommandError::Failed`].
    pub fn into_result(self, program: &str) -> Result<CommandOutput, CommandError> {
        if self.success() {
            Ok(self)
        } else {
            let stderr = if self.stderr.trim().is_empty() {
                self.stdout.trim().to_string()
            } else {
                self.stderr.trim().to_string()
            };
            Err(CommandError::Failed {
                program: program.to_string(),
                code: self.status,
                stderr,
            })
        }
    }
}

/// Runs external programs. Every OS utility this tool drives (`sc`,
/// `schtasks`, `powershell`, `winget`, ...) goes through this seam.
pub trait CommandRunner: Send + Sync {
    /// Runs `program` once with `args`, killing it if it outlives `timeout`.
    fn run(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<CommandOutput, CommandError>;
}

/// [`CommandRunner`] backed by `std::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl SystemRunner {
    fn spawn(program: &str, args: &[&str]) -> Result<Child, CommandError> {
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            const CREATE_NO_WINDOW: u32 = 0x0800_0000;
            command.creation_flags(CREATE_NO_WINDOW);
        }

        command.spawn().map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => CommandError::NotFound(program.to_string()),
            io::ErrorKind::PermissionDenied => CommandError::PermissionDenied(program.to_string()),
            _ => CommandError::Spawn {
                program: program.to_string(),
                source: e,
            },
        })
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buffer);
        }
        buffer
    })
}

impl CommandRunner for SystemRunner {
    fn run(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<CommandOutput, CommandError> {
        tracing::trace!("Running '{} {}'", program, args.join(" "));
        let mut child = Self::spawn(program, args)?;

        // Pipes are drained on their own threads so a chatty child cannot block on a full pipe
        let stdout_reader = drain(child.stdout.take());
        let stderr_reader = drain(child.stderr.take());

        let deadline = Instant::now() + timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    tracing::warn!("'{}' timed out after {:?}", program, timeout);
                    return Err(CommandError::Timeout {
                        program: program.to_string(),
                        seconds: timeout.as_secs(),
                    });
                }
                Ok(None) => thread::sleep(COMMAND_POLL_INTERVAL),
                Err(e) => {
                    return Err(CommandError::Spawn {
                        program: program.to_string(),
                        source: e,
                    })
                }
            }
        };

        let stdout = stdout_reader.join().unwrap_or_default();
        let stderr = stderr_reader.join().unwrap_or_default();

        Ok(CommandOutput {
            status: status.code(),
            stdout: String::from_utf8_lossy(&stdout).to_string(),
            stderr: String::from_utf8_lossy(&stderr).to_string(),
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::{
        sync::{Mutex, MutexGuard, PoisonError},
        time::Duration,
    };

    use super::{CommandOutput, CommandRunner};
    use crate::errors::CommandError;

    #[derive(Clone)]
    enum Reply {
        Output(CommandOutput),
        Timeout,
        NotFound,
    }

    /// Fake runner that answers by command-line prefix and records every call.
    ///
    /// Rules are matched in insertion order against `"program arg1 arg2 ..."`.
    /// Unmatched commands fail with `NotFound`.
    #[derive(Default)]
    pub struct ScriptedRunner {
        rules: Mutex<Vec<(String, Reply)>>,
        calls: Mutex<Vec<String>>,
    }

    fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
        mutex.lock().unwrap_or_else(PoisonError::into_inner)
    }

    impl ScriptedRunner {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn on(self, prefix: &str, stdout: &str) -> Self {
            self.reply(
                prefix,
                Reply::Output(CommandOutput {
                    status: Some(0),
                    stdout: stdout.to_string(),
                    stderr: String::new(),
                }),
            )
        }

        pub fn on_failure(self, prefix: &str, code: i32, stderr: &str) -> Self {
            self.reply(
                prefix,
                Reply::Output(CommandOutput {
                    status: Some(code),
                    stdout: String::new(),
                    stderr: stderr.to_string(),
                }),
            )
        }

        pub fn on_output(self, prefix: &str, output: CommandOutput) -> Self {
            self.reply(prefix, Reply::Output(output))
        }

        pub fn on_timeout(self, prefix: &str) -> Self {
            self.reply(prefix, Reply::Timeout)
        }

        pub fn on_missing(self, prefix: &str) -> Self {
            self.reply(prefix, Reply::NotFound)
        }

        fn reply(self, prefix: &str, reply: Reply) -> Self {
            lock(&self.rules).push((prefix.to_string(), reply));
            self
        }

        pub fn calls(&self) -> Vec<String> {
            lock(&self.calls).clone()
        }
    }

    impl CommandRunner for ScriptedRunner {
        fn run(
            &self,
            program: &str,
            args: &[&str],
            timeout: Duration,
        ) -> Result<CommandOutput, CommandError> {
            let line = std::iter::once(program)
                .chain(args.iter().copied())
                .collect::<Vec<_>>()
                .join(" ");
            lock(&self.calls).push(line.clone());

            let reply = lock(&self.rules)
                .iter()
                .find(|(prefix, _)| line.starts_with(prefix.as_str()))
                .map(|(_, reply)| reply.clone());

            match reply {
                Some(Reply::Output(output)) => Ok(output),
                Some(Reply::Timeout) => Err(CommandError::Timeout {
                    program: program.to_string(),
                    seconds: timeout.as_secs(),
                }),
                Some(Reply::NotFound) | None => Err(CommandError::NotFound(program.to_string())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_result_prefers_stderr() {
        let output = CommandOutput {
            status: Some(5),
            stdout: "partial".into(),
            stderr: "Access is denied.\r\n".into(),
        };
        match output.into_result("sc") {
            Err(CommandError::Failed { code, stderr, .. }) => {
                assert_eq!(code, Some(5));
                assert_eq!(stderr, "Access is denied.");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_missing_program_is_not_found() {
        let result = SystemRunner.run(
            "pc-toolkit-definitely-missing-binary",
            &["--version"],
            Duration::from_secs(5),
        );
        assert!(matches!(result, Err(CommandError::NotFound(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_captures_stdout_and_exit_code() {
        let output = SystemRunner
            .run("sh", &["-c", "echo hello; exit 3"], Duration::from_secs(5))
            .unwrap();
        assert_eq!(output.stdout.trim(), "hello");
        assert_eq!(output.status, Some(3));
        assert!(!output.success());
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_kills_process() {
        let started = Instant::now();
        let result = SystemRunner.run("sleep", &["10"], Duration::from_millis(200));
        assert!(matches!(result, Err(CommandError::Timeout { .. })));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
