//! Container runtime abstraction for testability
//!
//! This module provides a trait-based abstraction over the container runtime,
//! enabling dependency injection and mocking for tests.

use std::collections::HashMap;
use std::io::{self, Write};
use std::time::Duration;

/// A running container as reported by the runtime
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerInfo {
    pub id: String,
    pub name: String,
    /// Image reference the container was created from
    pub image: String,
    pub env: HashMap<String, String>,
    pub labels: HashMap<String, String>,
}

impl ContainerInfo {
    /// Short form of the container id
    pub fn short_id(&self) -> &str {
        let end = self
            .id
            .char_indices()
            .nth(12)
            .map_or(self.id.len(), |(i, _)| i);
        &self.id[..end]
    }
}

/// A command to execute inside a container.
///
/// Every argument is passed as a discrete argv element; nothing is ever
/// joined into a shell string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecCommand {
    pub argv: Vec<String>,
    /// Extra environment for the exec session (credentials go here)
    pub env: Vec<(String, String)>,
}

impl ExecCommand {
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
            env: Vec::new(),
        }
    }

    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.env.push((key.to_string(), value.to_string()));
        self
    }

    /// Program name (first argv element)
    pub fn program(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or_default()
    }

    /// Loggable form; environment values are never shown
    pub fn display(&self) -> String {
        let mut parts: Vec<String> = self.env.iter().map(|(k, _)| format!("{}=***", k)).collect();
        parts.extend(self.argv.iter().cloned());
        parts.join(" ")
    }
}

/// Result of a finished exec session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub exit_code: i64,
    pub stderr: Vec<u8>,
    /// Number of stdout bytes forwarded to the sink
    pub stdout_bytes: u64,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("Failed to query container runtime: {0}")]
    Query(String),

    #[error("Failed to start exec in container {container}: {source}")]
    Spawn {
        container: String,
        #[source]
        source: io::Error,
    },

    #[error("Exec in container {container} timed out after {timeout:?}")]
    Timeout { container: String, timeout: Duration },

    #[error("Failed to read exec output: {0}")]
    Stream(#[source] io::Error),

    #[error("Failed to write dump output: {0}")]
    Sink(#[source] io::Error),

    #[error("Failed to parse runtime output: {0}")]
    Parse(String),
}

/// Abstraction for the container runtime, enabling mocking in tests
pub trait ContainerRuntime: Send + Sync {
    /// List running containers with their environment and labels
    fn list_running(&self) -> Result<Vec<ContainerInfo>, RuntimeError>;

    /// Execute a command inside a container, streaming stdout into `stdout`
    fn exec(
        &self,
        container_id: &str,
        command: &ExecCommand,
        stdout: &mut dyn Write,
        timeout: Duration,
    ) -> Result<ExecOutput, RuntimeError>;
}

/// Default implementation using the Docker CLI
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
    query_timeout: Duration,
}

impl DockerCli {
    pub fn new(binary: &str) -> Self {
        Self {
            binary: binary.to_string(),
            query_timeout: Duration::from_secs(60),
        }
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new("docker")
    }
}

impl ContainerRuntime for DockerCli {
    fn list_running(&self) -> Result<Vec<ContainerInfo>, RuntimeError> {
        let ids = super::docker::list_running_ids(&self.binary, self.query_timeout)?;
        super::docker::inspect_containers(&self.binary, &ids, self.query_timeout)
    }

    fn exec(
        &self,
        container_id: &str,
        command: &ExecCommand,
        stdout: &mut dyn Write,
        timeout: Duration,
    ) -> Result<ExecOutput, RuntimeError> {
        super::docker::exec_streaming(&self.binary, container_id, command, stdout, timeout)
    }
}

/// Mock implementation for testing
/// Available for use in external test crates
#[allow(dead_code)]
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Recorded exec invocation
    #[derive(Clone, Debug)]
    pub struct ExecCall {
        pub container_id: String,
        pub argv: Vec<String>,
        pub env: Vec<(String, String)>,
    }

    /// Scripted behaviour of one exec
    #[derive(Clone, Debug)]
    pub enum MockExec {
        Success { stdout: Vec<u8> },
        Failure { exit_code: i64, stdout: Vec<u8>, stderr: String },
        /// Produce output after a delay; exceeding the exec timeout is a timeout
        Delayed { delay: Duration, stdout: Vec<u8> },
        Timeout,
        Panic(String),
    }

    impl MockExec {
        pub fn stdout(data: impl AsRef<[u8]>) -> Self {
            MockExec::Success {
                stdout: data.as_ref().to_vec(),
            }
        }

        pub fn fail(exit_code: i64, stderr: &str) -> Self {
            MockExec::Failure {
                exit_code,
                stdout: Vec::new(),
                stderr: stderr.to_string(),
            }
        }
    }

    /// Mock container runtime for testing
    #[derive(Clone, Default)]
    pub struct MockRuntime {
        containers: Arc<Mutex<Vec<ContainerInfo>>>,
        /// (container id, program) -> scripted response
        responses: Arc<Mutex<HashMap<(String, String), MockExec>>>,
        /// Recorded exec calls
        pub calls: Arc<Mutex<Vec<ExecCall>>>,
        should_fail_list: Arc<Mutex<bool>>,
        in_flight: Arc<AtomicUsize>,
        max_in_flight: Arc<AtomicUsize>,
    }

    impl MockRuntime {
        pub fn new() -> Self {
            Self::default()
        }

        /// Add a running container
        pub fn with_container(self, container: ContainerInfo) -> Self {
            self.containers.lock().unwrap().push(container);
            self
        }

        /// Script the response for `program` inside a container.
        /// Unscripted programs exit with status 127.
        pub fn with_exec(self, container_id: &str, program: &str, response: MockExec) -> Self {
            self.responses
                .lock()
                .unwrap()
                .insert((container_id.to_string(), program.to_string()), response);
            self
        }

        /// Configure list_running to fail
        pub fn with_failing_list(self) -> Self {
            *self.should_fail_list.lock().unwrap() = true;
            self
        }

        /// Get all recorded calls
        pub fn get_calls(&self) -> Vec<ExecCall> {
            self.calls.lock().unwrap().clone()
        }

        /// Calls made inside one container
        pub fn calls_for(&self, container_id: &str) -> Vec<ExecCall> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.container_id == container_id)
                .cloned()
                .collect()
        }

        /// Check if a program was executed in a container
        pub fn was_called(&self, container_id: &str, program: &str) -> bool {
            self.calls_for(container_id)
                .iter()
                .any(|c| c.argv.first().map(String::as_str) == Some(program))
        }

        /// Highest number of exec sessions that were running at once
        pub fn max_concurrent_execs(&self) -> usize {
            self.max_in_flight.load(Ordering::SeqCst)
        }

        fn record_call(&self, container_id: &str, command: &ExecCommand) {
            self.calls.lock().unwrap().push(ExecCall {
                container_id: container_id.to_string(),
                argv: command.argv.clone(),
                env: command.env.clone(),
            });
        }

        fn get_response(&self, container_id: &str, program: &str) -> Option<MockExec> {
            self.responses
                .lock()
                .unwrap()
                .get(&(container_id.to_string(), program.to_string()))
                .cloned()
        }

        fn respond(
            &self,
            container_id: &str,
            response: Option<MockExec>,
            stdout: &mut dyn Write,
            timeout: Duration,
        ) -> Result<ExecOutput, RuntimeError> {
            let timed_out = || RuntimeError::Timeout {
                container: container_id.to_string(),
                timeout,
            };

            match response {
                None => Ok(ExecOutput {
                    exit_code: 127,
                    stderr: b"executable file not found in $PATH".to_vec(),
                    stdout_bytes: 0,
                }),
                Some(MockExec::Success { stdout: data }) => {
                    stdout.write_all(&data).map_err(RuntimeError::Sink)?;
                    Ok(ExecOutput {
                        exit_code: 0,
                        stderr: Vec::new(),
                        stdout_bytes: data.len() as u64,
                    })
                }
                Some(MockExec::Failure {
                    exit_code,
                    stdout: data,
                    stderr,
                }) => {
                    stdout.write_all(&data).map_err(RuntimeError::Sink)?;
                    Ok(ExecOutput {
                        exit_code,
                        stderr: stderr.into_bytes(),
                        stdout_bytes: data.len() as u64,
                    })
                }
                Some(MockExec::Delayed { delay, stdout: data }) => {
                    if delay > timeout {
                        std::thread::sleep(timeout);
                        return Err(timed_out());
                    }
                    std::thread::sleep(delay);
                    stdout.write_all(&data).map_err(RuntimeError::Sink)?;
                    Ok(ExecOutput {
                        exit_code: 0,
                        stderr: Vec::new(),
                        stdout_bytes: data.len() as u64,
                    })
                }
                Some(MockExec::Timeout) => Err(timed_out()),
                Some(MockExec::Panic(message)) => panic!("{}", message),
            }
        }
    }

    impl ContainerRuntime for MockRuntime {
        fn list_running(&self) -> Result<Vec<ContainerInfo>, RuntimeError> {
            if *self.should_fail_list.lock().unwrap() {
                return Err(RuntimeError::Query("Mock list failure".to_string()));
            }
            Ok(self.containers.lock().unwrap().clone())
        }

        fn exec(
            &self,
            container_id: &str,
            command: &ExecCommand,
            stdout: &mut dyn Write,
            timeout: Duration,
        ) -> Result<ExecOutput, RuntimeError> {
            self.record_call(container_id, command);
            let response = self.get_response(container_id, command.program());

            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                self.respond(container_id, response, stdout, timeout)
            }));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            match result {
                Ok(output) => output,
                Err(payload) => std::panic::resume_unwind(payload),
            }
        }
    }
}
