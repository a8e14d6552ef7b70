//! Container lifecycle helpers for integration tests

use anyhow::{bail, Result};
use std::process::Command;
use std::thread;
use std::time::Duration;

/// Guard that ensures Docker container cleanup on drop (even on panic)
pub struct ContainerGuard {
    name: String,
}

impl ContainerGuard {
    pub fn new(name: String) -> Self {
        Self { name }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for ContainerGuard {
    fn drop(&mut self) {
        // -v also removes the anonymous data volume
        let _ = Command::new("docker").args(["rm", "-f", "-v", &self.name]).output();
    }
}

pub fn is_docker_available() -> bool {
    Command::new("docker")
        .arg("ps")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Unique container name for one test
pub fn container_name(prefix: &str) -> String {
    format!("dbab-it-{}-{}", prefix, std::process::id())
}

/// `docker run -d` with environment variables; the guard removes it again
pub fn start_container(name: &str, image: &str, env: &[(&str, &str)]) -> Result<ContainerGuard> {
    let mut cmd = Command::new("docker");
    cmd.args(["run", "-d", "--name", name]);
    for (key, value) in env {
        cmd.arg("-e").arg(format!("{}={}", key, value));
    }
    cmd.arg(image);

    let output = cmd.output()?;
    let guard = ContainerGuard::new(name.to_string());
    if !output.status.success() {
        bail!(
            "docker run {} failed: {}",
            image,
            String::from_utf8_lossy(&output.stderr)
        );
    }
    Ok(guard)
}

/// Poll a readiness command inside the container
pub fn wait_until_ready(name: &str, probe: &[&str]) -> Result<()> {
    for _ in 0..60 {
        let ready = Command::new("docker")
            .arg("exec")
            .arg(name)
            .args(probe)
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false);
        if ready {
            return Ok(());
        }
        thread::sleep(Duration::from_secs(1));
    }
    bail!("{} did not become ready", name)
}

/// Run a command inside the container and return stdout
pub fn exec(name: &str, argv: &[&str]) -> Result<String> {
    let output = Command::new("docker").arg("exec").arg(name).args(argv).output()?;
    if !output.status.success() {
        bail!(
            "{:?} failed in {}: {}",
            argv,
            name,
            String::from_utf8_lossy(&output.stderr)
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
