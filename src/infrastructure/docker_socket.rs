// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Rootless (user-scoped) container-platform daemon socket resolution.
//! No fallback to a system-wide socket is attempted.

use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum SocketResolutionError {
    #[error("no rootless container-platform socket found among candidates: {0:?}")]
    NoneFound(Vec<PathBuf>),
}

/// Effective user id used to build default candidate paths.
/// Resolution order: `UID` env var, the `getuid` syscall, the `id -u`
/// subprocess, then a hardcoded fallback.
pub async fn effective_uid() -> u32 {
    if let Ok(uid) = std::env::var("UID") {
        if let Ok(parsed) = uid.parse() {
            return parsed;
        }
    }

    #[cfg(unix)]
    {
        // SAFETY: getuid() takes no arguments and cannot fail.
        let uid = unsafe { libc::getuid() };
        if uid != 0 {
            return uid;
        }
    }

    if let Some(uid) = id_u_subprocess().await {
        return uid;
    }

    1001
}

/// Last-resort fallback for environments where the syscall reports `0`
/// (e.g. inside some rootless namespaces) but the `id` binary is present.
async fn id_u_subprocess() -> Option<u32> {
    let output = Command::new("id").arg("-u").kill_on_drop(true).output().await.ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout).ok()?.trim().parse().ok()
}

/// Build the ordered candidate list: explicit overrides first, then the
/// conventional rootless-daemon locations, then Docker Desktop's sockets.
pub fn candidate_paths(uid: u32, home: Option<&str>) -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(path) = std::env::var("DOCKER_ROOTLESS_SOCKET_PATH") {
        candidates.push(PathBuf::from(path));
    }

    if let Ok(host) = std::env::var("DOCKER_HOST") {
        if let Some(stripped) = host.strip_prefix("unix://") {
            candidates.push(PathBuf::from(stripped));
        }
    }

    candidates.push(PathBuf::from(format!("/run/user/{uid}/docker.sock")));
    candidates.push(PathBuf::from(format!("/tmp/docker-{uid}/docker.sock")));
    candidates.push(PathBuf::from(format!("/var/run/user/{uid}/docker.sock")));

    if let Some(home) = home {
        candidates.push(Path::new(home).join(".docker/run/docker.sock"));
        candidates.push(Path::new(home).join(".docker/desktop/docker.sock"));
    }

    candidates
}

/// Resolve the daemon socket path to use for every subsequent platform
/// command. First existing-socket candidate whose probe succeeds within
/// 5000 ms wins.
pub async fn resolve_socket_path() -> Result<PathBuf, SocketResolutionError> {
    let uid = effective_uid().await;
    let home = std::env::var("HOME").ok();
    let candidates = candidate_paths(uid, home.as_deref());

    for candidate in &candidates {
        if !is_socket(candidate) {
            continue;
        }

        debug!(path = %candidate.display(), "probing rootless daemon socket candidate");
        if probe(candidate).await {
            info!(path = %candidate.display(), "resolved rootless daemon socket");
            return Ok(candidate.clone());
        }
    }

    Err(SocketResolutionError::NoneFound(candidates))
}

fn is_socket(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|meta| meta.file_type().is_socket())
        .unwrap_or(false)
}

async fn probe(path: &Path) -> bool {
    let host = format!("unix://{}", path.display());
    let probe = Command::new("docker")
        .arg("version")
        .arg("--format")
        .arg("{{.Server.Version}}")
        .env("DOCKER_HOST", host)
        .kill_on_drop(true)
        .output();

    matches!(
        tokio::time::timeout(Duration::from_millis(5000), probe).await,
        Ok(Ok(output)) if output.status.success()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // candidate_paths() reads process-global env vars; serialize the tests
    // that touch them so they don't race under the default parallel runner.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn candidate_order_matches_spec() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var("DOCKER_ROOTLESS_SOCKET_PATH");
        std::env::remove_var("DOCKER_HOST");
        let paths = candidate_paths(1000, Some("/home/u"));
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/run/user/1000/docker.sock"),
                PathBuf::from("/tmp/docker-1000/docker.sock"),
                PathBuf::from("/var/run/user/1000/docker.sock"),
                PathBuf::from("/home/u/.docker/run/docker.sock"),
                PathBuf::from("/home/u/.docker/desktop/docker.sock"),
            ]
        );
    }

    #[test]
    fn env_override_takes_priority() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("DOCKER_ROOTLESS_SOCKET_PATH", "/custom/docker.sock");
        let paths = candidate_paths(1000, None);
        std::env::remove_var("DOCKER_ROOTLESS_SOCKET_PATH");
        assert_eq!(paths[0], PathBuf::from("/custom/docker.sock"));
    }

    #[test]
    fn docker_host_unix_prefix_is_stripped() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var("DOCKER_ROOTLESS_SOCKET_PATH");
        std::env::set_var("DOCKER_HOST", "unix:///opt/docker.sock");
        let paths = candidate_paths(1000, None);
        std::env::remove_var("DOCKER_HOST");
        assert_eq!(paths[0], PathBuf::from("/opt/docker.sock"));
    }
}
