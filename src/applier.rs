//! Cluster mutations driven through `kubectl`/`oc`.

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::ApplyError;

/* ============================= PATCHES ============================= */

/// Only RFC 6902 JSON patches are issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchType {
    Json,
}

impl fmt::Display for PatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Json => "json",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Serialize)]
struct JsonPatchOp<'a> {
    op: &'static str,
    path: &'a str,
    value: &'a serde_json::Value,
}

/// A single-operation RFC 6902 `replace` patch body.
pub fn json_patch_replace(path: &str, value: &serde_json::Value) -> String {
    let ops = [JsonPatchOp {
        op: "replace",
        path,
        value,
    }];
    // Serializing plain strings and an existing Value cannot fail.
    serde_json::to_string(&ops).unwrap_or_default()
}

/* ============================= APPLIER ============================= */

/// Setup, teardown and mutation steps around assertions.
pub trait ManifestApplier: Send + Sync {
    fn apply(&self, path: &Path, namespace: &str)
    -> impl Future<Output = Result<(), ApplyError>> + Send;

    fn patch(
        &self,
        kind: &str,
        name: &str,
        namespace: &str,
        patch_type: PatchType,
        body: &str,
    ) -> impl Future<Output = Result<(), ApplyError>> + Send;

    /// Deleting something already gone is not an error.
    fn delete(&self, path: &Path, namespace: &str)
    -> impl Future<Output = Result<(), ApplyError>> + Send;
}

/// [`ManifestApplier`] that shells out to a kubectl-compatible binary.
#[derive(Debug, Clone)]
pub struct CliApplier {
    binary: String,
    kubeconfig: Option<PathBuf>,
}

impl CliApplier {
    pub fn new(binary: impl Into<String>, kubeconfig: Option<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            kubeconfig,
        }
    }

    fn base_args(&self) -> Vec<String> {
        match &self.kubeconfig {
            Some(path) => vec!["--kubeconfig".to_string(), path.display().to_string()],
            None => Vec::new(),
        }
    }

    fn apply_args(&self, path: &Path, namespace: &str) -> Vec<String> {
        let mut args = self.base_args();
        args.extend([
            "apply".to_string(),
            "-f".to_string(),
            path.display().to_string(),
            "-n".to_string(),
            namespace.to_string(),
        ]);
        args
    }

    fn patch_args(
        &self,
        kind: &str,
        name: &str,
        namespace: &str,
        patch_type: PatchType,
        body: &str,
    ) -> Vec<String> {
        let mut args = self.base_args();
        args.extend([
            "patch".to_string(),
            kind.to_string(),
            name.to_string(),
            "-n".to_string(),
            namespace.to_string(),
            format!("--type={patch_type}"),
            "-p".to_string(),
            body.to_string(),
        ]);
        args
    }

    fn delete_args(&self, path: &Path, namespace: &str) -> Vec<String> {
        let mut args = self.base_args();
        args.extend([
            "delete".to_string(),
            "-f".to_string(),
            path.display().to_string(),
            "-n".to_string(),
            namespace.to_string(),
            "--ignore-not-found".to_string(),
        ]);
        args
    }

    async fn run(&self, args: Vec<String>) -> Result<(), ApplyError> {
        let command = format!("{} {}", self.binary, args.join(" "));
        debug!(command = %command, "cli_invoke");

        let output = Command::new(&self.binary)
            .args(&args)
            .output()
            .await
            .map_err(|source| ApplyError::Spawn {
                command: command.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ApplyError::CommandFailed {
                command,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        info!(
            command = %command,
            stdout = %String::from_utf8_lossy(&output.stdout).trim(),
            "cli_succeeded"
        );
        Ok(())
    }
}

impl ManifestApplier for CliApplier {
    async fn apply(&self, path: &Path, namespace: &str) -> Result<(), ApplyError> {
        self.run(self.apply_args(path, namespace)).await
    }

    async fn patch(
        &self,
        kind: &str,
        name: &str,
        namespace: &str,
        patch_type: PatchType,
        body: &str,
    ) -> Result<(), ApplyError> {
        self.run(self.patch_args(kind, name, namespace, patch_type, body))
            .await
    }

    async fn delete(&self, path: &Path, namespace: &str) -> Result<(), ApplyError> {
        self.run(self.delete_args(path, namespace)).await
    }
}

/* ============================= TESTS ============================= */
