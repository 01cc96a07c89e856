//! Compiling specialized modules with an external clang
//!
//! The specialized source is written to a scratch directory and compiled to
//! LLVM bitcode with `clang -emit-llvm -c`. The toolchain's stderr becomes
//! the diagnostics of a failed compile.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::backing::{CompileRequest, ModuleCompiler};
use crate::config::CompilerConfig;
use crate::error::CompileError;
use crate::node_class::{CompiledModule, EntryPoints};

/// A [`ModuleCompiler`] that runs clang
#[derive(Debug, Clone)]
pub struct ClangModuleCompiler {
    clang_path: PathBuf,
    include_dirs: Vec<PathBuf>,
    timeout: Duration,
}

impl ClangModuleCompiler {
    pub fn new(clang_path: impl Into<PathBuf>) -> Self {
        Self {
            clang_path: clang_path.into(),
            include_dirs: Vec::new(),
            timeout: Duration::from_secs(crate::constants::defaults::COMPILE_TIMEOUT_SECS),
        }
    }

    pub fn from_config(config: &CompilerConfig) -> Self {
        Self {
            clang_path: config.clang_path.clone(),
            include_dirs: config.include_dirs.clone(),
            timeout: Duration::from_secs(config.compile_timeout_secs),
        }
    }

    pub fn with_include_dirs(mut self, include_dirs: Vec<PathBuf>) -> Self {
        self.include_dirs = include_dirs;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns true if the toolchain executable can be found
    pub fn is_available(&self) -> bool {
        which::which(&self.clang_path).is_ok()
    }
}

#[async_trait]
impl ModuleCompiler for ClangModuleCompiler {
    async fn compile(&self, request: &CompileRequest) -> Result<CompiledModule, CompileError> {
        let name = request.fingerprint.as_str();
        let source = request
            .specialized_source
            .as_deref()
            .ok_or_else(|| CompileError::failed(name, format!("'{}' has no source to compile", request.generic_node_class_name)))?;

        let scratch = tempfile::tempdir()
            .map_err(|e| CompileError::failed(name, format!("Failed to create scratch directory: {}", e)))?;
        let source_path = scratch.path().join(format!("{}.c", name));
        let output_path = scratch.path().join(format!("{}.bc", name));

        tokio::fs::write(&source_path, source)
            .await
            .map_err(|e| CompileError::failed(name, format!("Failed to write {}: {}", source_path.display(), e)))?;

        let mut cmd = Command::new(&self.clang_path);
        cmd.arg("-emit-llvm").arg("-c").arg(&source_path).arg("-o").arg(&output_path);
        for dir in &self.include_dirs {
            cmd.arg("-I").arg(dir);
        }
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        log::debug!(
            "Compiling '{}' with {} ({} include dirs)",
            name,
            self.clang_path.display(),
            self.include_dirs.len()
        );

        let child = cmd.spawn().map_err(|e| {
            CompileError::failed(
                name,
                format!("Failed to spawn process '{}': {}", self.clang_path.display(), e),
            )
        })?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(CompileError::failed(
                    name,
                    format!("Failed to wait for process '{}': {}", self.clang_path.display(), e),
                ))
            }
            Err(_) => {
                return Err(CompileError::failed(
                    name,
                    format!("Compile timed out after {}s", self.timeout.as_secs()),
                ))
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let mut diagnostics: Vec<String> = stderr
                .lines()
                .filter(|line| !line.trim().is_empty())
                .map(str::to_string)
                .collect();
            if diagnostics.is_empty() {
                diagnostics.push(format!(
                    "'{}' exited with code {}",
                    self.clang_path.display(),
                    output.status.code().unwrap_or(-1)
                ));
            }
            return Err(CompileError::new(name, diagnostics));
        }

        let bitcode = tokio::fs::read(&output_path)
            .await
            .map_err(|e| CompileError::failed(name, format!("No bitcode at {}: {}", output_path.display(), e)))?;

        log::debug!("Compiled '{}' ({} bytes of bitcode)", name, bitcode.len());
        Ok(CompiledModule::new(
            name,
            request.module_details.clone(),
            EntryPoints::for_node_class(&request.node_class),
        )
        .with_bitcode(bitcode))
    }
}
