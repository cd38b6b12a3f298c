//! The external `build-spec` tool: how to launch it and what to pass.
//!
//! The node binary is normally run from its container image, with the run's
//! working directory mounted at `/data/` so the second call can read the
//! patched plain spec. A locally built binary can be used instead.
//!
//! Every container run gets its own `--name`, so a timed-out call can be
//! stopped with `<runtime> kill <name>`; killing the `run` client alone leaves
//! the container going.

pub mod exec;

pub use exec::{ToolOutput, run};

use crate::diagnostics;
use crate::error::Result;

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Mount point of the working directory inside the container.
pub const CONTAINER_DATA_DIR: &str = "/data/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Launcher {
    /// `<runtime> run --rm --name <unique> [--user <user>] [-v host:/data/] <image> ...`
    Container {
        runtime: String,
        image: String,
        /// `uid:gid` so files the tool writes are owned by the caller.
        user: Option<String>,
    },
    /// `<binary> ...`
    Local { binary: PathBuf },
}

/// A host directory exposed to the tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Volume {
    pub host: PathBuf,
    pub container: String,
}

/// What `--chain` points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainArg {
    /// A chain template name known to the binary (`dev`, `westend-local`, ...).
    Named(String),
    /// A plain spec file on the host.
    File(PathBuf),
}

/// Arguments of one `build-spec` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSpec {
    pub chain: ChainArg,
    pub runtime: Option<String>,
    pub disable_default_bootnode: bool,
    pub raw: bool,
}

/// One fully rendered command line against the tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalToolInvocation {
    pub program: String,
    pub args: Vec<String>,
    /// Name of the container this call starts, if any.
    pub container: Option<String>,
}

impl ExternalToolInvocation {
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }

    /// Shell-like rendering for logs and error messages.
    pub fn display(&self) -> String {
        diagnostics::command_line(&self.program, &self.args)
    }

    /// `<runtime> kill <name>` for a call that started a named container.
    pub fn kill_command(&self) -> Option<ExternalToolInvocation> {
        self.container.as_ref().map(|name| ExternalToolInvocation {
            program: self.program.clone(),
            args: vec!["kill".to_string(), name.clone()],
            container: None,
        })
    }
}

/// Unique per process and call.
fn container_name() -> String {
    static NEXT: AtomicUsize = AtomicUsize::new(0);
    format!(
        "chainspec-patcher-{}-{}",
        std::process::id(),
        NEXT.fetch_add(1, Ordering::Relaxed)
    )
}

impl Launcher {
    /// Render a `build-spec` call for this launcher.
    pub fn build_spec(&self, request: &BuildSpec) -> Result<ExternalToolInvocation> {
        let (chain, volume) = self.chain_arg(&request.chain)?;

        let mut tool_args = vec!["build-spec".to_string(), "--chain".to_string(), chain];
        if let Some(runtime) = &request.runtime {
            tool_args.push("--runtime".to_string());
            tool_args.push(runtime.clone());
        }
        if request.disable_default_bootnode {
            tool_args.push("--disable-default-bootnode".to_string());
        }
        if request.raw {
            tool_args.push("--raw".to_string());
        }

        Ok(match self {
            Launcher::Container { runtime, image, user } => {
                let name = container_name();
                let mut args = vec![
                    "run".to_string(),
                    "--rm".to_string(),
                    "--name".to_string(),
                    name.clone(),
                ];
                if let Some(user) = user {
                    args.push("--user".to_string());
                    args.push(user.clone());
                }
                if let Some(v) = volume {
                    args.push("-v".to_string());
                    args.push(format!("{}:{}", v.host.display(), v.container));
                }
                args.push(image.clone());
                args.extend(tool_args);
                ExternalToolInvocation {
                    program: runtime.clone(),
                    args,
                    container: Some(name),
                }
            }
            Launcher::Local { binary } => ExternalToolInvocation {
                program: binary.display().to_string(),
                args: tool_args,
                container: None,
            },
        })
    }

    fn chain_arg(&self, chain: &ChainArg) -> Result<(String, Option<Volume>)> {
        match (self, chain) {
            (_, ChainArg::Named(name)) => Ok((name.clone(), None)),
            (Launcher::Local { .. }, ChainArg::File(path)) => Ok((path.display().to_string(), None)),
            (Launcher::Container { .. }, ChainArg::File(path)) => {
                let (dir, file) = split_file(path)?;
                Ok((
                    format!("{}{}", CONTAINER_DATA_DIR, file),
                    Some(Volume {
                        host: dir.to_path_buf(),
                        container: CONTAINER_DATA_DIR.to_string(),
                    }),
                ))
            }
        }
    }
}

fn split_file(path: &Path) -> Result<(&Path, String)> {
    let file = path.file_name().and_then(|f| f.to_str()).ok_or_else(|| {
        crate::error::Error::InvalidProfile(format!(
            "chain file {} has no usable file name",
            path.display()
        ))
    })?;
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    Ok((dir, file.to_string()))
}

/// A launcher plus the per-call time limit.
#[derive(Debug, Clone)]
pub struct Tool {
    pub launcher: Launcher,
    /// `None` waits forever.
    pub timeout: Option<Duration>,
}

impl Tool {
    pub fn new(launcher: Launcher, timeout: Option<Duration>) -> Self {
        Self { launcher, timeout }
    }

    /// Run `build-spec` and return its output if it exited successfully.
    pub fn build_spec(&self, request: &BuildSpec) -> Result<ToolOutput> {
        let invocation = self.launcher.build_spec(request)?;
        let output = run(&invocation, self.timeout)?;
        output.check()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn docker() -> Launcher {
        Launcher::Container {
            runtime: "docker".into(),
            image: "kiltprotocol/peregrine:latest".into(),
            user: None,
        }
    }

    #[test]
    fn renders_plain_container_call() {
        let inv = docker()
            .build_spec(&BuildSpec {
                chain: ChainArg::Named("dev".into()),
                runtime: Some("peregrine".into()),
                disable_default_bootnode: true,
                raw: false,
            })
            .unwrap();
        let name = inv.container.clone().unwrap();
        assert!(name.starts_with("chainspec-patcher-"));
        assert_eq!(
            inv.display(),
            format!(
                "docker run --rm --name {name} kiltprotocol/peregrine:latest build-spec --chain dev --runtime peregrine --disable-default-bootnode"
            )
        );
    }

    #[test]
    fn container_mounts_chain_file_directory() {
        let inv = docker()
            .build_spec(&BuildSpec {
                chain: ChainArg::File(PathBuf::from("/tmp/run-1/peregrine_stg.plain.json")),
                runtime: None,
                disable_default_bootnode: true,
                raw: true,
            })
            .unwrap();
        assert_eq!(inv.program, "docker");
        let name = inv.container.clone().unwrap();
        assert_eq!(
            inv.args,
            vec![
                "run",
                "--rm",
                "--name",
                name.as_str(),
                "-v",
                "/tmp/run-1:/data/",
                "kiltprotocol/peregrine:latest",
                "build-spec",
                "--chain",
                "/data/peregrine_stg.plain.json",
                "--disable-default-bootnode",
                "--raw",
            ]
        );
    }

    #[test]
    fn container_runs_are_named_and_killable() {
        let request = BuildSpec {
            chain: ChainArg::Named("wilt-new".into()),
            runtime: Some("spiritnet".into()),
            disable_default_bootnode: false,
            raw: true,
        };
        let podman = Launcher::Container {
            runtime: "podman".into(),
            image: "kiltprotocol/kilt-node:latest".into(),
            user: Some("1000:1000".into()),
        };
        let first = podman.build_spec(&request).unwrap();
        let second = podman.build_spec(&request).unwrap();
        let name = first.container.clone().unwrap();
        assert_ne!(Some(name.clone()), second.container);

        assert_eq!(
            first.display(),
            format!(
                "podman run --rm --name {name} --user 1000:1000 kiltprotocol/kilt-node:latest build-spec --chain wilt-new --runtime spiritnet --raw"
            )
        );
        let kill = first.kill_command().unwrap();
        assert_eq!(kill.display(), format!("podman kill {name}"));
        assert_eq!(kill.kill_command(), None);
    }

    #[test]
    fn local_binary_uses_host_path() {
        let local = Launcher::Local {
            binary: PathBuf::from("./target/release/kilt-parachain"),
        };
        let inv = local
            .build_spec(&BuildSpec {
                chain: ChainArg::File(PathBuf::from("/tmp/run-1/plain.json")),
                runtime: Some("spiritnet".into()),
                disable_default_bootnode: false,
                raw: true,
            })
            .unwrap();
        assert_eq!(inv.program, "./target/release/kilt-parachain");
        assert_eq!(inv.kill_command(), None);
        assert_eq!(
            inv.args,
            vec!["build-spec", "--chain", "/tmp/run-1/plain.json", "--runtime", "spiritnet", "--raw"]
        );
    }

    #[test]
    fn relative_chain_file_mounts_current_dir() {
        let (dir, file) = split_file(Path::new("plain.json")).unwrap();
        assert_eq!(dir, Path::new("."));
        assert_eq!(file, "plain.json");
        assert!(split_file(Path::new("/")).is_err());
    }
}
