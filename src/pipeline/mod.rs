//! Export / patch / recompile pipeline.
//!
//! 1) `build-spec` for a chain template, parsed as a plain JSON spec.
//! 2) The profile's patch set applied to it, written to the run's work dir.
//! 3) `build-spec --raw` against that file; stdout is the final artifact.
//!
//! Nothing is written to the output path unless all three succeed.
//!
//! Native networks skip the first two steps: `build-spec --raw` runs directly
//! against the chain template and its stdout is the artifact.

pub mod files;
pub mod stage;

pub use files::{write_intermediate, write_output};
pub use stage::{Stage, Step};

use crate::LOG_TARGET;
use crate::document::SpecDocument;
use crate::error::{Error, Result};
use crate::patch::{PatchSet, apply_patch};
use crate::tool::{BuildSpec, ChainArg, Tool};

use std::path::{Path, PathBuf};

/// Which chain template the tool should start from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainTarget {
    pub chain: String,
    pub runtime: Option<String>,
    pub disable_default_bootnode: bool,
}

/// What happens between the template and the output file.
#[derive(Debug, Clone)]
pub enum Mode {
    /// Export the raw spec as the node ships it.
    Native,
    Patched {
        /// File name of the intermediate plain spec inside the work dir.
        plain_file: String,
        patch: PatchSet,
    },
}

/// Everything one run needs.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub target: ChainTarget,
    pub output: PathBuf,
    pub mode: Mode,
}

impl PipelineConfig {
    pub fn patch(&self) -> Option<&PatchSet> {
        match &self.mode {
            Mode::Native => None,
            Mode::Patched { patch, .. } => Some(patch),
        }
    }
}

/// Ask the tool for the plain spec of `target` and parse it.
pub fn fetch_plain_spec(tool: &Tool, target: &ChainTarget) -> Result<SpecDocument> {
    let output = tool.build_spec(&BuildSpec {
        chain: ChainArg::Named(target.chain.clone()),
        runtime: target.runtime.clone(),
        disable_default_bootnode: target.disable_default_bootnode,
        raw: false,
    })?;
    SpecDocument::from_slice(&output.stdout, &format!("stdout of `{}`", output.command)).inspect_err(|_| {
        crate::diagnostics::report_failure(&output.command, output.code, &output.stdout, &output.stderr)
    })
}

/// Compile the plain spec at `intermediate` into a raw spec.
///
/// The bytes are returned exactly as the tool printed them.
pub fn compile_raw_spec(tool: &Tool, intermediate: &Path, target: &ChainTarget) -> Result<Vec<u8>> {
    raw_spec(tool, ChainArg::File(intermediate.to_path_buf()), target)
}

/// Export the raw spec of `target` directly, without patching.
pub fn export_native_spec(tool: &Tool, target: &ChainTarget) -> Result<Vec<u8>> {
    raw_spec(tool, ChainArg::Named(target.chain.clone()), target)
}

fn raw_spec(tool: &Tool, chain: ChainArg, target: &ChainTarget) -> Result<Vec<u8>> {
    let output = tool.build_spec(&BuildSpec {
        chain,
        runtime: target.runtime.clone(),
        disable_default_bootnode: target.disable_default_bootnode,
        raw: true,
    })?;
    if output.stdout.is_empty() {
        log::warn!(target: LOG_TARGET, "`{}` printed nothing on stdout", output.command);
    }
    Ok(output.stdout)
}

pub struct SpecPatchPipeline<'a> {
    tool: &'a Tool,
    work_dir: PathBuf,
    stage: Stage,
}

impl<'a> SpecPatchPipeline<'a> {
    /// `work_dir` must be private to this run; intermediate files land there.
    pub fn new(tool: &'a Tool, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            tool,
            work_dir: work_dir.into(),
            stage: Stage::Fetching,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Fetch, patch, compile and write `config.output`.
    pub fn run(&mut self, config: &PipelineConfig) -> Result<()> {
        let (plain_file, patch) = match &config.mode {
            Mode::Native => return self.run_native(config),
            Mode::Patched { plain_file, patch } => (plain_file, patch),
        };

        self.stage = Stage::Fetching;
        log::info!(
            target: LOG_TARGET,
            "{}: {} (runtime {})",
            self.stage,
            config.target.chain,
            config.target.runtime.as_deref().unwrap_or("default")
        );
        let doc = fetch_plain_spec(self.tool, &config.target).map_err(|e| self.fail(e))?;
        log::debug!(target: LOG_TARGET, "genesis layout: {:?}", doc.layout());

        self.advance();
        let plain_path = self.work_dir.join(plain_file);
        let patched = match apply_patch(&doc, patch) {
            Ok(patched) => patched,
            Err(failure) => {
                let dump = self.work_dir.join(partial_name(plain_file));
                let err = match write_intermediate(&failure.partial, &dump) {
                    Ok(()) => {
                        log::error!(
                            target: LOG_TARGET,
                            "assignment #{} failed; partially patched spec kept at {}",
                            failure.index,
                            dump.display()
                        );
                        failure.error.with_dump(dump)
                    }
                    Err(write_err) => {
                        log::error!(target: LOG_TARGET, "cannot keep partial spec: {}", write_err);
                        failure.error
                    }
                };
                return Err(self.fail(err));
            }
        };
        write_intermediate(&patched, &plain_path).map_err(|e| self.fail(e))?;
        log::debug!(target: LOG_TARGET, "plain spec written to {}", plain_path.display());

        self.advance();
        let raw = compile_raw_spec(self.tool, &plain_path, &config.target).map_err(|e| self.fail(e))?;
        write_output(&raw, &config.output).map_err(|e| self.fail(e))?;

        self.advance();
        Ok(())
    }

    fn run_native(&mut self, config: &PipelineConfig) -> Result<()> {
        self.stage = Stage::Compiling;
        log::info!(
            target: LOG_TARGET,
            "{}: {} (runtime {}, native)",
            self.stage,
            config.target.chain,
            config.target.runtime.as_deref().unwrap_or("default")
        );
        let raw = export_native_spec(self.tool, &config.target).map_err(|e| self.fail(e))?;
        write_output(&raw, &config.output).map_err(|e| self.fail(e))?;
        self.advance();
        Ok(())
    }

    fn advance(&mut self) {
        if let Some(next) = self.stage.next() {
            self.stage = next;
            log::info!(target: LOG_TARGET, "{}", self.stage);
        }
    }

    fn fail(&mut self, err: Error) -> Error {
        self.stage = self.stage.fail();
        log::error!(target: LOG_TARGET, "{}: {}", self.stage, err);
        err
    }
}

fn partial_name(plain_file: &str) -> String {
    match plain_file.strip_suffix(".json") {
        Some(stem) => format!("{}.partial.json", stem),
        None => format!("{}.partial", plain_file),
    }
}
