use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;

mod diagnostics;
mod document;
mod error;
mod patch;
mod pipeline;
mod profile;
mod tool;

use document::SpecDocument;
use pipeline::{PipelineConfig, SpecPatchPipeline};
use profile::{Network, NetworkKind, NetworkProfile, ProfileFile};
use tool::{Launcher, Tool};

pub type Result<T> = anyhow::Result<T>;

pub const LOG_TARGET: &str = "chainspec-patcher";

#[derive(Parser)]
#[command(name = "chainspec-patcher")]
#[command(about = "Export, patch and recompile chain specs through build-spec", long_about = None)]
struct Cli {
    /// Log at debug level (RUST_LOG still wins).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Regenerate the raw spec of every selected network.
    Reset(ResetArgs),

    /// Apply one network's profile to an existing plain spec file.
    Patch {
        #[arg(long)]
        profiles: PathBuf,

        #[arg(long, value_enum)]
        network: Network,

        input: PathBuf,

        output: PathBuf,
    },
}

#[derive(Args)]
struct ResetArgs {
    /// KILT on Westend, exported as the node ships it.
    #[arg(short, long, visible_alias = "westend")]
    wilt: bool,
    /// Exported as the node ships it.
    #[arg(short, long)]
    spiritnet: bool,
    #[arg(short, long)]
    peregrine: bool,
    #[arg(short = 'r', long)]
    peregrine_relay: bool,
    #[arg(long)]
    peregrine_stg: bool,
    #[arg(long)]
    peregrine_relay_stg: bool,
    #[arg(long)]
    peregrine_dev: bool,
    #[arg(long)]
    peregrine_relay_dev: bool,

    /// Node image, e.g. kiltprotocol/kilt-node:develop.
    #[arg(short, long, required_unless_present = "binary")]
    image: Option<String>,

    /// Run a local node binary instead of a container.
    #[arg(long, conflicts_with = "image")]
    binary: Option<PathBuf>,

    #[arg(long, default_value = "docker")]
    container_runtime: String,

    /// `uid:gid` to run the container as.
    #[arg(long, conflicts_with = "binary")]
    user: Option<String>,

    /// Network profiles; networks without one keep the template's values.
    #[arg(long)]
    profiles: Option<PathBuf>,

    /// Relative output paths are resolved against this directory.
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Per build-spec call; 0 waits forever.
    #[arg(long, default_value_t = 600)]
    timeout_secs: u64,

    /// Keep the working directory even if every run succeeds.
    #[arg(long)]
    keep_temp: bool,
}

impl ResetArgs {
    fn networks(&self) -> Vec<Network> {
        let flags = [
            (Network::Wilt, self.wilt),
            (Network::Spiritnet, self.spiritnet),
            (Network::Peregrine, self.peregrine),
            (Network::PeregrineRelay, self.peregrine_relay),
            (Network::PeregrineStg, self.peregrine_stg),
            (Network::PeregrineRelayStg, self.peregrine_relay_stg),
            (Network::PeregrineDev, self.peregrine_dev),
            (Network::PeregrineRelayDev, self.peregrine_relay_dev),
        ];
        flags.into_iter().filter(|(_, on)| *on).map(|(n, _)| n).collect()
    }

    fn tool(&self) -> Result<Tool> {
        let launcher = match &self.binary {
            Some(binary) => Launcher::Local { binary: binary.clone() },
            None => Launcher::Container {
                runtime: self.container_runtime.clone(),
                image: self.image.clone().context("--image is required without --binary")?,
                user: self.user.clone(),
            },
        };
        let timeout = (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs));
        Ok(Tool::new(launcher, timeout))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    match cli.cmd {
        Commands::Reset(args) => reset(&args, &std::env::temp_dir())?,
        Commands::Patch {
            profiles,
            network,
            input,
            output,
        } => {
            patch_file(&profiles, network, &input, &output)?;
            println!("Wrote {}", output.display());
        }
    }

    Ok(())
}

/// Run every selected network in its own subdirectory of a fresh working
/// directory under `tmp_root`. The directory is removed on success unless
/// `--keep-temp` is given, and kept on any failure.
fn reset(args: &ResetArgs, tmp_root: &Path) -> Result<()> {
    let networks = args.networks();
    if networks.is_empty() {
        bail!("no network selected (pass e.g. --peregrine-stg)");
    }

    let profiles = match &args.profiles {
        Some(path) => Some(ProfileFile::load(path)?),
        None => None,
    };

    // Validate every profile before the first slow tool call.
    let mut configs: Vec<(Network, PipelineConfig)> = Vec::new();
    for network in networks {
        let config = match profiles.as_ref().and_then(|p| p.get(network)) {
            Some(profile) => profile.validate_and_build(network)?,
            None => {
                if network.defaults().kind != NetworkKind::Native {
                    log::warn!(target: LOG_TARGET, "no profile for {}; only the tool output is recompiled", network);
                }
                NetworkProfile::default().validate_and_build(network)?
            }
        };
        configs.push((network, resolve_output(config, &args.out_dir)));
    }

    let tool = args.tool()?;
    let tmp = tempfile::Builder::new()
        .prefix("chainspec-patcher-")
        .tempdir_in(tmp_root)
        .with_context(|| format!("create working directory in {}", tmp_root.display()))?;
    log::debug!(target: LOG_TARGET, "working directory {}", tmp.path().display());

    for (network, config) in &configs {
        let work_dir = tmp.path().join(network.key());
        let result = std::fs::create_dir_all(&work_dir)
            .with_context(|| format!("create {}", work_dir.display()))
            .and_then(|()| {
                SpecPatchPipeline::new(&tool, &work_dir)
                    .run(config)
                    .with_context(|| format!("reset {}", network))
            });

        if let Err(err) = result {
            let kept = tmp.keep();
            log::error!(target: LOG_TARGET, "intermediate files kept in {}", kept.display());
            return Err(err);
        }
        println!("Wrote {}", config.output.display());
    }

    if args.keep_temp {
        let kept = tmp.keep();
        log::info!(target: LOG_TARGET, "intermediate files kept in {}", kept.display());
    }
    Ok(())
}

fn resolve_output(mut config: PipelineConfig, out_dir: &Path) -> PipelineConfig {
    if config.output.is_relative() {
        config.output = out_dir.join(&config.output);
    }
    config
}

/// Offline variant: patch `input` with the profile of `network` and write the
/// plain result to `output`. On failure the partial document lands next to
/// `output` as `<stem>.partial.json`.
fn patch_file(profiles: &Path, network: Network, input: &Path, output: &Path) -> Result<()> {
    let config = ProfileFile::load(profiles)?.validate_and_build(network)?;
    let Some(patch) = config.patch() else {
        bail!("{} is exported as the node ships it; there is nothing to patch", network);
    };
    let doc = SpecDocument::read(input)?;

    if let Some(dir) = output.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    }

    match patch::apply_patch(&doc, patch) {
        Ok(patched) => {
            pipeline::write_intermediate(&patched, output)?;
            Ok(())
        }
        Err(failure) => {
            let dump = output.with_extension("partial.json");
            pipeline::write_intermediate(&failure.partial, &dump)?;
            Err(failure.error.with_dump(dump))
                .with_context(|| format!("patch {} for {}", input.display(), network))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::fs;

    fn write_profiles(dir: &Path) -> PathBuf {
        let path = dir.join("profiles.json");
        fs::write(
            &path,
            r#"{"networks": {"peregrine-dev": {
                "name": "Peregrine Develop",
                "balances": [["4r1WkS3t8rbCb11H8t3tJvGVCynwDXSUBiuGB6sLRHzCLCjs", 10000000000000000000000000000]]
            }}}"#,
        )
        .unwrap();
        path
    }

    #[test]
    fn cli_parses() {
        use clap::CommandFactory;
        Cli::command().debug_assert();

        let cli = Cli::try_parse_from([
            "chainspec-patcher",
            "reset",
            "--peregrine-stg",
            "--peregrine-relay-stg",
            "-i",
            "kiltprotocol/kilt-node:develop",
        ])
        .unwrap();
        let Commands::Reset(args) = cli.cmd else {
            panic!("expected reset");
        };
        assert_eq!(
            args.networks(),
            vec![Network::PeregrineStg, Network::PeregrineRelayStg]
        );
        assert_eq!(args.timeout_secs, 600);
        assert_eq!(
            args.tool().unwrap().launcher,
            Launcher::Container {
                runtime: "docker".into(),
                image: "kiltprotocol/kilt-node:develop".into(),
                user: None,
            }
        );

        assert!(Cli::try_parse_from(["chainspec-patcher", "reset", "--peregrine"]).is_err());
    }

    #[test]
    fn cli_short_flags_and_native_networks() {
        let cli = Cli::try_parse_from([
            "chainspec-patcher",
            "reset",
            "-w",
            "-s",
            "-p",
            "-r",
            "-i",
            "kiltprotocol/kilt-node:latest",
            "--user",
            "1000:1000",
        ])
        .unwrap();
        let Commands::Reset(args) = cli.cmd else {
            panic!("expected reset");
        };
        assert_eq!(
            args.networks(),
            vec![Network::Wilt, Network::Spiritnet, Network::Peregrine, Network::PeregrineRelay]
        );
        assert_eq!(
            args.tool().unwrap().launcher,
            Launcher::Container {
                runtime: "docker".into(),
                image: "kiltprotocol/kilt-node:latest".into(),
                user: Some("1000:1000".into()),
            }
        );

        let cli = Cli::try_parse_from(["chainspec-patcher", "reset", "--westend", "-i", "img"]).unwrap();
        let Commands::Reset(args) = cli.cmd else {
            panic!("expected reset");
        };
        assert_eq!(args.networks(), vec![Network::Wilt]);

        assert!(
            Cli::try_parse_from(["chainspec-patcher", "reset", "-w", "--binary", "./node", "--user", "0:0"]).is_err()
        );
    }

    #[test]
    fn relative_outputs_land_under_out_dir() {
        let config = NetworkProfile::default()
            .validate_and_build(Network::PeregrineDev)
            .unwrap();
        let config = resolve_output(config, Path::new("/repo"));
        assert_eq!(
            config.output,
            PathBuf::from("/repo/dev-specs/kilt-parachain/peregrine-dev-kilt.json")
        );
    }

    #[test]
    fn patch_file_writes_plain_spec() {
        let tmp = tempfile::tempdir().unwrap();
        let profiles = write_profiles(tmp.path());
        let input = tmp.path().join("in.json");
        fs::write(
            &input,
            r#"{"name":"Development","genesis":{"runtime":{"balances":{"balances":[]}}}}"#,
        )
        .unwrap();
        let output = tmp.path().join("out").join("peregrine-dev.plain.json");

        patch_file(&profiles, Network::PeregrineDev, &input, &output).unwrap();
        let out = SpecDocument::read(&output).unwrap().into_value();
        assert_eq!(out["name"], json!("Peregrine Develop"));
        assert_eq!(
            serde_json::to_string(&out["genesis"]["runtime"]["balances"]["balances"]).unwrap(),
            r#"[["4r1WkS3t8rbCb11H8t3tJvGVCynwDXSUBiuGB6sLRHzCLCjs",10000000000000000000000000000]]"#
        );
    }

    #[test]
    fn patch_file_keeps_partial_on_missing_pallet() {
        let tmp = tempfile::tempdir().unwrap();
        let profiles = write_profiles(tmp.path());
        let input = tmp.path().join("in.json");
        fs::write(&input, r#"{"name":"Development","genesis":{"runtime":{}}}"#).unwrap();
        let output = tmp.path().join("out.json");

        let err = patch_file(&profiles, Network::PeregrineDev, &input, &output).unwrap_err();
        let dump = tmp.path().join("out.partial.json");
        match err.downcast_ref::<error::Error>() {
            Some(error::Error::MissingPath { dump: Some(d), .. }) => assert_eq!(d, &dump),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!output.exists());
        let partial = SpecDocument::read(&dump).unwrap().into_value();
        assert_eq!(partial["name"], json!("Peregrine Develop"));
    }

    #[cfg(unix)]
    mod reset_runs {
        use super::*;
        use crate::tool::exec::tests::stub;
        use pretty_assertions::assert_eq;

        const PLAIN: &str = r#"{"name":"Development","genesis":{"runtime":{"balances":{"balances":[]}}}}"#;

        /// A node binary that logs every call, prints `PLAIN` for exports and
        /// `RAW:<file>` for `--raw` calls. `fail_on` makes calls matching it exit 1.
        fn fake_node(dir: &Path, fail_on: &str) -> PathBuf {
            let log = dir.join("calls.log");
            let body = format!(
                r#"echo "$*" >> '{log}'
case "$*" in
  *{fail_on}*) echo boom >&2; exit 1 ;;
  *--raw*) printf 'RAW:'; cat "$3" ;;
  *) printf '%s' '{plain}' ;;
esac"#,
                log = log.display(),
                fail_on = fail_on,
                plain = PLAIN,
            );
            stub(dir, "node", &body)
        }

        fn args(binary: &Path, out_dir: &Path, extra: &[&str]) -> ResetArgs {
            let mut argv = vec![
                "chainspec-patcher".to_string(),
                "reset".to_string(),
                "--binary".to_string(),
                binary.display().to_string(),
                "--out-dir".to_string(),
                out_dir.display().to_string(),
                "--timeout-secs".to_string(),
                "30".to_string(),
            ];
            argv.extend(extra.iter().map(|a| a.to_string()));
            let Commands::Reset(args) = Cli::try_parse_from(argv).unwrap().cmd else {
                panic!("expected reset");
            };
            args
        }

        fn work_dirs(tmp_root: &Path) -> Vec<PathBuf> {
            fs::read_dir(tmp_root)
                .unwrap()
                .map(|e| e.unwrap().path())
                .collect()
        }

        fn calls(dir: &Path) -> Vec<String> {
            fs::read_to_string(dir.join("calls.log"))
                .unwrap()
                .lines()
                .map(str::to_string)
                .collect()
        }

        #[test]
        fn success_removes_working_directory() {
            let bin = tempfile::tempdir().unwrap();
            let out = tempfile::tempdir().unwrap();
            let tmp_root = tempfile::tempdir().unwrap();
            let node = fake_node(bin.path(), "never-matches");

            let args = args(&node, out.path(), &["--peregrine-dev", "--peregrine-stg"]);
            reset(&args, tmp_root.path()).unwrap();

            assert!(work_dirs(tmp_root.path()).is_empty());
            for file in ["peregrine-dev-kilt.json", "peregrine-stg-kilt.json"] {
                let raw = fs::read_to_string(out.path().join("dev-specs/kilt-parachain").join(file)).unwrap();
                let plain: serde_json::Value = serde_json::from_str(raw.strip_prefix("RAW:").unwrap()).unwrap();
                assert_eq!(plain, serde_json::from_str::<serde_json::Value>(PLAIN).unwrap());
            }

            // Each network compiled from its own subdirectory.
            let raw_calls: Vec<String> = calls(bin.path())
                .into_iter()
                .filter(|c| c.ends_with("--raw"))
                .collect();
            assert_eq!(raw_calls.len(), 2);
            assert!(raw_calls[0].contains("/peregrine-dev/peregrine_dev_kilt.plain.json"));
            assert!(raw_calls[1].contains("/peregrine-stg/peregrine_stg.plain.json"));
        }

        #[test]
        fn keep_temp_leaves_intermediate_files() {
            let bin = tempfile::tempdir().unwrap();
            let out = tempfile::tempdir().unwrap();
            let tmp_root = tempfile::tempdir().unwrap();
            let node = fake_node(bin.path(), "never-matches");

            let args = args(&node, out.path(), &["--peregrine-relay-dev", "--keep-temp"]);
            reset(&args, tmp_root.path()).unwrap();

            let kept = work_dirs(tmp_root.path());
            assert_eq!(kept.len(), 1);
            assert!(kept[0].join("peregrine-relay-dev").join("peregrine_dev_relay.plain.json").is_file());
            assert!(out.path().join("dev-specs/kilt-parachain/peregrine-dev-relay.json").is_file());
        }

        #[test]
        fn failure_keeps_working_directory() {
            let bin = tempfile::tempdir().unwrap();
            let out = tempfile::tempdir().unwrap();
            let tmp_root = tempfile::tempdir().unwrap();
            // The second network's raw compile fails.
            let node = fake_node(bin.path(), "peregrine_stg.plain.json");

            let args = args(&node, out.path(), &["--peregrine-dev", "--peregrine-stg"]);
            let err = reset(&args, tmp_root.path()).unwrap_err();
            assert!(format!("{err:#}").contains("boom"));

            let kept = work_dirs(tmp_root.path());
            assert_eq!(kept.len(), 1);
            assert!(kept[0].join("peregrine-stg").join("peregrine_stg.plain.json").is_file());
            assert!(out.path().join("dev-specs/kilt-parachain/peregrine-dev-kilt.json").is_file());
            assert!(!out.path().join("dev-specs/kilt-parachain/peregrine-stg-kilt.json").exists());
        }

        #[test]
        fn native_network_is_one_raw_export() {
            let bin = tempfile::tempdir().unwrap();
            let out = tempfile::tempdir().unwrap();
            let tmp_root = tempfile::tempdir().unwrap();
            let node = stub(
                bin.path(),
                "node",
                &format!("echo \"$*\" >> '{}'; printf 'RAW:%s' \"$3\"", bin.path().join("calls.log").display()),
            );

            let args = args(&node, out.path(), &["--spiritnet"]);
            reset(&args, tmp_root.path()).unwrap();

            assert_eq!(
                calls(bin.path()),
                vec!["build-spec --chain spiritnet-new --runtime spiritnet --raw".to_string()]
            );
            assert_eq!(
                fs::read_to_string(out.path().join("nodes/parachain/res/spiritnet.json")).unwrap(),
                "RAW:spiritnet-new"
            );
            assert!(work_dirs(tmp_root.path()).is_empty());
        }
    }
}
