//! `inst`: the front door from spec.md §6. `inst build <args>` runs setup once, then hands the
//! real build off to the master tool with this binary injected as `-toolexec`. `inst toolexec
//! <args>` is that interceptor, invoked once per underlying compile/link/other tool call.

use std::path::PathBuf;
use std::process::{Command, ExitCode};

use clap::{Parser, Subcommand};
use otelweave_artifacts::{ImportCfg, MatchedRules};
use otelweave_core::config::Config;
use otelweave_core::error::{Result, WeaveError};
use otelweave_weave::router::{self, Classification};
use otelweave_weave::{weave_compile, setup, tracker, Catalog, SourceFile, SubprocessLister, Workdir};

#[derive(Parser)]
#[command(name = "inst")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Runs setup, then the real build with the interceptor injected.
    Build {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Internal: the toolexec interceptor entrypoint.
    Toolexec {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

fn main() -> ExitCode {
    otelweave_core::logging::init();
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Build { args } => run_build(&args),
        Commands::Toolexec { args } => run_toolexec(&args),
    };
    match result {
        Ok(()) => ExitCode::from(0),
        Err(WeaveError::SetupAbort(msg)) => {
            tracing::error!(%msg, "setup aborted");
            ExitCode::from(2)
        }
        Err(err) => {
            tracing::error!(%err, "build failed");
            ExitCode::from(1)
        }
    }
}

fn run_build(build_args: &[String]) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let config = Config::from_env(&cwd);
    let workdir = Workdir::new(&config.scratch_dir());
    let lister = SubprocessLister::new("go");

    let outcome = setup::run(
        &workdir,
        build_args,
        config.extra_rules_file.as_deref(),
        &lister,
        &config.build_flags,
    )?;
    tracing::info!(ran = outcome.ran, packages = outcome.matched.packages.len(), "setup complete");

    let self_exe = std::env::current_exe()?;
    let cache_dir = workdir.effective_cache_dir(config.cache_dir.as_deref());
    otelweave_core::fs::ensure_dir(&cache_dir)?;

    let mut cmd = Command::new("go");
    cmd.arg("build");
    cmd.arg("-a");
    cmd.arg(format!("-toolexec={} toolexec", self_exe.display()));
    cmd.args(&config.build_flags);
    cmd.args(build_args);
    cmd.env("GOCACHE", &cache_dir);
    cmd.env(otelweave_core::config::ENV_WORKDIR, &config.scratch_root);
    cmd.env(otelweave_core::config::ENV_BUILD_FLAGS, Config::encode_build_flags(&config.build_flags));
    if let Some(rules) = &config.extra_rules_file {
        cmd.env(otelweave_core::config::ENV_RULES, rules);
    }

    let status = cmd.status()?;
    // Manifests are restored unconditionally on the way out, whether the build succeeded or
    // not (spec.md §3: "restored unconditionally on exit"), so a failed build never leaves the
    // target module's go.mod mutated.
    let restore_result = workdir.restore_manifests(&outcome.matched.manifests);

    if !status.success() {
        return Err(WeaveError::msg(format!("go build exited with {status}")));
    }
    restore_result?;
    Ok(())
}

fn run_toolexec(argv: &[String]) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let config = Config::from_env(&cwd);
    let workdir = Workdir::new(&config.scratch_dir());

    match router::classify(argv) {
        Classification::Compile => run_compile(&workdir, &config, argv),
        Classification::Link => run_link(&workdir, argv),
        Classification::PassThrough => exec_tool(argv),
    }
}

fn run_compile(workdir: &Workdir, config: &Config, argv: &[String]) -> Result<()> {
    let import_path = router::flag_value(argv, "-p")
        .ok_or_else(|| WeaveError::msg("compile invocation missing -p"))?
        .to_string();
    let importcfg_path = router::flag_value(argv, "-importcfg")
        .map(PathBuf::from)
        .ok_or_else(|| WeaveError::msg("compile invocation missing -importcfg"))?;

    let matched: MatchedRules = otelweave_core::fs::read_json_file(&workdir.matched_json())?;
    let Some(rule_set) = matched.for_package(&import_path).filter(|rs| !rs.is_empty()) else {
        return exec_tool(argv);
    };

    let lister = SubprocessLister::new("go");
    let catalog = Catalog::load_all(config.extra_rules_file.as_deref())?;
    let call_templates = &catalog.templates;

    let source_paths: Vec<PathBuf> = argv
        .iter()
        .filter(|a| a.ends_with(".go"))
        .map(PathBuf::from)
        .collect();
    let mut files = Vec::with_capacity(source_paths.len());
    for path in &source_paths {
        let source = std::fs::read_to_string(path)?;
        files.push(SourceFile { path: path.clone(), source });
    }

    let debug_dir = workdir.debug_dir(&import_path);
    let temp_dir = importcfg_path.parent().unwrap_or_else(|| std::path::Path::new(".")).join("otelweave-woven");
    otelweave_core::fs::ensure_dir(&temp_dir)?;

    let output = weave_compile(
        rule_set,
        &files,
        &importcfg_path,
        &lister,
        &config.build_flags,
        &workdir.hook_tree_dir(),
        &temp_dir,
        &debug_dir,
        call_templates,
    )?;

    if !output.any_change {
        return exec_tool(argv);
    }

    output.importcfg.write(&importcfg_path)?;
    if !output.added_archives.is_empty() {
        tracker::record_additions(&workdir.root, output.added_archives)?;
    }

    let mut new_argv: Vec<String> = Vec::with_capacity(argv.len());
    for arg in argv {
        if arg == "-complete" {
            continue;
        }
        if let Some((_, new_path)) = output.rewritten.iter().find(|(orig, _)| orig.to_string_lossy() == *arg) {
            new_argv.push(new_path.to_string_lossy().to_string());
        } else {
            new_argv.push(arg.clone());
        }
    }
    for (orig, new_path) in &output.rewritten {
        let orig_str = orig.to_string_lossy().to_string();
        if !argv.contains(&orig_str) {
            new_argv.push(new_path.to_string_lossy().to_string());
        }
    }

    exec_tool(&new_argv)
}

fn run_link(workdir: &Workdir, argv: &[String]) -> Result<()> {
    let importcfg_path = router::flag_value(argv, "-importcfg")
        .map(PathBuf::from)
        .ok_or_else(|| WeaveError::msg("link invocation missing -importcfg"))?;
    let mut link_cfg = ImportCfg::read(&importcfg_path)?;
    let added = tracker::merge_into_link_importcfg(&workdir.root, &mut link_cfg);
    if added > 0 {
        link_cfg.write(&importcfg_path)?;
        tracing::debug!(added, "merged archive entries into link importcfg");
    }
    exec_tool(argv)
}

fn exec_tool(argv: &[String]) -> Result<()> {
    let Some((tool, rest)) = argv.split_first() else {
        return Ok(());
    };
    let status = Command::new(tool).args(rest).status()?;
    if !status.success() {
        std::process::exit(status.code().unwrap_or(1));
    }
    Ok(())
}
