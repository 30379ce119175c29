use std::fs;

use anyhow::{Context, Result, anyhow, bail};
use camino::Utf8PathBuf;
use ckan_functional_tests::{
    ApiSession, GoldenFixtures, Sampler, TemplateVars, UnstableTemplater, Variables,
    init_tracing, strip_unstable_data,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::Value;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "ckan-golden",
    version,
    about = "Capture, resolve and check golden CKAN API responses"
)]
struct Cli {
    /// Variables file (defaults to config/variables.toml)
    #[arg(long, global = true, value_name = "PATH")]
    variables: Option<Utf8PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Call an action endpoint and print its result with unstable values templated
    Fetch(FetchArgs),
    /// Print a golden response with template vars substituted
    Resolve(ResolveArgs),
    /// Print a randomly selected sample from the live instance
    Sample(SampleArgs),
    /// Verify every golden response parses and resolves all of its placeholders
    Check(CheckArgs),
}

#[derive(Args, Debug)]
struct FetchArgs {
    /// Action name, e.g. `package_show`
    endpoint: String,
    /// Query parameter as key=value (repeatable)
    #[arg(long = "query", value_name = "KEY=VALUE")]
    query: Vec<String>,
    /// Top-level keys replaced wholesale by a placeholder
    #[arg(long = "clean", value_name = "KEY")]
    clean: Vec<String>,
    /// Keys left untouched at every depth
    #[arg(long = "ignore", value_name = "KEY")]
    ignore: Vec<String>,
    /// Write to this file instead of stdout
    #[arg(long, value_name = "PATH")]
    out: Option<Utf8PathBuf>,
}

#[derive(Args, Debug)]
struct ResolveArgs {
    /// Golden response name relative to the golden root
    name: String,
    /// Also strip unstable data
    #[arg(long)]
    strip: bool,
}

#[derive(Args, Debug)]
struct CheckArgs {
    /// Placeholder name to accept unresolved, e.g. a key captured with `fetch --clean`
    #[arg(long = "allow", value_name = "NAME")]
    allow: Vec<String>,
}

#[derive(Args, Debug)]
struct SampleArgs {
    #[arg(value_enum)]
    kind: SampleKind,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SampleKind {
    Org,
    Package,
    PackageSlug,
    HarvestObject,
}

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let vars = Variables::load(cli.variables.as_deref())?;
    match cli.command {
        Command::Fetch(args) => fetch(&vars, args)?,
        Command::Resolve(args) => resolve(&vars, args)?,
        Command::Sample(args) => sample(&vars, args)?,
        Command::Check(args) => check(&vars, args)?,
    }

    Ok(())
}

fn fetch(vars: &Variables, args: FetchArgs) -> Result<()> {
    let query = args
        .query
        .iter()
        .map(|pair| {
            pair.split_once('=')
                .ok_or_else(|| anyhow!("invalid --query {pair:?}; expected KEY=VALUE"))
        })
        .collect::<Result<Vec<_>>>()?;

    let session = ApiSession::from_variables(vars);
    let result = session
        .action(&args.endpoint, &query)
        .with_context(|| format!("failed to fetch {}", args.endpoint))?;

    let templated = UnstableTemplater::new()
        .clean(args.clean)
        .ignore(args.ignore)
        .template(result);
    let rendered = serde_json::to_string_pretty(&templated)?;

    match args.out {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {parent}"))?;
            }
            fs::write(&path, format!("{rendered}\n"))
                .with_context(|| format!("failed to write {path}"))?;
            info!(%path, endpoint = %args.endpoint, "captured golden response");
        }
        None => println!("{rendered}"),
    }
    Ok(())
}

fn resolve(vars: &Variables, args: ResolveArgs) -> Result<()> {
    let golden = GoldenFixtures::from_variables(vars);
    let raw = golden.load(&args.name)?;
    let resolved = TemplateVars::load(golden.vars_file())
        .context("failed to load template vars")?
        .apply(&raw)?;
    let output = if args.strip {
        strip_unstable_data(resolved)
    } else {
        resolved
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn sample(vars: &Variables, args: SampleArgs) -> Result<()> {
    let mut sampler = Sampler::from_variables(vars);
    let output = match args.kind {
        SampleKind::Org => Value::String(sampler.random_org_slug()?),
        SampleKind::PackageSlug => Value::String(sampler.random_pkg_slug()?),
        SampleKind::Package => sampler.random_pkg()?,
        SampleKind::HarvestObject => Value::String(sampler.random_harvestobject_id()?),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn check(vars: &Variables, args: CheckArgs) -> Result<()> {
    let golden = GoldenFixtures::from_variables(vars).allow_placeholders(args.allow);
    let template_vars = match TemplateVars::load(golden.vars_file()) {
        Ok(loaded) => loaded,
        Err(err) => {
            warn!(%err, "no template vars; placeholders will be reported as unresolved");
            TemplateVars::default()
        }
    };

    let report = golden.check(&template_vars)?;
    if report.checked == 0 {
        bail!("no golden responses found under {}", golden.root().display());
    }
    if !report.failures.is_empty() {
        for failure in &report.failures {
            eprintln!("{failure}");
        }
        bail!(
            "{} of {} golden response(s) failed",
            report.failures.len(),
            report.checked
        );
    }
    let checked = report.checked;
    println!("ckan-golden: {checked} golden response(s) resolved");
    Ok(())
}
