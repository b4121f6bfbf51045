// mrj CLI entry point
use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use mrj_build::classpath::{ClassQuery, ModuleConstraint};
use mrj_build::{BuildSession, CollectingReporter, MultiReleaseApiValidator};
use mrj_cli::{
    answer_to_json, build_config, describe_answer, get_version, parse_release_arg,
    problems_to_json, Cli, Commands,
};

fn init_logging(filter: Option<&str>) {
    let filter = match filter {
        Some(filter) => EnvFilter::new(filter),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log.as_deref());

    match cli.command {
        Some(Commands::Validate { env, json }) => {
            let config = build_config(&env)?;
            let session = Arc::new(BuildSession::new());
            let roots = config
                .source_locations(&session)
                .context("Failed to configure source roots")?;
            info!(
                roots = roots.len(),
                output = %config.output_dir.display(),
                "validating multi-release output"
            );

            let reporter = CollectingReporter::new();
            let summary = MultiReleaseApiValidator::new(&roots, &session).validate(&reporter);
            let problems = reporter.problems();

            if json {
                println!("{}", problems_to_json(&problems)?);
            } else {
                for problem in &problems {
                    println!("{problem}");
                }
                println!(
                    "Checked {} multi-release type(s), {} comparison(s): {} problem(s)",
                    summary.multi_release_types, summary.comparisons, summary.problems
                );
            }

            if reporter.has_errors() {
                anyhow::bail!(
                    "Multi-release validation failed with {} problem(s)",
                    summary.problems
                );
            }
        }
        Some(Commands::Resolve {
            name,
            release,
            module,
            env,
            json,
        }) => {
            let config = build_config(&env)?;
            let release = parse_release_arg(release.as_deref())?;
            let query = ClassQuery::from_dotted(&name)
                .with_context(|| format!("'{}' is not a qualified type name", name))?;
            let session = Arc::new(BuildSession::new());
            let environment = config
                .name_environment(&session)
                .context("Failed to assemble the name environment")?;
            debug!(environment = ?environment, "name environment ready");

            let constraint = match module.as_deref() {
                Some(module) => ModuleConstraint::Named(module),
                None => ModuleConstraint::Any,
            };
            match environment.find_class(&query, constraint, release) {
                Some(answer) if json => {
                    println!("{}", serde_json::to_string_pretty(&answer_to_json(&answer))?)
                }
                Some(answer) => println!("{}", describe_answer(&answer)),
                None => anyhow::bail!("Type '{}' not found for release {}", name, release),
            }
        }
        Some(Commands::Modules { env, limit }) => {
            let config = build_config(&env)?;
            let session = Arc::new(BuildSession::new());
            let environment = config
                .name_environment(&session)
                .context("Failed to assemble the name environment")?;
            let limit = (!limit.is_empty()).then_some(limit.as_slice());
            for module in environment.module_names(limit) {
                println!("{module}");
            }
        }
        Some(Commands::Version) | None => {
            println!("{}", get_version());
        }
    }

    Ok(())
}
