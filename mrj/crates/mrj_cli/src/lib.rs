// mrj_cli - CLI functionality (library interface for testing)
use anyhow::{Context, Result};
use clap::Parser;
use mrj_build::classpath::{Answer, AnswerKind};
use mrj_build::{BuildConfig, Problem, Release, SourceRootConfig};
use serde_json::{json, Value};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mrj")]
#[command(about = "Release-aware type resolution for multi-release Java builds")]
pub struct Cli {
    /// Log filter, e.g. `debug` or `mrj_build=trace`; defaults to RUST_LOG
    #[arg(long, global = true)]
    pub log: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Options shared by every command that assembles a name environment.
#[derive(clap::Args, Debug, Clone)]
pub struct EnvironmentArgs {
    /// Baseline output directory; overlays live under META-INF/versions/<n>
    #[arg(short, long, default_value = "./out")]
    pub output: String,
    /// Source root, optionally bound to a release: `src/main/java11:11`
    #[arg(long = "root")]
    pub roots: Vec<String>,
    /// Extra binary classpath directory
    #[arg(long = "classpath")]
    pub classpath: Vec<String>,
    /// JDK home; discovered from JAVA_HOME or PATH when omitted
    #[arg(long)]
    pub jdk: Option<String>,
    /// Compliance level used for the platform library (`1.8`, `11`, ...)
    #[arg(long, default_value = "21")]
    pub compliance: String,
}

#[derive(clap::Subcommand)]
pub enum Commands {
    /// Check that overlay classes keep the baseline public API
    Validate {
        #[command(flatten)]
        env: EnvironmentArgs,
        /// Emit problems as JSON
        #[arg(long)]
        json: bool,
    },
    /// Resolve a type as seen by a given release
    Resolve {
        /// Dotted type name, e.g. `java.lang.Object`
        name: String,
        /// Release to resolve for; omit for the baseline view
        #[arg(long)]
        release: Option<String>,
        /// Restrict the lookup to a named module
        #[arg(long)]
        module: Option<String>,
        #[command(flatten)]
        env: EnvironmentArgs,
        /// Emit the answer as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the modules visible through the classpath
    Modules {
        #[command(flatten)]
        env: EnvironmentArgs,
        /// Only report these modules
        #[arg(long = "limit")]
        limit: Vec<String>,
    },
    /// Show version information
    Version,
}

/// Parses `path[:release]`; a trailing segment that is not a number stays
/// part of the path.
pub fn parse_root(value: &str) -> Result<SourceRootConfig> {
    if value.trim().is_empty() {
        anyhow::bail!("Source root can not be empty");
    }
    if let Some((path, release)) = value.rsplit_once(':') {
        if let Ok(release) = release.parse::<u16>() {
            if path.is_empty() {
                anyhow::bail!("Source root '{}' has no path", value);
            }
            return Ok(SourceRootConfig::new(path).with_release(release));
        }
    }
    Ok(SourceRootConfig::new(value))
}

/// Parses a release argument; `base` and an absent value select the
/// baseline view.
pub fn parse_release_arg(value: Option<&str>) -> Result<Release> {
    match value.map(str::trim) {
        None | Some("") | Some("base") => Ok(Release::Unversioned),
        Some(value) => {
            let release = value
                .parse::<u16>()
                .with_context(|| format!("Invalid release '{}'", value))?;
            Ok(Release::Java(release))
        }
    }
}

pub fn build_config(args: &EnvironmentArgs) -> Result<BuildConfig> {
    let mut config = BuildConfig::default()
        .with_output_dir(&args.output)
        .with_compliance(args.compliance.clone());
    for root in &args.roots {
        config = config.with_source_root(parse_root(root)?);
    }
    config.add_classpath(args.classpath.iter().map(PathBuf::from));
    if let Some(jdk) = &args.jdk {
        config = config.with_java_home(jdk);
    }
    config.validate().context("Invalid build configuration")?;
    Ok(config)
}

pub fn answer_to_json(answer: &Answer) -> Value {
    let release = answer.release.to_string();
    let restriction = answer.access_restriction.as_ref().map(|restriction| {
        json!({
            "kind": restriction.kind,
            "pattern": restriction.pattern,
            "origin": restriction.origin,
        })
    });
    match &answer.kind {
        AnswerKind::Binary(binary) => json!({
            "kind": "binary",
            "name": binary.qualified_name(),
            "module": answer.module_name,
            "release": release,
            "methods": binary
                .public_methods()
                .map(|m| format!("{}{}", m.name, m.descriptor))
                .collect::<Vec<_>>(),
            "fields": binary
                .public_fields()
                .map(|f| format!("{}:{}", f.name, f.descriptor))
                .collect::<Vec<_>>(),
            "restriction": restriction,
        }),
        AnswerKind::Source {
            path,
            main_type_name,
        } => json!({
            "kind": "source",
            "name": main_type_name,
            "path": path.display().to_string(),
            "module": answer.module_name,
            "release": release,
            "restriction": restriction,
        }),
    }
}

pub fn describe_answer(answer: &Answer) -> String {
    let module = answer
        .module_name
        .as_deref()
        .map(|module| format!(" in module {}", module))
        .unwrap_or_default();
    match &answer.kind {
        AnswerKind::Binary(binary) => format!(
            "{} (binary, release {}){}",
            binary.qualified_name(),
            answer.release,
            module
        ),
        AnswerKind::Source { path, .. } => format!(
            "{} (source, release {}){}",
            path.display(),
            answer.release,
            module
        ),
    }
}

pub fn problems_to_json(problems: &[Problem]) -> Result<String> {
    serde_json::to_string_pretty(problems).context("Failed to serialise problems")
}

pub fn get_version() -> String {
    format!(
        "mrj {} - multi-release Java resolver",
        env!("CARGO_PKG_VERSION")
    )
}
