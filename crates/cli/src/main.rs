mod logging;

use clap::{Args, Parser, Subcommand, ValueEnum};
use engine::{ClassificationScope, FailureReason, Languages, RunConfig, RunReport, ScanReport};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "role-injector")]
#[command(
    about = "Inject interchange witness roles into a genealogy database",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Synchronize role codes and inject witness rows.
    Run(RunArgs),
    /// Classify role usage in an interchange file without opening a database.
    Scan(ScanArgs),
}

#[derive(Args)]
struct InputArgs {
    /// Interchange (.ged) file to read.
    #[arg(long, env = "INJECTOR_INTERCHANGE")]
    interchange: PathBuf,
    /// JSON mapping of event and role names.
    #[arg(long, env = "INJECTOR_MAPPING")]
    mapping: PathBuf,
    /// Extra tag treated as a generic event whose name comes from TYPE (repeatable).
    #[arg(long = "generic-tag", value_name = "TAG")]
    generic_tags: Vec<String>,
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    input: InputArgs,
    /// Directory holding the database tables.
    #[arg(long, env = "INJECTOR_DATABASE")]
    database: PathBuf,
    /// Table prefix; detected from the database directory when omitted.
    #[arg(long, env = "INJECTOR_PREFIX")]
    prefix: Option<String>,
    /// Picks among several detected prefixes.
    #[arg(long, env = "INJECTOR_PREFIX_HINT")]
    prefix_hint: Option<String>,
    /// Compute every decision but write nothing.
    #[arg(long, env = "INJECTOR_SIMULATE")]
    simulate: bool,
    /// How principal usage is aggregated before codes are allocated.
    #[arg(long, value_enum, default_value_t = Scope::Global, env = "INJECTOR_SCOPE")]
    scope: Scope,
    /// Role code used when no better code exists.
    #[arg(long, default_value_t = RunConfig::DEFAULT_ROLE_CODE, env = "INJECTOR_DEFAULT_ROLE")]
    default_role: u32,
    /// Language tag of the first label of new role codes.
    #[arg(long, default_value = "ENGLISH", env = "INJECTOR_PRIMARY_LANGUAGE")]
    primary_language: String,
    /// Language tag of the second label of new role codes.
    #[arg(long, default_value = "FRENCH", env = "INJECTOR_SECONDARY_LANGUAGE")]
    secondary_language: String,
    /// Maximum note length in characters.
    #[arg(long, default_value_t = RunConfig::NOTE_CAPACITY, env = "INJECTOR_NOTE_CAPACITY")]
    note_capacity: usize,
    /// Run log file (default: injection_{dryrun|real}_{timestamp}.txt in the database directory).
    #[arg(long, env = "INJECTOR_LOG_FILE")]
    log_file: Option<PathBuf>,
    /// Log to stderr only.
    #[arg(long, conflicts_with = "log_file")]
    no_log_file: bool,
}

#[derive(Args)]
struct ScanArgs {
    #[command(flatten)]
    input: InputArgs,
    /// Also list the event types each role appears in.
    #[arg(long)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Scope {
    Global,
    PerEventType,
}

impl From<Scope> for ClassificationScope {
    fn from(scope: Scope) -> Self {
        match scope {
            Scope::Global => ClassificationScope::Global,
            Scope::PerEventType => ClassificationScope::PerEventType,
        }
    }
}

impl InputArgs {
    fn generic_tags(&self) -> Vec<String> {
        let mut tags = gedcom::ScanOptions::default().generic_tags;
        for tag in &self.generic_tags {
            let tag = tag.trim().to_uppercase();
            if !tag.is_empty() && !tags.contains(&tag) {
                tags.push(tag);
            }
        }
        tags
    }
}

impl RunArgs {
    fn config(&self) -> RunConfig {
        let mut config = RunConfig::new(
            &self.input.interchange,
            &self.input.mapping,
            &self.database,
        );
        config.prefix = self.prefix.clone();
        config.prefix_hint = self.prefix_hint.clone();
        config.simulate = self.simulate;
        config.scope = self.scope.into();
        config.default_role_code = self.default_role;
        config.languages = Languages {
            primary: self.primary_language.clone(),
            secondary: self.secondary_language.clone(),
        };
        config.note_capacity = self.note_capacity;
        config.generic_tags = self.input.generic_tags();
        config
    }

    fn log_path(&self) -> Option<PathBuf> {
        if self.no_log_file {
            return None;
        }
        Some(
            self.log_file
                .clone()
                .unwrap_or_else(|| logging::default_log_path(&self.database, self.simulate)),
        )
    }
}

fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("warning: .env: {}", e);
    }

    let cli = Cli::parse();

    match &cli.command {
        Commands::Run(args) => cmd_run(args)?,
        Commands::Scan(args) => cmd_scan(args)?,
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

fn cmd_run(args: &RunArgs) -> anyhow::Result<()> {
    let log_path = args.log_path();
    logging::init(log_path.as_deref())?;
    if let Some(path) = &log_path {
        tracing::info!(path = %path.display(), "run log");
    }

    let config = args.config();
    tracing::info!(
        interchange = %config.interchange.display(),
        database = %config.database.display(),
        simulate = config.simulate,
        scope = %config.scope,
        "starting injection"
    );
    let report = engine::run(&config)?;
    print_run_report(&report);
    Ok(())
}

fn print_run_report(report: &RunReport) {
    let title = if report.simulated {
        "| ROLE INJECTION (SIMULATION)              |"
    } else {
        "| ROLE INJECTION                           |"
    };
    println!("+------------------------------------------+");
    println!("{title}");
    println!("+------------------------------------------+");
    println!("| Table prefix   : {:>22} |", report.prefix);
    println!("| Dataset        : {:>22} |", report.dataset);
    println!("| Event blocks   : {:>22} |", report.events);
    println!("| References     : {:>22} |", report.references);
    println!("+------------------------------------------+");

    println!("\n+------------------------------------------+");
    println!("| SCHEMA                                   |");
    println!("+------------------------------------------+");
    println!("| Roles          : {:>22} |", report.usage.roles);
    println!("| Event types    : {:>22} |", report.schema.event_types);
    println!("| Types modified : {:>22} |", report.schema.types_modified);
    println!("| Codes created  : {:>22} |", report.schema.codes_created);
    println!("+------------------------------------------+");
    if report.schema.malformed_grammars > 0 {
        println!(
            "warning: {} malformed role grammar(s) were treated as empty",
            report.schema.malformed_grammars
        );
    }

    let tally = &report.tally;
    println!("\n+------------------------------------------+");
    println!("| WITNESS ROWS                             |");
    println!("+------------------------------------------+");
    println!("| Normal         : {:>22} |", tally.injected_normal);
    println!("| Principal      : {:>22} |", tally.injected_principal);
    println!("| Duplicates     : {:>22} |", tally.skipped_duplicate);
    println!("| Fallback codes : {:>22} |", tally.fallbacks);
    println!("| Errors         : {:>22} |", tally.errors);
    println!("+------------------------------------------+");

    if tally.errors > 0 {
        println!("\nERRORS BY REASON:");
        for reason in [
            FailureReason::UnresolvedWitness,
            FailureReason::UnknownEventType,
            FailureReason::UnresolvedOwner,
            FailureReason::NoMatchingEvent,
        ] {
            let count = tally.failures_for(reason);
            if count > 0 {
                println!("  {:<20} {:>6}", reason.to_string(), count);
            }
        }
    }

    if report.simulated {
        println!("\nSimulation only: nothing was written.");
    }
}

// ---------------------------------------------------------------------------
// scan
// ---------------------------------------------------------------------------

fn cmd_scan(args: &ScanArgs) -> anyhow::Result<()> {
    logging::init(None)?;
    let options = gedcom::ScanOptions {
        generic_tags: args.input.generic_tags(),
    };
    let report = engine::scan_roles(&args.input.interchange, &args.input.mapping, &options)?;
    print_scan_report(&report, args.verbose);
    Ok(())
}

fn print_scan_report(report: &ScanReport, verbose: bool) {
    let summary = report.usage.summary();
    println!("+------------------------------------------+");
    println!("| ROLE USAGE                               |");
    println!("+------------------------------------------+");
    println!("| Event blocks   : {:>22} |", report.events);
    println!("| References     : {:>22} |", report.references);
    println!("| Roles          : {:>22} |", summary.roles);
    println!("| Normal         : {:>22} |", summary.normal);
    println!("| Principal      : {:>22} |", summary.principal);
    println!("| Both           : {:>22} |", summary.both);
    println!("+------------------------------------------+");

    if report.usage.is_empty() {
        println!("No witness roles found.");
        return;
    }

    println!("\nROLES:");
    for (key, usage) in report.usage.iter() {
        let variants = match (usage.flags.normal, usage.flags.principal) {
            (true, true) => "normal+principal",
            (false, true) => "principal",
            _ => "normal",
        };
        println!("  {:<24} {:<18} {}", key, variants, usage.labels.primary);
        if verbose {
            for (event, flags) in &usage.events {
                let marker = match (flags.normal, flags.principal) {
                    (true, true) => "N+P",
                    (false, true) => "P",
                    _ => "N",
                };
                println!("      {:<20} {}", event, marker);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_args_build_config() {
        let cli = Cli::try_parse_from([
            "role-injector",
            "run",
            "--interchange",
            "export.ged",
            "--mapping",
            "mapping.json",
            "--database",
            "db",
            "--simulate",
            "--scope",
            "per-event-type",
            "--generic-tag",
            "_milt",
            "--generic-tag",
            "EVEN",
        ])
        .unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        let config = args.config();
        assert!(config.simulate);
        assert_eq!(config.scope, ClassificationScope::PerEventType);
        assert_eq!(config.default_role_code, 2);
        assert_eq!(config.languages.primary, "ENGLISH");
        assert_eq!(config.generic_tags, vec!["EVEN", "FACT", "OCCU", "_MILT"]);
        assert_eq!(config.database, PathBuf::from("db"));
    }

    #[test]
    fn test_log_path_defaults_to_database_dir() {
        let cli = Cli::try_parse_from([
            "role-injector",
            "run",
            "--interchange",
            "a.ged",
            "--mapping",
            "m.json",
            "--database",
            "db",
        ])
        .unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        let path = args.log_path().unwrap();
        assert_eq!(path.parent(), Some(std::path::Path::new("db")));

        let quiet = Cli::try_parse_from([
            "role-injector",
            "run",
            "--interchange",
            "a.ged",
            "--mapping",
            "m.json",
            "--database",
            "db",
            "--no-log-file",
        ])
        .unwrap();
        let Commands::Run(args) = quiet.command else {
            panic!("expected run");
        };
        assert!(args.log_path().is_none());
    }

    #[test]
    fn test_scan_subcommand_reads_without_database() {
        let dir = tempfile::tempdir().unwrap();
        let ged = dir.path().join("a.ged");
        let mapping = dir.path().join("m.json");
        std::fs::write(
            &ged,
            "0 @I1@ INDI\n1 MARR\n2 _SHAR @I2@\n3 ROLE Witness\n2 _SHAR @I1@\n3 ROLE Witness\n",
        )
        .unwrap();
        std::fs::write(&mapping, r#"{"events": {}, "roles": {}}"#).unwrap();

        let report =
            engine::scan_roles(&ged, &mapping, &gedcom::ScanOptions::default()).unwrap();
        assert_eq!(report.events, 1);
        assert_eq!(report.references, 2);
        assert_eq!(report.usage.summary().both, 1);
    }
}
