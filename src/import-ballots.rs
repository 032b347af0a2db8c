//! The scheduled command that brings the local store in line with the
//! candidacy feed and the geography registry.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use clap::{Arg, ArgAction, ArgMatches, Command};
use log::{error, info};

use ballot_sync::{
    config::{connect_store, Config},
    logging::LogSink,
    store::{BallotStore, MemoryStore},
    sync::{fetch::HttpFetcher, BallotImporter, ImportOptions},
};

const PROGRAM_NAME: &str = "import-ballots";

const ABOUT_TEXT: &str = "Import ballots, candidacies and their metadata into the local store.

With no filter the whole dataset is read from the bulk snapshot.

EXIT CODES:
     0: Import finished.
 Other: Error.";

const CURRENT_ONLY: &str = "current-only";
const RECENTLY_UPDATED: &str = "recently-updated";
const SINCE: &str = "since";
const EXCLUDE_CANDIDACIES: &str = "exclude-candidacies";
const FORCE_UPDATE: &str = "force-update";
const FORCE_METADATA: &str = "force-metadata";
const FORCE_CURRENT_METADATA: &str = "force-current-metadata";
const REMOVE_DELETED: &str = "remove-deleted";
const DRY_RUN: &str = "dry-run";

/// Construct the CLI configuration.
fn cli() -> Command {
    // Make the build dirty when the toml changes.
    include_str!("../Cargo.toml");

    let flag = |name: &'static str, help: &'static str| {
        Arg::new(name).long(name).help(help).action(ArgAction::SetTrue)
    };

    clap::command!(PROGRAM_NAME)
        .about(ABOUT_TEXT)
        .arg(flag(CURRENT_ONLY, "Only import ballots in current elections"))
        .arg(flag(
            RECENTLY_UPDATED,
            "Only import ballots changed since the newest one already stored",
        ))
        .arg(
            Arg::new(SINCE)
                .long(SINCE)
                .value_name("DATETIME")
                .help("Only import ballots changed since this RFC 3339 time or date")
                .value_parser(parse_since)
                .action(ArgAction::Set),
        )
        .arg(flag(EXCLUDE_CANDIDACIES, "Import ballots without their candidacies"))
        .arg(flag(FORCE_UPDATE, "Re-derive enriched fields that are already set"))
        .arg(flag(FORCE_METADATA, "Enrich ballots in past elections too"))
        .arg(flag(
            FORCE_CURRENT_METADATA,
            "Refresh ballot metadata even when some is already stored",
        ))
        .arg(flag(
            REMOVE_DELETED,
            "Delete elections and ballots the registry has removed",
        ))
        .arg(flag(
            DRY_RUN,
            "Import into a throwaway in-memory store instead of the database",
        ))
}

/// Accept a full timestamp, or a bare date meaning midnight UTC.
fn parse_since(value: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(datetime) = DateTime::parse_from_rfc3339(value) {
        return Ok(datetime.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|datetime| Utc.from_utc_datetime(&datetime))
        .ok_or_else(|| format!("'{value}' is neither an RFC 3339 time nor a YYYY-MM-DD date"))
}

fn options(matches: &ArgMatches) -> ImportOptions {
    ImportOptions {
        current_only: matches.get_flag(CURRENT_ONLY),
        recently_updated: matches.get_flag(RECENTLY_UPDATED),
        since: matches.get_one::<DateTime<Utc>>(SINCE).copied(),
        force_update: matches.get_flag(FORCE_UPDATE),
        force_metadata: matches.get_flag(FORCE_METADATA),
        force_current_metadata: matches.get_flag(FORCE_CURRENT_METADATA),
        exclude_candidacies: matches.get_flag(EXCLUDE_CANDIDACIES),
        remove_deleted: matches.get_flag(REMOVE_DELETED),
    }
}

async fn import(store: &dyn BallotStore, config: &Config, options: ImportOptions) -> Result<(), String> {
    let fetcher = HttpFetcher::new().map_err(|e| e.to_string())?;
    let mut importer = BallotImporter::new(store, Arc::new(fetcher), config, options);
    let mut sink = LogSink::new();
    let summary = importer.run(&mut sink).await.map_err(|e| e.to_string())?;
    println!("{summary}");
    Ok(())
}

async fn run(matches: ArgMatches) -> Result<(), String> {
    let figment = rocket::Config::figment();
    let config = figment
        .extract::<Config>()
        .map_err(|e| format!("Failed to load application config: {e}"))?;
    let options = options(&matches);

    if matches.get_flag(DRY_RUN) {
        info!("Dry run, nothing will be written to the database");
        let store = MemoryStore::new();
        import(&store, &config, options).await?;
        info!("Dry run would hold {}", store.counts().await);
        Ok(())
    } else {
        let store = connect_store(&figment, &config).await?;
        import(&store, &config, options).await
    }
}

#[rocket::main]
async fn main() {
    let matches = cli().get_matches();

    if let Err(err) =
        log4rs::init_file("log4rs.yaml", log4rs_dynamic_filters::default_deserializers())
    {
        eprintln!("Failed to initialise logging: {err}");
        std::process::exit(1)
    }

    if let Err(err) = run(matches).await {
        error!("{err}");
        error!("Import failed");
        std::process::exit(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_is_valid() {
        cli().debug_assert();
    }

    #[test]
    fn flags_become_options() {
        let matches = cli()
            .try_get_matches_from([
                PROGRAM_NAME,
                "--current-only",
                "--since",
                "2024-05-01",
                "--remove-deleted",
            ])
            .unwrap();
        let options = options(&matches);
        assert!(options.current_only);
        assert!(options.remove_deleted);
        assert!(!options.recently_updated);
        assert_eq!(
            options.since,
            Some(parse_since("2024-05-01T00:00:00Z").unwrap())
        );
        assert!(options.is_incremental());
    }

    #[test]
    fn since_must_parse() {
        assert!(parse_since("2024-05-01T12:30:00+01:00").is_ok());
        assert!(cli()
            .try_get_matches_from([PROGRAM_NAME, "--since", "last tuesday"])
            .is_err());
    }
}
