//! Hyperhook CLI: the `hyperhook` command.

mod cli;
mod commands;
mod support;

use clap::Parser;
use cli::{Cli, Commands};
use commands::write::Target;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let home = cli.tracker;
    let uid = cli.uid;
    let target = |json| Target {
        home: home.clone(),
        uid: uid.clone(),
        json,
    };

    match cli.command {
        Commands::Init {
            schema,
            enable,
            json,
        } => commands::init::run(home.clone(), schema, enable, json),

        Commands::Create {
            class,
            assignments,
            json,
        } => commands::write::run_create(target(json), class, assignments),

        Commands::Set {
            class,
            id,
            assignments,
            json,
        } => commands::write::run_set(target(json), class, id, assignments),

        Commands::Retire { class, id, json } => {
            commands::write::run_retire(target(json), class, id)
        }

        Commands::Restore { class, id, json } => {
            commands::write::run_restore(target(json), class, id)
        }

        Commands::Get {
            class,
            id,
            prop,
            json,
        } => commands::read::run_get(home.clone(), class, id, prop, json),

        Commands::List { class, json } => commands::read::run_list(home.clone(), class, json),

        Commands::Filter {
            class,
            filters,
            json,
        } => commands::read::run_filter(home.clone(), class, filters, json),

        Commands::History { class, id, json } => {
            commands::read::run_history(home.clone(), class, id, json)
        }

        Commands::Detectors { enable, json } => {
            commands::detectors::run(home.clone(), uid.clone(), enable, json)
        }

        Commands::Expr {
            values,
            link,
            against,
            json,
        } => commands::expr::run(values, link, against, json),
    }
}

/// `RUST_LOG` selects the filter (default `warn`); `-v` forces `debug`.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}
