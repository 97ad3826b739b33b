mod cli;
mod commands;

use crate::cli::{Cli, Cmd};
use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> Result<()> {
    let args = Cli::parse();
    init_logging(&args.log_level);

    let output = match args.cmd {
        Cmd::Outline { descriptor } => commands::outline(&commands::load(&descriptor)?),
        Cmd::Values { descriptor } => commands::pretty(&commands::load(&descriptor)?.values()?)?,
        Cmd::Extract { descriptor, fields } => {
            let tree = commands::load(&descriptor)?;
            commands::pretty(&commands::extract_file(&tree, &fields)?)?
        }
        Cmd::Insert {
            descriptor,
            key,
            index,
        } => {
            let mut tree = commands::load(&descriptor)?;
            commands::pretty(&commands::insert(&mut tree, &key, index)?)?
        }
        Cmd::Delete {
            descriptor,
            key,
            index,
        } => {
            let mut tree = commands::load(&descriptor)?;
            commands::pretty(&commands::delete(&mut tree, &key, index)?)?
        }
        Cmd::Bounds { descriptor, key } => {
            commands::bounds(&commands::load(&descriptor)?, &key)?
        }
    };
    println!("{output}");
    Ok(())
}

fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}
