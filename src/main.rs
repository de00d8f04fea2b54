use std::{
    env,
    fs::File,
    io::{self, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use pdr_nav::{nav::Navigator, parameters::Parameters, replay, sim::walk};

const DEFAULT_PARAMS: &str = "config/params.toml";

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Parameter file. Defaults to config/params.toml when present
    #[arg(short, long)]
    params: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a csv sensor log through the estimators
    Replay {
        input: PathBuf,

        /// Output csv, stdout if omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run a synthetic walk and report the estimation error
    Simulate {
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn main() -> Result<()> {
    // Default log level to "info"
    if env::var("RUST_LOG").is_err() {
        unsafe { env::set_var("RUST_LOG", "info") }
    }

    pretty_env_logger::init();

    let args = Args::parse();
    let mut params = load_params(args.params.as_deref())?;

    match args.cmd {
        Command::Replay { input, output } => {
            let reader = File::open(&input)
                .with_context(|| format!("Cannot open log '{}'", input.display()))?;

            let writer: Box<dyn Write> = match &output {
                Some(path) => Box::new(
                    File::create(path)
                        .with_context(|| format!("Cannot create '{}'", path.display()))?,
                ),
                None => Box::new(io::stdout().lock()),
            };

            let mut nav = Navigator::new(&params);
            replay::replay(&mut nav, reader, writer)?;

            if let Some(pos) = nav.snapshot().lat_lon {
                info!("Final position: lat {:.7} lon {:.7}", pos.lat_deg, pos.lon_deg);
            }
        }
        Command::Simulate { seed } => {
            if let Some(seed) = seed {
                params.sim.seed = seed;
            }

            let report = walk::run(&params)?;
            println!("{}", toml::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

fn load_params(path: Option<&Path>) -> Result<Parameters> {
    match path {
        Some(path) => Ok(Parameters::from_file(path)?),
        None if Path::new(DEFAULT_PARAMS).exists() => {
            Ok(Parameters::from_file(Path::new(DEFAULT_PARAMS))?)
        }
        None => {
            warn!("No parameter file found, using defaults");
            Ok(Parameters::default())
        }
    }
}
