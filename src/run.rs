
use crate::config;
use crate::errors::Result;
use crate::pipeline::{self, RunSummary};

use log::info;
use std::env;
use std::time::Instant;


pub struct Run {}

impl Run {

    /// Reads the json parameters file named on the command line and runs every stage.
    pub fn run() -> Result<RunSummary> {

        info!("entering program...");
        let args: Vec<String> = env::args().collect();

        info!("building parameters...");
        let config = config::Config::new(&args)?;

        let my_time = Instant::now();
        let context = pipeline::initialize(&config)?;
        let summary = context.run()?;

        match &summary.relative_bin {
            Some(bin) => info!("relative vectors at {} and {}", summary.relative_txt.display(), bin.display()),
            None => info!("relative vectors at {}", summary.relative_txt.display()),
        }
        info!("done, took {} seconds ...", my_time.elapsed().as_secs());
        Ok(summary)
    }

}
