//! Select articles from a small inline catalog and print the model and the report.
//!
//! Usage: `select_demo [tnn_data_<target>_clicks.csv]`. Only the file name is
//! read, for its click target. Set `SCIP_BIN` to solve with SCIP instead of the
//! bundled solver.

use std::env;
use std::path::Path;

use article_select::{
    build_model, select_articles, Catalog, ItemRecord, MicroLpSolver, ScipCliSolver, SelectionConfig,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_TARGET: u64 = 300;

/// Click target encoded as the third `_`-separated field of a data file name.
/// Leading directories are ignored.
fn target_from_file_name(path: &str) -> Option<u64> {
    let name = Path::new(path).file_name()?.to_str()?;
    name.split('_').nth(2)?.parse().ok()
}

fn records() -> Vec<ItemRecord> {
    vec![
        ItemRecord::new("A1", "X", "P", 10.0, 100),
        ItemRecord::new("A2", "Y", "P", 20.0, 200),
        ItemRecord::new("A3", "X", "Q", 5.0, 50),
        ItemRecord::new("A4", "Y", "Q", 15.0, 150),
    ]
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let target = match env::args().nth(1) {
        Some(arg) => target_from_file_name(&arg).unwrap_or_else(|| {
            warn!(arg = %arg, default = DEFAULT_TARGET, "no click target in file name");
            DEFAULT_TARGET
        }),
        None => DEFAULT_TARGET,
    };
    let config = SelectionConfig::new(target);
    info!(target_clicks = target, "selecting articles");

    let catalog = Catalog::new(records())?;
    println!("{}", build_model(&catalog, &config)?.to_lp_string());

    let outcome = match env::var_os("SCIP_BIN") {
        Some(_) => select_articles(records(), &config, &ScipCliSolver::from_env()),
        None => select_articles(records(), &config, &MicroLpSolver),
    };
    match outcome {
        Ok(report) => println!("{}", report.to_pretty_json()?),
        Err(e) => {
            error!(%e, "no selection");
            return Err(e.into());
        }
    }
    Ok(())
}
