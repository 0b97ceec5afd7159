use std::error::Error;
use std::fs::File;
use std::path::PathBuf;
use structopt::StructOpt;
use tracing::info;
use zip_lookup::service::init_logging;
use zip_lookup::store::import::read_csv;
use zip_lookup::Store;

#[derive(Debug, StructOpt)]
#[structopt(name = "build-db", about = "build the zip code database from a csv table")]
struct Opt {
    /// csv input with header zip,lat,lng,population,city,state,type
    #[structopt(short, long = "csv")]
    csv_path: PathBuf,
    /// sqlite output path
    #[structopt(short, long = "db")]
    db_path: PathBuf,
}

fn main() -> Result<(), Box<dyn Error>> {
    init_logging();
    let opt = Opt::from_args();
    if opt.db_path.exists() {
        return Err(format!("refusing to overwrite {:?}", opt.db_path).into());
    }

    let import = read_csv(File::open(&opt.csv_path)?)?;
    Store::create(&opt.db_path, &import.records)?;
    let with_coordinates = import
        .records
        .iter()
        .filter(|r| r.point().is_some())
        .count();
    info!(
        rows = import.records.len(),
        with_coordinates,
        skipped = import.skipped,
        db = ?opt.db_path,
        "wrote zip code database"
    );
    Ok(())
}
