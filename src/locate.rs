use std::error::Error;
use std::path::PathBuf;
use structopt::StructOpt;
use zip_lookup::{LookupService, Query, Store};

#[derive(Debug, StructOpt)]
#[structopt(name = "locate", about = "look up a zip code or the zip code nearest to lat,lng")]
struct Opt {
    /// sqlite database path
    #[structopt(short, long = "db", env = "DB_PATH", default_value = "zip_codes.db")]
    db_path: PathBuf,
    /// zip code or "lat,lng"
    query: String,
}

fn main() -> Result<(), Box<dyn Error>> {
    let opt = Opt::from_args();
    let service = LookupService::new(Store::new(&opt.db_path));
    // only coordinate queries need the index
    if let Query::Coordinates { .. } = Query::parse(&opt.query) {
        service.load()?;
    }
    let record = service.resolve(&opt.query)?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}
