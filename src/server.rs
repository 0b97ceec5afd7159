use std::path::PathBuf;
use std::sync::Arc;
use structopt::StructOpt;
use tracing::{error, info};
use zip_lookup::service::{init_logging, record_index_size, start};
use zip_lookup::{LookupService, Store};

#[derive(Debug, StructOpt)]
#[structopt(name = "zip-lookup", about = "zip code lookup service")]
pub struct Opt {
    /// sqlite database path
    #[structopt(short, long = "db", env = "DB_PATH", default_value = "zip_codes.db")]
    pub db_path: PathBuf,
    /// http host
    #[structopt(long, env = "HOST", default_value = "127.0.0.1")]
    pub host: String,
    /// http port
    #[structopt(short, long, env = "PORT", default_value = "8000")]
    pub port: u16,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    let opt = Opt::from_args();
    if !opt.db_path.exists() {
        return Err(format!("database {:?} does not exist", opt.db_path).into());
    }
    let service = Arc::new(LookupService::new(Store::new(&opt.db_path)));
    info!("reference store {:?} opened", opt.db_path);

    // serve code and listing queries while the index builds
    let loader = service.clone();
    tokio::task::spawn_blocking(move || match loader.load() {
        Ok(points) => record_index_size(points),
        Err(e) => error!(error = %e, "could not build geospatial index"),
    });

    start(service, &opt.host, opt.port).await?;
    Ok(())
}
