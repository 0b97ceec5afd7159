use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use structopt::StructOpt;
use zip_lookup::{Location, LookupError, LookupService, Store};

#[derive(Deserialize)]
struct Input {
    id: String,
    lat: f64,
    lng: f64,
}

#[derive(Serialize)]
struct Output {
    id: String,
    zip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, StructOpt)]
#[structopt(name = "bulk", about = "bulk resolve json lines from stdin to nearest zip codes")]
struct Opt {
    /// sqlite database path
    #[structopt(short, long = "db", env = "DB_PATH", default_value = "zip_codes.db")]
    db_path: PathBuf,
}

fn resolve(service: &LookupService, input: Input) -> Output {
    let result = Location::new(input.lat, input.lng)
        .map_err(LookupError::from)
        .and_then(|location| service.nearest_code(&location));
    match result {
        Ok(zip) => Output {
            id: input.id,
            zip: Some(zip),
            error: None,
        },
        Err(e) => Output {
            id: input.id,
            zip: None,
            error: Some(e.to_string()),
        },
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let opt = Opt::from_args();
    let service = LookupService::new(Store::new(&opt.db_path));
    service.load()?;

    let inputs = io::BufReader::new(io::stdin())
        .lines()
        .filter(|line| !matches!(line, Ok(l) if l.trim().is_empty()))
        .map(|line| -> Result<Input, Box<dyn Error>> { Ok(serde_json::from_str(&line?)?) })
        .collect::<Result<Vec<_>, _>>()?;

    let outputs: Vec<Output> = inputs
        .into_par_iter()
        .map(|input| resolve(&service, input))
        .collect();

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for output in outputs {
        writeln!(out, "{}", serde_json::to_string(&output)?)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use zip_lookup::PostalRecord;

    fn service() -> (TempDir, LookupService) {
        let dir = TempDir::new().unwrap();
        let records = [
            PostalRecord::new("00601").with_coordinates(18.180555, -66.74996),
            PostalRecord::new("10001").with_coordinates(40.750633, -73.997177),
        ];
        let store = Store::create(dir.path().join("zip_codes.db"), &records).unwrap();
        let service = LookupService::new(store);
        service.load().unwrap();
        (dir, service)
    }

    fn input(line: &str) -> Input {
        serde_json::from_str(line).unwrap()
    }

    #[test]
    fn resolves_to_nearest_code() {
        let (_dir, service) = service();
        let output = resolve(&service, input(r#"{"id": "a", "lat": 40.7, "lng": -74.0}"#));
        assert_eq!(
            serde_json::to_string(&output).unwrap(),
            r#"{"id":"a","zip":"10001"}"#
        );
    }

    #[test]
    fn reports_invalid_coordinates_per_line() {
        let (_dir, service) = service();
        let output = resolve(&service, input(r#"{"id": "b", "lat": 95.0, "lng": 0.0}"#));
        assert_eq!(output.id, "b");
        assert_eq!(output.zip, None);
        let error = output.error.unwrap();
        assert!(error.starts_with("latitude 95"), "{}", error);
    }

    #[test]
    fn reports_unloaded_index() {
        let dir = TempDir::new().unwrap();
        let store = Store::create(dir.path().join("zip_codes.db"), &[]).unwrap();
        let service = LookupService::new(store);
        let output = resolve(&service, input(r#"{"id": "c", "lat": 0.0, "lng": 0.0}"#));
        assert_eq!(output.error.as_deref(), Some("geospatial index unavailable"));
    }
}
