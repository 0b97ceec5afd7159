use std::collections::HashSet;
use std::net::TcpListener;
use std::sync::Arc;
use tempfile::TempDir;
use zip_lookup::service::run;
use zip_lookup::{LookupService, PostalRecord, Store};

fn records() -> Vec<PostalRecord> {
    let mut records = vec![
        PostalRecord::new("00601")
            .with_coordinates(18.180555, -66.74996)
            .with_place("Adjuntas", "PR")
            .with_population(16834)
            .with_type("zona urbana"),
        PostalRecord::new("00602")
            .with_coordinates(18.361945, -67.175597)
            .with_place("Aguada", "PR")
            .with_population(37642),
        PostalRecord::new("10001")
            .with_coordinates(40.750633, -73.997177)
            .with_place("New York", "NY")
            .with_population(25026),
    ];
    for i in 0..600 {
        let record = PostalRecord::new(&format!("{:05}", 20000 + i))
            .with_coordinates(30.0 + (i / 30) as f64 * 0.5, -120.0 + (i % 30) as f64 * 0.5)
            .with_population((i % 7) as i64);
        let record = if i % 4 == 0 {
            record
        } else {
            record.with_place("Somewhere", "CA")
        };
        records.push(record);
    }
    records
}

struct TestApp {
    base_url: String,
    _dir: TempDir,
}

fn spawn_app(load: bool) -> TestApp {
    let dir = TempDir::new().expect("could not create temp dir");
    let store =
        Store::create(dir.path().join("zip_codes.db"), &records()).expect("could not build store");
    let service = LookupService::new(store);
    if load {
        service.load().expect("could not build index");
    }
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let server = run(listener, Arc::new(service)).expect("Failed to start server");
    let _ = tokio::spawn(server);
    TestApp {
        base_url: format!("http://127.0.0.1:{}", port),
        _dir: dir,
    }
}

#[actix_rt::test]
async fn nearest_hit() {
    // Arrange
    let app = spawn_app(true);
    let client = reqwest::Client::new();

    // Act
    let response = client
        .get(&format!(
            "{}/nearest?lat=18.180555&lng=-66.74996",
            &app.base_url
        ))
        .send()
        .await
        .expect("Failed to execute request.");

    // Assert
    assert!(response.status().is_success());
    let record: PostalRecord = response.json().await.expect("failed to read body");
    assert_eq!(record.code, "00601");
    assert_eq!(record.city.as_deref(), Some("Adjuntas"));
    assert_eq!(record.state.as_deref(), Some("PR"));
}

#[actix_rt::test]
async fn coordinates_in_path() {
    let app = spawn_app(true);
    let client = reqwest::Client::new();

    let response = client
        .get(&format!("{}/18.180555,-66.74996", &app.base_url))
        .send()
        .await
        .expect("Failed to execute request.");

    assert!(response.status().is_success());
    let body: serde_json::Value = response.json().await.expect("failed to read body");
    assert_eq!(body["zip"], "00601");
    assert_eq!(body["type"], "zona urbana");
}

#[actix_rt::test]
async fn invalid_coordinates_in_path() {
    let app = spawn_app(true);
    let client = reqwest::Client::new();

    let response = client
        .get(&format!("{}/91.0,-66.0", &app.base_url))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.expect("failed to read body");
    assert_eq!(
        body["detail"],
        "latitude 91 is above the maximum of 90, must be between -90 and 90"
    );
}

#[actix_rt::test]
async fn zip_miss() {
    let app = spawn_app(true);
    let client = reqwest::Client::new();

    let response = client
        .get(&format!("{}/99999", &app.base_url))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(response.status().as_u16(), 404);
    let body: serde_json::Value = response.json().await.expect("failed to read body");
    assert_eq!(body["detail"], "zip code 99999 not found");
}

#[actix_rt::test]
async fn random_zip() {
    let app = spawn_app(true);
    let client = reqwest::Client::new();

    let response = client
        .get(&format!("{}/random?city_and_state_only=true", &app.base_url))
        .send()
        .await
        .expect("Failed to execute request.");

    assert!(response.status().is_success());
    let record: PostalRecord = response.json().await.expect("failed to read body");
    assert_eq!(record.code.len(), 5);
    assert!(record.has_city_and_state());
}

#[actix_rt::test]
async fn paginated_listing_covers_dataset() {
    let app = spawn_app(false);
    let client = reqwest::Client::new();

    for sort_by in ["population", "state"] {
        let mut seen = HashSet::new();
        let mut total = 0;
        for page in 1.. {
            let response = client
                .get(&format!(
                    "{}/zips?page={}&sort_by={}&order=asc&city_and_state_only=true",
                    &app.base_url, page, sort_by
                ))
                .send()
                .await
                .expect("Failed to execute request.");
            assert!(response.status().is_success());
            let page_records: Vec<PostalRecord> =
                response.json().await.expect("failed to read body");
            assert!(page_records.len() <= 250);
            if page_records.is_empty() {
                break;
            }
            total += page_records.len();
            seen.extend(page_records.into_iter().map(|r| r.code));
        }
        let expected = records()
            .into_iter()
            .filter(|r| r.has_city_and_state())
            .count();
        assert_eq!(total, expected, "sort_by {}", sort_by);
        assert_eq!(seen.len(), expected, "sort_by {}", sort_by);
    }
}

#[actix_rt::test]
async fn nearest_unavailable_until_reload() {
    let app = spawn_app(false);
    let client = reqwest::Client::new();
    let nearest = format!("{}/nearest?lat=40.75&lng=-74.0", &app.base_url);

    let response = client.get(&nearest).send().await.expect("Failed to execute request.");
    assert_eq!(response.status().as_u16(), 503);

    let response = client
        .post(&format!("{}/reload", &app.base_url))
        .send()
        .await
        .expect("Failed to execute request.");
    assert!(response.status().is_success());
    let body: serde_json::Value = response.json().await.expect("failed to read body");
    assert_eq!(body["points"], 603);

    let response = client.get(&nearest).send().await.expect("Failed to execute request.");
    assert!(response.status().is_success());
    let record: PostalRecord = response.json().await.expect("failed to read body");
    assert_eq!(record.code, "10001");
}

#[actix_rt::test]
async fn metrics_are_exposed() {
    let app = spawn_app(true);
    let client = reqwest::Client::new();

    let response = client
        .get(&format!("{}/health", &app.base_url))
        .send()
        .await
        .expect("Failed to execute request.");
    assert!(response.status().is_success());

    let response = client
        .get(&format!("{}/metrics", &app.base_url))
        .send()
        .await
        .expect("Failed to execute request.");
    assert!(response.status().is_success());
    let text = response.text().await.expect("failed to read body");
    assert!(text.contains("http_requests_total"));
    assert!(text.contains("route=\"/health\""));
}
