#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

const CREATE_PEOPLE: &str = r#"
migrations:
  - type: CREATE_INDEX
    index: people
    definition:
      settings:
        number_of_replicas: 0
"#;

fn esm(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("esm").unwrap();
    cmd.current_dir(dir.path())
        .env("ESM_CONFIG", dir.path().join("esm.yaml"))
        .env_remove("ESM_IDENTIFIER")
        .env_remove("RUST_LOG");
    cmd
}

fn write_config(dir: &TempDir, url: &str) {
    let yaml = format!(
        "identifier: svc\nretry_count: 0\nbackoff_period_millis: 10\nelasticsearch:\n  urls:\n    - {url}\n"
    );
    std::fs::write(dir.path().join("esm.yaml"), yaml).unwrap();
}

fn write_migration(dir: &Path, file: &str, body: &str) {
    let migrations = dir.join("es/migration");
    std::fs::create_dir_all(&migrations).unwrap();
    std::fs::write(migrations.join(file), body).unwrap();
}

fn project(url: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    write_config(&dir, url);
    write_migration(dir.path(), "V1_0__create_people.yaml", CREATE_PEOPLE);
    dir
}

// ---------------------------------------------------------------------------
// esm validate
// ---------------------------------------------------------------------------

#[test]
fn validate_lists_migrations() {
    let dir = project("http://localhost:9200");
    write_migration(
        dir.path(),
        "V1_1__drop_people.yaml",
        "migrations:\n  - type: DELETE_INDEX\n    index: people\n",
    );

    esm(&dir)
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("VERSION"))
        .stdout(predicate::str::contains("create_people"))
        .stdout(predicate::str::contains("1.1"));
}

#[test]
fn validate_json_reports_operations_and_checksums() {
    let dir = project("http://localhost:9200");

    let output = esm(&dir).args(["validate", "--json"]).output().unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let migration = &value["migrations"][0];
    assert_eq!(migration["version"], "1.0");
    assert_eq!(migration["name"], "create_people");
    assert_eq!(migration["operations"][0], "CREATE_INDEX");
    assert_eq!(migration["checksum"].as_str().unwrap().len(), 64);
    assert!(value["warnings"].as_array().unwrap().iter().all(|w| w["level"] == "warning"));
}

#[test]
fn validate_fails_on_broken_migration_file() {
    let dir = project("http://localhost:9200");
    write_migration(dir.path(), "V2__broken.yaml", "migrations: nope\n");

    esm(&dir)
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("V2__broken.yaml"));
}

#[test]
fn validate_fails_on_config_errors() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("esm.yaml"), "identifier: svc\n").unwrap();
    std::fs::create_dir_all(dir.path().join("es/migration")).unwrap();

    esm(&dir)
        .arg("validate")
        .assert()
        .failure()
        .stdout(predicate::str::contains("[error]"))
        .stdout(predicate::str::contains("elasticsearch.urls"));
}

#[test]
fn identifier_flag_overrides_config() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("esm.yaml"),
        "identifier: ''\nelasticsearch:\n  urls: [\"http://localhost:9200\"]\n",
    )
    .unwrap();
    std::fs::create_dir_all(dir.path().join("es/migration")).unwrap();

    esm(&dir).arg("validate").assert().failure();
    esm(&dir)
        .args(["validate", "--identifier", "svc"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No migrations found"));
}

#[test]
fn missing_config_is_reported() {
    let dir = TempDir::new().unwrap();
    esm(&dir)
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load config"));
}

// ---------------------------------------------------------------------------
// esm migrate
// ---------------------------------------------------------------------------

fn mock_bootstrap(server: &mut mockito::Server) -> Vec<mockito::Mock> {
    vec![
        server
            .mock("GET", "/_nodes")
            .with_body(r#"{"_nodes":{"total":1}}"#)
            .create(),
        server
            .mock("PUT", "/elasticsearch_migration_lock")
            .with_body(r#"{"acknowledged":true}"#)
            .create(),
        server
            .mock("PUT", "/elasticsearch_migration_version")
            .with_status(400)
            .with_body(r#"{"error":{"type":"resource_already_exists_exception"},"status":400}"#)
            .create(),
    ]
}

#[test]
fn migrate_applies_pending_migration() {
    let mut server = mockito::Server::new();
    let _bootstrap = mock_bootstrap(&mut server);
    let lock = server
        .mock("PUT", "/elasticsearch_migration_lock/_doc/svc-global")
        .match_query(mockito::Matcher::UrlEncoded("op_type".into(), "create".into()))
        .with_status(201)
        .with_body(r#"{"result":"created"}"#)
        .expect(1)
        .create();
    let _refresh = server
        .mock("POST", "/elasticsearch_migration_version/_refresh")
        .with_body("{}")
        .create();
    let _search = server
        .mock("POST", "/elasticsearch_migration_version/_search")
        .with_body(r#"{"hits":{"total":{"value":0,"relation":"eq"},"hits":[]}}"#)
        .create();
    let in_progress = server
        .mock("PUT", "/elasticsearch_migration_version/_doc/svc-1.0")
        .match_body(mockito::Matcher::PartialJsonString(
            r#"{"identifier":"svc","version":"1.0","name":"create_people","state":"IN_PROGRESS"}"#
                .into(),
        ))
        .with_status(201)
        .with_body(r#"{"result":"created"}"#)
        .expect(1)
        .create();
    let people = server
        .mock("PUT", "/people")
        .match_query(mockito::Matcher::UrlEncoded(
            "wait_for_active_shards".into(),
            "1".into(),
        ))
        .with_body(r#"{"acknowledged":true}"#)
        .expect(1)
        .create();
    let success = server
        .mock("POST", "/elasticsearch_migration_version/_update/svc-1.0")
        .match_body(mockito::Matcher::PartialJsonString(
            r#"{"doc":{"state":"SUCCESS","failureMessage":""}}"#.into(),
        ))
        .with_body(r#"{"result":"updated"}"#)
        .expect(1)
        .create();
    let release = server
        .mock("DELETE", "/elasticsearch_migration_lock/_doc/svc-global")
        .with_body(r#"{"result":"deleted"}"#)
        .expect(1)
        .create();

    let dir = project(&server.url());
    esm(&dir)
        .arg("migrate")
        .assert()
        .success()
        .stdout(predicate::str::contains("Applied 1 migration(s) for 'svc': 1.0"));

    lock.assert();
    in_progress.assert();
    people.assert();
    success.assert();
    release.assert();
}

#[test]
fn migrate_fails_when_lock_is_held() {
    let mut server = mockito::Server::new();
    let _bootstrap = mock_bootstrap(&mut server);
    let lock = server
        .mock("PUT", "/elasticsearch_migration_lock/_doc/svc-global")
        .with_status(409)
        .with_body(
            r#"{"error":{"type":"version_conflict_engine_exception","reason":"[svc-global]: version conflict, document already exists"},"status":409}"#,
        )
        .expect(1)
        .create();
    let people = server.mock("PUT", "/people").expect(0).create();

    let dir = project(&server.url());
    esm(&dir)
        .arg("migrate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("locked by another process"));

    lock.assert();
    people.assert();
}

#[test]
fn migrate_reports_checksum_drift() {
    let mut server = mockito::Server::new();
    let _bootstrap = mock_bootstrap(&mut server);
    let _lock = server
        .mock("PUT", "/elasticsearch_migration_lock/_doc/svc-global")
        .with_status(201)
        .with_body("{}")
        .create();
    let _refresh = server
        .mock("POST", "/elasticsearch_migration_version/_refresh")
        .with_body("{}")
        .create();
    let _search = server
        .mock("POST", "/elasticsearch_migration_version/_search")
        .with_body(
            r#"{"hits":{"total":{"value":1},"hits":[{"_source":{
                "identifier":"svc","version":"1.0","name":"create_people",
                "sha256Checksum":"0000","state":"SUCCESS","failureMessage":"",
                "created":"2024-05-01T10:00:00Z"}}]}}"#,
        )
        .create();
    let release = server
        .mock("DELETE", "/elasticsearch_migration_lock/_doc/svc-global")
        .with_body("{}")
        .expect(1)
        .create();
    let people = server.mock("PUT", "/people").expect(0).create();

    let dir = project(&server.url());
    esm(&dir)
        .arg("migrate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("checksum mismatch for 1.0"));

    release.assert();
    people.assert();
}

// ---------------------------------------------------------------------------
// esm history / unlock
// ---------------------------------------------------------------------------

#[test]
fn history_prints_recorded_migrations() {
    let mut server = mockito::Server::new();
    let _search = server
        .mock("POST", "/elasticsearch_migration_version/_search")
        .with_body(
            r#"{"hits":{"total":{"value":2},"hits":[
                {"_source":{"identifier":"svc","version":"1.1","name":"add_alias",
                  "sha256Checksum":"bbbb","state":"FAILURE","failureMessage":"alias exploded",
                  "created":"2024-05-02T10:00:00Z"}},
                {"_source":{"identifier":"svc","version":"1.0","name":"create_people",
                  "sha256Checksum":"aaaa","state":"SUCCESS","failureMessage":"",
                  "created":"2024-05-01T10:00:00Z"}}]}}"#,
        )
        .create();

    let dir = project(&server.url());
    let output = esm(&dir).arg("history").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    let first = stdout.find("create_people").unwrap();
    let second = stdout.find("add_alias").unwrap();
    assert!(first < second, "history should be in version order:\n{stdout}");
    assert!(stdout.contains("FAILURE"));
    assert!(stdout.contains("alias exploded"));
}

#[test]
fn history_before_first_run_is_empty() {
    let mut server = mockito::Server::new();
    let _search = server
        .mock("POST", "/elasticsearch_migration_version/_search")
        .with_status(404)
        .with_body(r#"{"error":{"type":"index_not_found_exception"},"status":404}"#)
        .create();

    let dir = project(&server.url());
    esm(&dir)
        .arg("history")
        .assert()
        .success()
        .stdout(predicate::str::contains("No migrations recorded for 'svc'"));
}

#[test]
fn unlock_deletes_lock_record() {
    let mut server = mockito::Server::new();
    let release = server
        .mock("DELETE", "/elasticsearch_migration_lock/_doc/svc-global")
        .with_body(r#"{"result":"deleted"}"#)
        .expect(1)
        .create();

    let dir = project(&server.url());
    esm(&dir)
        .arg("unlock")
        .assert()
        .success()
        .stdout(predicate::str::contains("svc-global"));
    release.assert();
}
