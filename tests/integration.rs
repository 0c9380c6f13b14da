use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

const SOURCE: &str = "\
PlayerID,Age,Gender,PlayTimeHours,InGamePurchases,EngagementLevel
9000,43,Male,16.271119,0,Medium
9001,29,Female,5.525961,1,
9002,22,Female,12.3456,0,High
9000,43,Male,16.271119,0,Medium
9003,35,Male,20.5,1,Low
";

const EXPECTED_CLEAN: &str = "\
player_id,age,gender,play_time_hours,in_game_purchases,engagement_level
9000,43,Male,16.27,No,Medium
9002,22,Female,12.35,No,High
9003,35,Male,20.5,Yes,Low
";

fn etl_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("etl");
    path
}

struct TestEnv {
    _tmp: TempDir,
    root: PathBuf,
    config_path: PathBuf,
}

impl TestEnv {
    fn raw(&self) -> PathBuf {
        self.root.join("data/data_raw.csv")
    }

    fn clean(&self) -> PathBuf {
        self.root.join("data/data_clean.csv")
    }
}

fn setup_test_env_with(start_date: &str) -> TestEnv {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let data_dir = root.join("data");
    fs::create_dir_all(&data_dir).unwrap();

    fs::write(data_dir.join("source.csv"), SOURCE).unwrap();

    // Port 1 refuses connections, so the index store is unreachable.
    let config_content = format!(
        r#"[pipeline]
name = "gaming_behavior_daily"
owner = "data-eng"
start_date = "{start_date}"

[db]
url = "sqlite://{root}/data/etl.sqlite?mode=rwc"
table = "player_sessions"

[paths]
source = "{root}/data/source.csv"
raw_snapshot = "{root}/data/data_raw.csv"
clean_snapshot = "{root}/data/data_clean.csv"

[index]
url = "http://127.0.0.1:1"
name = "player_sessions"
timeout_secs = 2
"#,
        start_date = start_date,
        root = root.display(),
    );

    let config_path = config_dir.join("etl.toml");
    fs::write(&config_path, config_content).unwrap();

    TestEnv {
        _tmp: tmp,
        root,
        config_path,
    }
}

fn setup_test_env() -> TestEnv {
    setup_test_env_with("2024-07-10T06:30:00")
}

fn run_etl(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = etl_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .arg("--progress")
        .arg("off")
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run etl binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_plan_lists_tasks_in_order() {
    let env = setup_test_env();
    let (stdout, stderr, success) = run_etl(&env.config_path, &["plan"]);
    assert!(success, "plan failed: {}", stderr);
    assert!(stdout.contains("owner: data-eng"));
    assert!(stdout.contains("schedule: 30 6 * * *"));
    assert!(stdout.contains("catchup: false"));
    assert!(stdout.contains("csv_to_db >> db_to_csv >> data_cleaning >> csv_to_index"));
}

#[test]
fn test_load_preserves_row_count() {
    let env = setup_test_env();
    let (stdout, stderr, success) = run_etl(&env.config_path, &["load"]);
    assert!(success, "load failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("rows loaded: 5"));
    assert!(stdout.contains("columns: 6"));
    assert!(stdout.contains("ok"));
}

#[test]
fn test_load_is_full_refresh() {
    let env = setup_test_env();
    run_etl(&env.config_path, &["load"]);
    let (stdout, _, success) = run_etl(&env.config_path, &["load"]);
    assert!(success);
    assert!(stdout.contains("rows loaded: 5"));
}

#[test]
fn test_extract_reproduces_source() {
    let env = setup_test_env();
    run_etl(&env.config_path, &["load"]);
    let (stdout, stderr, success) = run_etl(&env.config_path, &["extract"]);
    assert!(success, "extract failed: {}", stderr);
    assert!(stdout.contains("rows extracted: 5"));

    let raw = fs::read_to_string(env.raw()).unwrap();
    assert_eq!(raw, SOURCE);
}

#[test]
fn test_extract_without_table_fails() {
    let env = setup_test_env();
    let (_, stderr, success) = run_etl(&env.config_path, &["extract"]);
    assert!(!success);
    assert!(stderr.contains("db_to_csv"), "stderr: {}", stderr);
}

#[test]
fn test_clean_scenario() {
    let env = setup_test_env();
    let (stdout, stderr, success) = run_etl(
        &env.config_path,
        &["run", "--to", "clean", "--ignore-start-date"],
    );
    assert!(success, "run failed: stdout={}, stderr={}", stdout, stderr);
    assert_eq!(stdout.lines().filter(|l| *l == "ok").count(), 3);
    assert!(stdout.contains("dropped (missing): 1"));
    assert!(stdout.contains("dropped (duplicate): 1"));
    assert!(stdout.contains("rows written: 3"));

    let clean = fs::read_to_string(env.clean()).unwrap();
    assert_eq!(clean, EXPECTED_CLEAN);
}

#[test]
fn test_clean_is_idempotent() {
    let env = setup_test_env();
    run_etl(&env.config_path, &["run", "--to", "clean"]);
    let first = fs::read(env.clean()).unwrap();

    let (_, stderr, success) = run_etl(&env.config_path, &["clean"]);
    assert!(success, "clean failed: {}", stderr);
    let second = fs::read(env.clean()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_clean_can_rerun_from_raw_snapshot() {
    let env = setup_test_env();
    run_etl(&env.config_path, &["run", "--to", "extract"]);
    fs::remove_file(env.root.join("data/etl.sqlite")).unwrap();

    let (_, stderr, success) = run_etl(&env.config_path, &["run", "--from", "clean", "--to", "clean"]);
    assert!(success, "clean from raw failed: {}", stderr);
    assert_eq!(fs::read_to_string(env.clean()).unwrap(), EXPECTED_CLEAN);
}

#[test]
fn test_clean_missing_column_fails() {
    let env = setup_test_env();
    fs::write(env.raw(), "PlayerID,PlayTimeHours\n1,2.5\n").unwrap();
    let (_, stderr, success) = run_etl(&env.config_path, &["clean"]);
    assert!(!success);
    assert!(stderr.contains("in_game_purchases"), "stderr: {}", stderr);
    assert!(!env.clean().exists());
}

#[test]
fn test_run_before_start_date_is_refused() {
    let env = setup_test_env_with("2999-01-01T06:30:00");
    let (stdout, _, success) = run_etl(&env.config_path, &["run"]);
    assert!(success);
    assert!(stdout.contains("not eligible"));
    assert!(!env.raw().exists());
}

#[test]
fn test_run_stops_at_first_failure() {
    let env = setup_test_env();
    let (stdout, stderr, success) = run_etl(&env.config_path, &["run"]);
    assert!(!success, "index stage should fail against an unreachable store");
    assert!(stdout.contains("rows written: 3"));
    assert!(stderr.contains("csv_to_index"), "stderr: {}", stderr);
    // Earlier stage output stays valid for a later re-run.
    assert_eq!(fs::read_to_string(env.clean()).unwrap(), EXPECTED_CLEAN);
}

#[test]
fn test_missing_source_fails() {
    let env = setup_test_env();
    fs::remove_file(env.root.join("data/source.csv")).unwrap();
    let (_, stderr, success) = run_etl(&env.config_path, &["load"]);
    assert!(!success);
    assert!(stderr.contains("source.csv"), "stderr: {}", stderr);
}

#[test]
fn test_status_reports_counts() {
    let env = setup_test_env();
    run_etl(&env.config_path, &["run", "--to", "clean"]);
    let (stdout, stderr, success) = run_etl(&env.config_path, &["status"]);
    assert!(success, "status failed: {}", stderr);

    let count_of = |artifact: &str| -> String {
        stdout
            .lines()
            .find(|l| l.trim_start().starts_with(artifact))
            .and_then(|l| l.split_whitespace().last().map(str::to_string))
            .unwrap_or_default()
    };
    assert_eq!(count_of("source"), "5");
    assert_eq!(count_of("table"), "5");
    assert_eq!(count_of("raw snapshot"), "5");
    assert_eq!(count_of("clean snapshot"), "3");
    assert!(stdout.contains("unreachable"));
}

#[test]
fn test_status_before_any_run() {
    let env = setup_test_env();
    let (stdout, _, success) = run_etl(&env.config_path, &["status"]);
    assert!(success);
    assert!(stdout.contains("missing"));
}

#[test]
fn test_invalid_config_fails() {
    let env = setup_test_env();
    let content = fs::read_to_string(&env.config_path)
        .unwrap()
        .replace("http://127.0.0.1:1", "127.0.0.1:1");
    fs::write(&env.config_path, content).unwrap();
    let (_, stderr, success) = run_etl(&env.config_path, &["plan"]);
    assert!(!success);
    assert!(stderr.contains("index.url"), "stderr: {}", stderr);
}
