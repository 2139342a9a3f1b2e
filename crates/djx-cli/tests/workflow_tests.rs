//! Multi-command flows through the djx binary.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

struct TestEnv {
    temp_dir: TempDir,
}

impl TestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temporary directory");
        std::fs::write(
            temp_dir.path().join("corpus.jsonl"),
            "{\"text\": \"<p>Hello   world</p>\"}\n{\"text\": \"second row\"}\n",
        )
        .expect("Failed to write dataset");
        Self { temp_dir }
    }

    fn path(&self, name: &str) -> String {
        self.temp_dir.path().join(name).display().to_string()
    }

    fn djx(&self) -> Command {
        let mut cmd = Command::cargo_bin("djx").expect("Failed to find djx binary");
        cmd.args(["--no-color", "--home", &self.path("home")]);
        cmd
    }

    /// Runs `djx plan` and returns the new plan id and its document path.
    fn plan(&self, intent: &str) -> (String, String) {
        let output_path = self.path("plan.yaml");
        let output = self
            .djx()
            .args([
                "plan",
                intent,
                "--dataset",
                &self.path("corpus.jsonl"),
                "--export",
                &self.path("out.jsonl"),
                "--output",
                &output_path,
            ])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        let stdout = String::from_utf8(output).expect("Invalid UTF-8");
        (extract_id(&stdout, "Saved plan "), output_path)
    }
}

/// The id following `prefix` on the first line that has it.
fn extract_id(stdout: &str, prefix: &str) -> String {
    stdout
        .lines()
        .find_map(|line| line.strip_prefix(prefix))
        .and_then(|rest| rest.split_whitespace().next())
        .map(String::from)
        .unwrap_or_else(|| panic!("No line starting with {prefix:?} in:\n{stdout}"))
}

#[test]
fn test_plan_apply_dry_run_and_trace() {
    let env = TestEnv::new();
    let (plan_id, plan_path) = env.plan("clean the rag corpus");
    assert!(plan_id.starts_with("plan_"));

    let output = env
        .djx()
        .args(["apply", "--plan", &plan_path, "--dry-run", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(success)"))
        .stdout(predicate::str::contains("--config"))
        .get_output()
        .stdout
        .clone();
    let stdout = String::from_utf8(output).unwrap();
    let run_id = extract_id(&stdout, "# ");
    assert!(run_id.starts_with("run_"));

    env.djx()
        .args(["trace", "--plan-id", &plan_id])
        .assert()
        .success()
        .stdout(predicate::str::contains(run_id.as_str()));

    env.djx()
        .args(["trace", &run_id])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("- Plan: {plan_id}")));

    env.djx()
        .args(["trace", "--stats"])
        .assert()
        .success()
        .stdout(predicate::str::contains("- Total runs: 1"))
        .stdout(predicate::str::contains("- Success rate: 100.0%"));

    env.djx()
        .arg("plans")
        .assert()
        .success()
        .stdout(predicate::str::contains(plan_id.as_str()));
}

#[test]
fn test_apply_asks_for_confirmation() {
    let env = TestEnv::new();
    let (_, plan_path) = env.plan("clean the rag corpus");

    env.djx()
        .args(["apply", "--plan", &plan_path, "--dry-run"])
        .write_stdin("n\n")
        .assert()
        .failure()
        .stdout(predicate::str::contains("Proceed? [y/N]"))
        .stderr(predicate::str::contains("Execution canceled"));

    env.djx()
        .args(["trace", "--stats"])
        .assert()
        .success()
        .stdout(predicate::str::contains("- Total runs: 0"));
}

#[test]
fn test_apply_rejects_edited_plan() {
    let env = TestEnv::new();
    let (_, plan_path) = env.plan("clean the rag corpus");
    let document = std::fs::read_to_string(&plan_path).unwrap();
    std::fs::write(
        &plan_path,
        document.replace("workflow: rag_cleaning", "workflow: teleport"),
    )
    .unwrap();

    env.djx()
        .args(["apply", "--plan", &plan_path, "--dry-run", "--yes"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("workflow must be one of"));
}

#[test]
fn test_revision_by_plan_id_shows_diff_and_lineage() {
    let env = TestEnv::new();
    let (root_id, _) = env.plan("clean the rag corpus");
    let revised_export = env.path("v2.jsonl");

    let output = env
        .djx()
        .args([
            "plan",
            "write somewhere else",
            "--base-plan",
            &root_id,
            "--export",
            &revised_export,
            "--output",
            &env.path("child.yaml"),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("(revision 2)"))
        .stdout(predicate::str::contains(format!("- Parent: {root_id}")))
        .stdout(predicate::str::contains(format!("## Diff from {root_id}")))
        .stdout(predicate::str::contains("export_path"))
        .get_output()
        .stdout
        .clone();
    let child_id = extract_id(&String::from_utf8(output).unwrap(), "Saved plan ");

    env.djx()
        .args(["trace", "--plan-id", &child_id, "--lineage"])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("# Lineage of {child_id}")))
        .stdout(predicate::str::contains(format!("## r1 {root_id}")))
        .stdout(predicate::str::contains(format!("## r2 {child_id}")));

    env.djx()
        .args(["plans", "--children-of", &root_id])
        .assert()
        .success()
        .stdout(predicate::str::contains(child_id.as_str()));
}

#[test]
fn test_revision_from_plan_file() {
    let env = TestEnv::new();
    let (root_id, root_path) = env.plan("clean the rag corpus");

    env.djx()
        .args(["plan", "tighten the filter", "--base-plan", &root_path])
        .assert()
        .success()
        .stdout(predicate::str::contains("(revision 2)"))
        .stdout(predicate::str::contains(format!("- Parent: {root_id}")));
}

#[test]
fn test_revision_imports_plan_file_missing_from_catalog() {
    let env = TestEnv::new();
    let (root_id, root_path) = env.plan("clean the rag corpus");
    std::fs::remove_file(env.temp_dir.path().join("home").join("catalog.db"))
        .expect("Failed to remove catalog");

    env.djx()
        .args(["plan", "tighten the filter", "--base-plan", &root_path])
        .assert()
        .success()
        .stdout(predicate::str::contains("(revision 2)"));

    env.djx()
        .args(["plans", "--roots"])
        .assert()
        .success()
        .stdout(predicate::str::contains(root_id));
}

#[test]
fn test_evaluate_writes_report_errors_and_history() {
    let env = TestEnv::new();
    let dataset = env.path("corpus.jsonl");
    let cases = env.path("cases.jsonl");
    std::fs::write(
        &cases,
        format!(
            concat!(
                "{{\"intent\": \"clean rag corpus\", \"dataset_path\": \"{ds}\", \"export_path\": \"{out}\", \"expected_workflow\": \"rag_cleaning\"}}\n",
                "{{\"intent\": \"dedup images\", \"dataset_path\": \"{ds}\", \"export_path\": \"{out}\", \"expected_workflow\": \"rag_cleaning\"}}\n",
                "{{\"intent\": \"clean rag corpus\"}}\n",
            ),
            ds = dataset,
            out = env.path("out.jsonl"),
        ),
    )
    .unwrap();
    let report = env.path("report.json");
    let errors = env.path("errors.json");
    let history = env.path("history.jsonl");

    env.djx()
        .args([
            "evaluate",
            "--cases",
            &cases,
            "--output",
            &report,
            "--errors-output",
            &errors,
            "--history-file",
            &history,
            "--jobs",
            "2",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("# Evaluation summary"))
        .stdout(predicate::str::contains("- Cases: 3 (execute: none, jobs: 2, retries: 0)"))
        .stdout(predicate::str::contains("- Plan valid: 2"));

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report).unwrap()).unwrap();
    assert_eq!(report["summary"]["total"], 3);
    assert_eq!(report["results"].as_array().unwrap().len(), 3);
    assert_eq!(report["results"][2]["status"], "planner_error");

    let errors: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&errors).unwrap()).unwrap();
    assert_eq!(errors["error_cases"].as_array().unwrap().len(), 2);

    let history = std::fs::read_to_string(&history).unwrap();
    assert_eq!(history.lines().count(), 1);
    let entry: serde_json::Value = serde_json::from_str(history.trim()).unwrap();
    assert_eq!(entry["options"]["jobs"], 2);
}

#[test]
fn test_evaluate_no_history() {
    let env = TestEnv::new();
    let cases = env.path("cases.jsonl");
    std::fs::write(
        &cases,
        format!(
            "{{\"intent\": \"clean rag corpus\", \"dataset_path\": \"{}\", \"export_path\": \"{}\"}}\n",
            env.path("corpus.jsonl"),
            env.path("out.jsonl"),
        ),
    )
    .unwrap();

    env.djx()
        .args(["evaluate", "--cases", &cases, "--no-history"])
        .assert()
        .success();

    let home = env.temp_dir.path().join("home");
    assert!(home.join("eval_report.json").is_file());
    assert!(home.join("eval_errors.json").is_file());
    assert!(!home.join("eval_history.jsonl").exists());
}

#[cfg(unix)]
#[test]
fn test_real_runs_succeed_and_fail_by_engine_exit() {
    let env = TestEnv::new();
    let (plan_id, plan_path) = env.plan("clean the rag corpus");

    env.djx()
        .args(["--engine", "sh -c true", "apply", "--plan", &plan_path, "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(success)"));

    env.djx()
        .args(["--engine", "false", "apply", "--plan", &plan_path, "--yes"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("(failed)"))
        .stdout(predicate::str::contains("## Next actions"));

    env.djx()
        .args(["trace", "--stats", "--plan-id", &plan_id])
        .assert()
        .success()
        .stdout(predicate::str::contains("- Total runs: 2"))
        .stdout(predicate::str::contains("- Failed: 1"));
}
