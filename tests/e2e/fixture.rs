//! E2E test fixture with step logging and checkpointing.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};

use tempfile::TempDir;

/// Checkpoint snapshot for test debugging.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    pub name: String,
    pub timestamp: Duration,
    pub step_count: usize,
    pub entries: Vec<PathBuf>,
}

/// Step result for report generation.
#[derive(Debug, Clone)]
pub struct StepResult {
    pub name: String,
    pub success: bool,
    pub duration: Duration,
    pub output_summary: String,
}

/// Isolated HOME with a managed tree, a config file, and scratch space for sources and targets.
pub struct E2EFixture {
    pub scenario_name: String,
    pub temp_dir: TempDir,
    /// Fake HOME and working directory.
    pub root: PathBuf,
    /// Managed skill tree.
    pub managed: PathBuf,
    pub config_path: PathBuf,
    start_time: Instant,
    step_count: usize,
    checkpoints: Vec<Checkpoint>,
    step_results: Vec<StepResult>,
}

impl E2EFixture {
    pub fn new(scenario_name: &str) -> Self {
        let start_time = Instant::now();
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let root = temp_dir.path().to_path_buf();
        let managed = root.join("managed");
        let config_path = root.join("skillsync.toml");

        println!();
        println!("{}", "█".repeat(70));
        println!("█ E2E SCENARIO: {scenario_name}");
        println!("{}", "█".repeat(70));
        println!("[E2E] Root: {}", root.display());
        println!("[E2E] Managed: {}", managed.display());

        let fixture = Self {
            scenario_name: scenario_name.to_string(),
            temp_dir,
            root,
            managed,
            config_path,
            start_time,
            step_count: 0,
            checkpoints: Vec::new(),
            step_results: Vec::new(),
        };
        fixture.write_config(&[]);
        fixture
    }

    /// Rewrite the config with the given `(name, path, mode, extra)` targets.
    pub fn write_config(&self, targets: &[(&str, &Path, &str, &str)]) {
        let mut body = format!("[source]\npath = \"{}\"\n", self.managed.display());
        for (name, path, mode, extra) in targets {
            body.push_str(&format!(
                "\n[targets.{name}]\npath = \"{}\"\nmode = \"{mode}\"\n{extra}",
                path.display()
            ));
        }
        fs::write(&self.config_path, &body).expect("Failed to write config");
        println!("[CONFIG]\n{body}");
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    /// Create `<base>/<rel>/SKILL.md` named after the last path segment.
    pub fn create_skill(&self, base: &Path, rel: &str) -> PathBuf {
        let dir = base.join(rel);
        fs::create_dir_all(&dir).expect("Failed to create skill dir");
        let name = rel.rsplit('/').next().unwrap_or(rel);
        fs::write(
            dir.join("SKILL.md"),
            format!("---\nname: {name}\ndescription: e2e skill\n---\n\n# {name}\n"),
        )
        .expect("Failed to write skill");
        println!("[SKILL] Created {}", dir.display());
        dir
    }

    pub fn log_step(&mut self, description: &str) {
        self.step_count += 1;
        println!();
        println!("┌{}", "─".repeat(68));
        println!("│ STEP {}: {description}", self.step_count);
        println!("│ Time: {:?}", self.start_time.elapsed());
        println!("└{}", "─".repeat(68));
    }

    pub fn checkpoint(&mut self, name: &str) {
        let entries: Vec<PathBuf> = walkdir::WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_map(Result::ok)
            .map(|e| e.path().to_path_buf())
            .collect();
        println!("[CHECKPOINT] {name} ({} entries)", entries.len());
        self.checkpoints.push(Checkpoint {
            name: name.to_string(),
            timestamp: self.start_time.elapsed(),
            step_count: self.step_count,
            entries,
        });
    }

    /// Run the binary against this fixture's HOME and config.
    pub fn run(&mut self, args: &[&str]) -> CommandOutput {
        let step_name = format!("skillsync {}", args.join(" "));
        let start = Instant::now();
        println!("[CMD] {step_name}");

        let output = Command::new(env!("CARGO_BIN_EXE_skillsync"))
            .arg("--config")
            .arg(&self.config_path)
            .args(args)
            .env("HOME", &self.root)
            .env("XDG_CONFIG_HOME", self.root.join(".config"))
            .env_remove("SKILLSYNC_CONFIG")
            .env_remove("SKILLSYNC_SOURCE")
            .env_remove("SKILLSYNC_MODE")
            .env_remove("SKILLSYNC_ROBOT")
            .env_remove("SKILLSYNC_INSTALL_INTO")
            .current_dir(&self.root)
            .output()
            .expect("Failed to execute skillsync");

        let elapsed = start.elapsed();
        let result = CommandOutput {
            success: output.status.success(),
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            elapsed,
        };

        println!("[CMD] Exit: {} ({elapsed:?})", result.exit_code);
        if !result.stdout.is_empty() {
            println!("[STDOUT] {}", truncate(&result.stdout, 500));
        }
        if !result.stderr.is_empty() {
            println!("[STDERR] {}", result.stderr);
        }

        let output_summary = if result.success {
            format!("OK ({})", truncate(&result.stdout, 50))
        } else {
            format!("FAIL: {}", truncate(&result.stderr, 100))
        };
        self.step_results.push(StepResult {
            name: step_name,
            success: result.success,
            duration: elapsed,
            output_summary,
        });
        result
    }

    pub fn assert_success(&self, output: &CommandOutput, operation: &str) {
        assert!(
            output.success,
            "[E2E] {operation} failed with exit code {}: {}",
            output.exit_code, output.stderr
        );
        println!("[ASSERT] {operation} - SUCCESS");
    }

    pub fn assert_failure(&self, output: &CommandOutput, operation: &str) {
        assert!(!output.success, "[E2E] {operation} unexpectedly succeeded");
        println!("[ASSERT] {operation} - FAILED as expected");
    }

    pub fn assert_output_contains(&self, output: &CommandOutput, expected: &str) {
        let found = output.stdout.contains(expected) || output.stderr.contains(expected);
        assert!(
            found,
            "[E2E] Output does not contain '{expected}'\nStdout: {}\nStderr: {}",
            truncate(&output.stdout, 500),
            truncate(&output.stderr, 500)
        );
        println!("[ASSERT] Output contains '{expected}' - PASSED");
    }

    pub fn generate_report(&self) {
        println!();
        println!("{}", "█".repeat(70));
        println!("█ E2E REPORT: {}", self.scenario_name);
        println!("{}", "█".repeat(70));
        println!("Total Steps: {}", self.step_count);
        println!("Checkpoints: {}", self.checkpoints.len());
        println!("Total Time:  {:?}", self.start_time.elapsed());
        for (i, step) in self.step_results.iter().enumerate() {
            let status = if step.success { "✓" } else { "✗" };
            println!("{:2}. {status} {} ({:?})", i + 1, step.name, step.duration);
            if !step.success {
                println!("     └─ {}", step.output_summary);
            }
        }
        for checkpoint in &self.checkpoints {
            println!(
                "  [{:?}] {} (step {}, {} entries)",
                checkpoint.timestamp,
                checkpoint.name,
                checkpoint.step_count,
                checkpoint.entries.len()
            );
        }
    }
}

impl Drop for E2EFixture {
    fn drop(&mut self) {
        println!("█ E2E CLEANUP: {} ({:?})", self.scenario_name, self.start_time.elapsed());
        println!("█ Temp dir: {}", self.temp_dir.path().display());
    }
}

pub struct CommandOutput {
    pub success: bool,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl CommandOutput {
    /// Parse stdout as JSON.
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.stdout).expect("stdout should be valid JSON")
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let trimmed: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{trimmed}...")
    }
}

pub fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok_and(|m| m.file_type().is_symlink())
}
