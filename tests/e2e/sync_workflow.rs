//! E2E Scenario: Sync Workflow
//!
//! Mirrors the managed tree into agent directories:
//! - Merge mode links, preserves local entries, prunes stale links
//! - Copy mode tracks a manifest and refreshes changed content
//! - Converting copy to merge needs `--force`
//! - Symlink mode and status reporting
//! - Dry run leaves the filesystem alone

use std::fs;

use super::fixture::{E2EFixture, is_symlink};

#[test]
fn test_merge_lifecycle() {
    let mut fixture = E2EFixture::new("merge_lifecycle");
    let managed = fixture.managed.clone();
    fixture.create_skill(&managed, "lint");
    fixture.create_skill(&managed, "team/pdf");
    let target = fixture.path("agent/skills");
    fixture.write_config(&[("agent", target.as_path(), "merge", "")]);

    // ==========================================
    // Step 1: First sync links every skill
    // ==========================================
    fixture.log_step("Initial merge sync");
    let output = fixture.run(&["--robot", "sync"]);
    fixture.assert_success(&output, "sync");
    let report = &output.json()["data"]["reports"][0];
    assert_eq!(report["linked"].as_array().unwrap().len(), 2);
    assert!(is_symlink(&target.join("lint")));
    assert!(is_symlink(&target.join("team__pdf")));
    fixture.checkpoint("post_first_sync");

    // ==========================================
    // Step 2: Local entries survive, removed skills are pruned
    // ==========================================
    fixture.log_step("Add a local skill and remove a managed one");
    fixture.create_skill(&target, "local-only");
    fs::remove_dir_all(managed.join("team")).unwrap();
    let output = fixture.run(&["--robot", "sync", "agent"]);
    fixture.assert_success(&output, "sync after removal");
    let report = &output.json()["data"]["reports"][0];
    assert_eq!(report["pruned"][0], "team__pdf");
    assert!(!target.join("team__pdf").exists());
    assert!(target.join("local-only/SKILL.md").is_file());

    // ==========================================
    // Step 3: Idempotent
    // ==========================================
    fixture.log_step("Re-sync is a no-op");
    let output = fixture.run(&["--robot", "sync"]);
    fixture.assert_success(&output, "idempotent sync");
    let report = &output.json()["data"]["reports"][0];
    assert!(report["linked"].as_array().unwrap().is_empty());
    assert!(report["pruned"].as_array().unwrap().is_empty());

    fixture.log_step("Status counts linked and local entries");
    let output = fixture.run(&["--robot", "status"]);
    fixture.assert_success(&output, "status");
    let status = &output.json()["data"]["targets"][0];
    assert_eq!(status["state"], "merged");
    assert_eq!(status["linked"], 1);
    assert_eq!(status["local"], 1);

    fixture.generate_report();
}

#[test]
fn test_copy_then_convert_to_merge() {
    let mut fixture = E2EFixture::new("copy_then_merge");
    let managed = fixture.managed.clone();
    let lint = fixture.create_skill(&managed, "lint");
    let target = fixture.path("agent");
    fixture.write_config(&[("agent", target.as_path(), "copy", "")]);

    fixture.log_step("Copy sync");
    let output = fixture.run(&["--robot", "sync"]);
    fixture.assert_success(&output, "copy sync");
    assert!(target.join("lint/SKILL.md").is_file());
    assert!(!is_symlink(&target.join("lint")));
    assert!(target.join(".skillsync-manifest.json").is_file());

    fixture.log_step("Changed content is refreshed");
    fs::write(lint.join("notes.md"), "v2").unwrap();
    let output = fixture.run(&["--robot", "sync"]);
    fixture.assert_success(&output, "copy resync");
    assert_eq!(output.json()["data"]["reports"][0]["updated"][0], "lint");
    assert!(target.join("lint/notes.md").is_file());

    // ==========================================
    // Switch the target to merge mode
    // ==========================================
    fixture.write_config(&[("agent", target.as_path(), "merge", "")]);
    fixture.log_step("Merge over copies without --force");
    let output = fixture.run(&["--robot", "sync"]);
    fixture.assert_failure(&output, "merge over copies");
    assert_eq!(output.json()["status"]["partial"]["failed"], 1);
    assert!(!is_symlink(&target.join("lint")));

    fixture.log_step("Merge over copies with --force");
    let output = fixture.run(&["--robot", "sync", "--force"]);
    fixture.assert_success(&output, "forced merge");
    assert_eq!(output.json()["data"]["reports"][0]["manifest_removed"], true);
    assert!(is_symlink(&target.join("lint")));
    assert!(!target.join(".skillsync-manifest.json").exists());

    fixture.generate_report();
}

#[test]
fn test_symlink_mode_and_filters() {
    let mut fixture = E2EFixture::new("symlink_and_filters");
    let managed = fixture.managed.clone();
    fixture.create_skill(&managed, "lint");
    fixture.create_skill(&managed, "team-a/pdf");
    fixture.create_skill(&managed, "team-b/pdf");
    let whole = fixture.path("whole");
    let filtered = fixture.path("filtered");
    fixture.write_config(&[
        ("whole", whole.as_path(), "symlink", ""),
        ("filtered", filtered.as_path(), "merge", "include = [\"team-a__*\"]\n"),
    ]);

    fixture.log_step("Dry run writes nothing");
    let output = fixture.run(&["--robot", "sync", "--dry-run"]);
    fixture.assert_success(&output, "dry run");
    assert!(!whole.exists());
    assert!(!filtered.exists());

    fixture.log_step("Sync both targets");
    let output = fixture.run(&["sync"]);
    fixture.assert_success(&output, "sync");
    assert!(is_symlink(&whole));
    assert!(whole.join("lint/SKILL.md").is_file());
    assert!(is_symlink(&filtered.join("team-a__pdf")));
    assert!(!filtered.join("team-b__pdf").exists());
    assert!(!filtered.join("lint").exists());

    fixture.log_step("Status reports the symlink and the shared name");
    let output = fixture.run(&["--robot", "status"]);
    fixture.assert_success(&output, "status");
    let json = output.json();
    let states: Vec<&str> = json["data"]["targets"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["state"].as_str().unwrap())
        .collect();
    assert!(states.contains(&"linked"));
    assert_eq!(json["data"]["coincidences"]["global"][0]["name"], "pdf");

    fixture.generate_report();
}
