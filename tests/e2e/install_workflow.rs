//! E2E Scenario: Install Workflow
//!
//! Covers installing from a local bundle into the managed tree:
//! - Multi-skill discovery with selection and exclusion
//! - Subgroup placement with `--into`
//! - Refusing to overwrite without `--force`
//! - Reinstalling from recorded provenance with `update`

use std::fs;

use super::fixture::E2EFixture;

#[test]
fn test_install_select_exclude_and_into() {
    let mut fixture = E2EFixture::new("install_select_exclude_into");
    let bundle = fixture.path("bundle");
    fixture.create_skill(&bundle, "alpha");
    fixture.create_skill(&bundle, "beta");
    fixture.create_skill(&bundle, "test-gamma");
    let bundle_arg = bundle.display().to_string();

    // ==========================================
    // Step 1: Exclude by glob
    // ==========================================
    fixture.log_step("Install with exclusion");
    let output = fixture.run(&["--robot", "install", &bundle_arg, "--exclude", "test-*"]);
    fixture.assert_success(&output, "install --exclude");
    let json = output.json();
    assert_eq!(json["data"]["installed"].as_array().unwrap().len(), 2);
    assert_eq!(json["data"]["excluded"][0], "test-gamma");
    assert!(fixture.managed.join("alpha/SKILL.md").is_file());
    assert!(!fixture.managed.join("test-gamma").exists());
    fixture.checkpoint("post_exclude");

    // ==========================================
    // Step 2: Select one skill into a subgroup
    // ==========================================
    fixture.log_step("Install selected skill into subgroup");
    let output = fixture.run(&[
        "--robot",
        "install",
        &bundle_arg,
        "--skill",
        "test-gamma",
        "--into",
        "team/qa",
    ]);
    fixture.assert_success(&output, "install --skill --into");
    assert!(fixture.managed.join("team/qa/test-gamma/SKILL.md").is_file());

    fixture.log_step("List flattens the subgroup path");
    let output = fixture.run(&["--robot", "list"]);
    fixture.assert_success(&output, "list");
    let flat: Vec<String> = output.json()["data"]["skills"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["flat_name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(flat, vec!["alpha", "beta", "team__qa__test-gamma"]);

    fixture.generate_report();
}

#[test]
fn test_install_conflict_force_and_update() {
    let mut fixture = E2EFixture::new("install_conflict_force_update");
    let bundle = fixture.path("bundle");
    let alpha = fixture.create_skill(&bundle, "alpha");
    fixture.create_skill(&bundle, "beta");
    let bundle_arg = bundle.display().to_string();

    fixture.log_step("Initial install");
    let output = fixture.run(&["install", &bundle_arg]);
    fixture.assert_success(&output, "install");

    // ==========================================
    // Step 1: Reinstall without force is refused
    // ==========================================
    fixture.log_step("Reinstall without --force");
    let output = fixture.run(&["--robot", "install", &bundle_arg]);
    fixture.assert_failure(&output, "install over existing");
    let json = output.json();
    assert_eq!(json["status"]["partial"]["failed"], 2);
    assert_eq!(json["data"]["failures"].as_array().unwrap().len(), 2);

    // ==========================================
    // Step 2: Force overwrites
    // ==========================================
    fixture.log_step("Reinstall with --force");
    fs::write(alpha.join("extra.md"), "forced").unwrap();
    let output = fixture.run(&["install", &bundle_arg, "--force"]);
    fixture.assert_success(&output, "install --force");
    assert!(fixture.managed.join("alpha/extra.md").is_file());

    // ==========================================
    // Step 3: Update from provenance
    // ==========================================
    fixture.log_step("Update a skill from its recorded source");
    fs::write(alpha.join("extra.md"), "updated").unwrap();
    let output = fixture.run(&["--robot", "update", "alpha"]);
    fixture.assert_success(&output, "update alpha");
    assert_eq!(output.json()["data"]["updated"][0]["action"], "reinstalled");
    let content = fs::read_to_string(fixture.managed.join("alpha/extra.md")).unwrap();
    assert_eq!(content, "updated");

    fixture.log_step("Update a path with no provenance");
    fixture.create_skill(&fixture.managed.clone(), "handmade");
    let output = fixture.run(&["update", "handmade"]);
    fixture.assert_failure(&output, "update handmade");
    fixture.assert_output_contains(&output, "handmade");

    fixture.generate_report();
}

#[test]
fn test_install_dry_run_writes_nothing() {
    let mut fixture = E2EFixture::new("install_dry_run");
    let bundle = fixture.path("bundle");
    fixture.create_skill(&bundle, "alpha");

    let output = fixture.run(&["--robot", "install", &bundle.display().to_string(), "--dry-run"]);
    fixture.assert_success(&output, "install --dry-run");
    assert_eq!(output.json()["data"]["installed"][0]["action"], "would_install");
    assert!(!fixture.managed.join("alpha").exists());
}
