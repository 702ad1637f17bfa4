use std::path::{Path, PathBuf};

use git2::{Repository, Signature};
use tempfile::TempDir;

/// Test fixture providing isolated filesystem environment.
pub struct UnitTestFixture {
    pub temp_dir: TempDir,
    pub data_path: PathBuf,
}

impl UnitTestFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let data_path = temp_dir.path().to_path_buf();

        println!("[FIXTURE] Created temp directory: {:?}", data_path);

        Self { temp_dir, data_path }
    }

    /// Absolute path of `relative_path` inside the fixture.
    pub fn path(&self, relative_path: &str) -> PathBuf {
        self.data_path.join(relative_path)
    }

    /// Create a test file with content.
    pub fn create_file(&self, relative_path: &str, content: &str) -> PathBuf {
        let full_path = self.data_path.join(relative_path);
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent dirs");
        }
        std::fs::write(&full_path, content).expect("Failed to write file");
        println!(
            "[FIXTURE] Created file: {:?} ({} bytes)",
            full_path,
            content.len()
        );
        full_path
    }

    /// Create a skill directory at `relative_dir` holding a SKILL.md.
    pub fn create_skill(&self, relative_dir: &str) -> PathBuf {
        let name = relative_dir.rsplit('/').next().unwrap_or(relative_dir);
        let dir = if relative_dir.is_empty() || relative_dir == "." {
            self.data_path.clone()
        } else {
            self.data_path.join(relative_dir)
        };
        std::fs::create_dir_all(&dir).expect("Failed to create skill dir");
        std::fs::write(dir.join("SKILL.md"), skill_md(name, None)).expect("Failed to write SKILL.md");
        println!("[FIXTURE] Created skill: {:?}", dir);
        dir
    }

    /// Create a skill whose front matter declares `license`.
    pub fn create_licensed_skill(&self, relative_dir: &str, license: &str) -> PathBuf {
        let dir = self.create_skill(relative_dir);
        let name = relative_dir.rsplit('/').next().unwrap_or(relative_dir);
        std::fs::write(dir.join("SKILL.md"), skill_md(name, Some(license)))
            .expect("Failed to write SKILL.md");
        dir
    }
}

impl Default for UnitTestFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for UnitTestFixture {
    fn drop(&mut self) {
        println!("[FIXTURE] Cleaning up temp directory: {:?}", self.data_path);
    }
}

/// Minimal SKILL.md document.
pub fn skill_md(name: &str, license: Option<&str>) -> String {
    let mut doc = format!("---\nname: {name}\ndescription: Test skill {name}\n");
    if let Some(license) = license {
        doc.push_str(&format!("license: {license}\n"));
    }
    doc.push_str(&format!("---\n\n# {name}\n"));
    doc
}

/// Initialise a git repository at `path`, commit `files`, and return the commit id.
pub fn init_git_repo(path: &Path, files: &[(&str, &str)]) -> String {
    std::fs::create_dir_all(path).expect("Failed to create repo dir");
    Repository::init(path).expect("Failed to init repo");
    println!("[FIXTURE] Initialised git repository: {:?}", path);
    commit_files(path, files)
}

/// Write `files` into the working copy at `path` and commit them on HEAD.
pub fn commit_files(path: &Path, files: &[(&str, &str)]) -> String {
    let repo = Repository::open(path).expect("Failed to open repo");
    for (rel, content) in files {
        let full = path.join(rel);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent dirs");
        }
        std::fs::write(&full, content).expect("Failed to write file");
    }

    let mut index = repo.index().expect("Failed to open index");
    index
        .add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)
        .expect("Failed to stage files");
    index.write().expect("Failed to write index");
    let tree_id = index.write_tree().expect("Failed to write tree");
    let tree = repo.find_tree(tree_id).expect("Failed to find tree");
    let sig = Signature::now("Fixture", "fixture@example.com").expect("Failed to build signature");

    let parent = repo
        .head()
        .ok()
        .and_then(|head| head.target())
        .and_then(|oid| repo.find_commit(oid).ok());
    let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();

    let oid = repo
        .commit(Some("HEAD"), &sig, &sig, "fixture commit", &tree, &parents)
        .expect("Failed to commit");
    println!("[FIXTURE] Committed {} file(s): {oid}", files.len());
    oid.to_string()
}
