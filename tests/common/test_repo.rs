//! TestRepo builder for throwaway projects

use std::fs;
use std::path::Path;
use tempfile::TempDir;

pub struct TestRepo {
    dir: TempDir,
}

impl TestRepo {
    /// Create a new empty test repository
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    /// Get the path to the test repository root
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Add or overwrite a file
    pub fn add_file(&self, relative_path: &str, content: &str) -> &Self {
        let full_path = self.dir.path().join(relative_path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent dirs");
        }
        fs::write(&full_path, content).expect("Failed to write file");
        self
    }

    pub fn remove_file(&self, relative_path: &str) -> &Self {
        fs::remove_file(self.dir.path().join(relative_path)).expect("Failed to remove file");
        self
    }

    pub fn read_output(&self, name: &str) -> String {
        fs::read_to_string(self.dir.path().join(".ontoindex").join(name)).expect("Failed to read output")
    }

    // ========================================================================
    // Pre-configured repos
    // ========================================================================

    /// `src/config.ts` exporting `loadConfig`, imported by three modules
    pub fn with_shared_config() -> Self {
        let repo = Self::new();
        repo.add_file(
            "src/config.ts",
            r#"/** Reads settings from disk */
export function loadConfig(path: string): Config {
  return { path };
}

export interface Config {
  path: string;
}
"#,
        );
        for name in ["server", "worker", "cli"] {
            repo.add_file(
                &format!("src/{}.ts", name),
                &format!(
                    "import {{ loadConfig }} from './config';\n\nexport function start{}() {{\n  return loadConfig('app.json');\n}}\n",
                    name
                ),
            );
        }
        repo
    }

    /// `count` small modules under `src/`, named `mod0.ts` upwards
    pub fn with_modules(count: usize) -> Self {
        let repo = Self::new();
        for i in 0..count {
            repo.add_file(
                &format!("src/mod{}.ts", i),
                &format!("export function handler{}(input: string): string {{\n  return input;\n}}\n", i),
            );
        }
        repo
    }

    /// Rewrite `mod<i>.ts` for the first `count` modules
    pub fn touch_modules(&self, count: usize) {
        for i in 0..count {
            self.add_file(
                &format!("src/mod{}.ts", i),
                &format!(
                    "export function handler{}(input: string, flag: boolean): string {{\n  return flag ? input : '';\n}}\n",
                    i
                ),
            );
        }
    }
}

impl Default for TestRepo {
    fn default() -> Self {
        Self::new()
    }
}
