//! Test utilities and global setup
//!
//! Provides centralized test logging configuration and on-disk sample projects.

/// Test logging utilities
#[cfg(all(test, feature = "test-logging"))]
pub mod logging {
    use std::sync::Once;
    use tracing_subscriber::{EnvFilter, fmt};

    static INIT: Once = Once::new();

    /// Initialize test logging globally - safe to call multiple times
    ///
    /// Respects `RUST_LOG`, defaulting to debug for this crate and info for
    /// tokio. Output goes through the test writer so it is captured per test.
    ///
    /// # Examples
    ///
    /// ```bash
    /// # Run tests with default logging
    /// cargo test --features test-logging
    ///
    /// # Only the pipeline at trace level
    /// RUST_LOG=symindex::index::pipeline=trace cargo test --features test-logging
    /// ```
    pub fn init() {
        INIT.call_once(|| {
            let env_filter = EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("debug,tokio=info"));

            fmt()
                .with_env_filter(env_filter)
                .with_test_writer()
                .with_target(true)
                .with_thread_ids(true)
                .compact()
                .try_init()
                .ok();
        });
    }
}

/// Global test logging setup
///
/// Add this to any test module where you want automatic logging initialization.
#[cfg(all(test, feature = "test-logging"))]
#[macro_export]
macro_rules! setup_test_logging {
    () => {
        #[ctor::ctor]
        fn init_test_logging() {
            $crate::test_utils::logging::init();
        }
    };
}

/// Sample projects copied from `test/` into temporary directories
#[cfg(test)]
pub mod integration {
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;
    use walkdir::WalkDir;

    /// TypeScript project with one installed dependency under `node_modules`
    pub const SAMPLE_PROJECT: &str = "test/sample-project";

    /// A copy of a template project that is deleted on drop
    pub struct TestProject {
        _temp_dir: TempDir,
        pub project_root: PathBuf,
    }

    impl TestProject {
        pub fn new() -> Result<Self, std::io::Error> {
            Self::from_template(SAMPLE_PROJECT)
        }

        pub fn from_template(template_path: &str) -> Result<Self, std::io::Error> {
            let temp_dir = TempDir::new()?;
            let project_root = temp_dir.path().join("project");
            fs::create_dir_all(&project_root)?;
            copy_dir_recursively(template_path, &project_root)?;

            Ok(TestProject {
                _temp_dir: temp_dir,
                project_root,
            })
        }

        pub fn path(&self, relative: &str) -> PathBuf {
            self.project_root.join(relative)
        }

        /// Write a file relative to the root, creating parent directories
        pub fn write(&self, relative: &str, content: &str) -> Result<(), std::io::Error> {
            let path = self.path(relative);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, content)
        }

        pub fn remove(&self, relative: &str) -> Result<(), std::io::Error> {
            fs::remove_file(self.path(relative))
        }
    }

    /// Recursively copy directory contents
    fn copy_dir_recursively(src: &str, dst: &Path) -> Result<(), std::io::Error> {
        let src_path = Path::new(src);
        if !src_path.exists() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Source directory {} does not exist", src_path.display()),
            ));
        }

        for entry in WalkDir::new(src) {
            let entry = entry?;
            let src_path = entry.path();
            let rel_path = src_path.strip_prefix(src).unwrap();
            let dst_path = dst.join(rel_path);

            if entry.file_type().is_dir() {
                fs::create_dir_all(&dst_path)?;
            } else {
                fs::copy(src_path, &dst_path)?;
            }
        }
        Ok(())
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_sample_project_creation() {
            let project = TestProject::new().unwrap();

            assert!(project.path("package.json").exists());
            assert!(project.path("src/app.ts").exists());
            assert!(project.path("node_modules/neverthrow/package.json").exists());
        }

        #[test]
        fn test_write_creates_parents() {
            let project = TestProject::new().unwrap();
            project.write("src/nested/deep.ts", "export {};").unwrap();
            assert!(project.path("src/nested/deep.ts").exists());

            project.remove("src/nested/deep.ts").unwrap();
            assert!(!project.path("src/nested/deep.ts").exists());
        }

        #[test]
        fn test_missing_template() {
            assert!(TestProject::from_template("test/does-not-exist").is_err());
        }
    }
}
