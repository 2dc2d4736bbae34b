// Backup Tests
//
// Tests for snapshots, retention, restore integrity, safe writes and the
// include / exclude filter.

#[cfg(test)]
mod tests {
    use crate::backup::*;
    use crate::error::EngineError;
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        manager: BackupManager,
    }

    impl Fixture {
        fn new(max_backups: usize) -> Self {
            let dir = TempDir::new().unwrap();
            let manager = BackupManager::new(
                dir.path().join(".backups"),
                dir.path(),
                RetentionPolicy { max_backups },
            );
            Self { dir, manager }
        }

        fn file(&self, relative: &str, content: &str) -> PathBuf {
            let path = self.dir.path().join(relative);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, content).unwrap();
            path
        }
    }

    fn temp_files(dir: &Path) -> Vec<String> {
        fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(".tmp"))
            .collect()
    }

    mod create_tests {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn should_mirror_the_source_directory() {
            let fx = Fixture::new(10);
            let path = fx.file("src/components/a.tsx", "export const a = 1;\n");

            let info = fx.manager.create_backup(&path, "test").unwrap();

            let expected_dir = fx.dir.path().join(".backups/src/components");
            assert_eq!(info.backup_path.parent().unwrap(), expected_dir.as_path());
            let name = info.backup_path.file_name().unwrap().to_string_lossy().into_owned();
            assert_eq!(name, format!("a.tsx.{}.{}", info.timestamp, info.hash));
            assert_eq!(info.hash, content_hash(b"export const a = 1;\n"));
        }

        #[test]
        fn should_store_an_intact_record() {
            let fx = Fixture::new(10);
            let path = fx.file("a.js", "var a = 1;\n");

            let info = fx.manager.create_backup(&path, "layer 4").unwrap();
            let record = fx.manager.read_record(&info.backup_path).unwrap();

            assert!(record.is_intact());
            assert_eq!(record.content, "var a = 1;\n");
            assert_eq!(record.operation, "layer 4");
            assert_eq!(record.original_path, path);
        }

        #[test]
        fn should_fail_for_missing_source() {
            let fx = Fixture::new(10);
            let missing = fx.dir.path().join("missing.js");
            assert!(matches!(
                fx.manager.create_backup(&missing, "test"),
                Err(EngineError::Filesystem { .. })
            ));
        }
    }

    mod retention_tests {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn should_keep_newest_backups_only() {
            let fx = Fixture::new(3);
            let path = fx.file("demo.mod", "v0");
            let mut created = Vec::new();
            for version in 0..5 {
                fs::write(&path, format!("v{}", version)).unwrap();
                created.push(fx.manager.create_backup(&path, "test").unwrap());
            }

            let listed = fx.manager.list_backups(&path).unwrap();
            assert_eq!(listed.len(), 3);
            let newest: Vec<u64> = created.iter().rev().take(3).map(|b| b.timestamp).collect();
            let kept: Vec<u64> = listed.iter().map(|b| b.timestamp).collect();
            assert_eq!(kept, newest);
            assert!(!created[0].backup_path.exists());
        }

        #[test]
        fn should_not_prune_when_unbounded() {
            let fx = Fixture::new(0);
            let path = fx.file("a.js", "a");
            for _ in 0..4 {
                fx.manager.create_backup(&path, "test").unwrap();
            }
            assert_eq!(fx.manager.list_backups(&path).unwrap().len(), 4);
        }

        #[test]
        fn should_keep_files_with_shared_prefix_apart() {
            let fx = Fixture::new(1);
            let a = fx.file("a.js", "a");
            let ab = fx.file("a.js.bak", "ab");
            fx.manager.create_backup(&a, "test").unwrap();
            fx.manager.create_backup(&ab, "test").unwrap();
            fx.manager.create_backup(&a, "test").unwrap();

            assert_eq!(fx.manager.list_backups(&a).unwrap().len(), 1);
            assert_eq!(fx.manager.list_backups(&ab).unwrap().len(), 1);
        }

        #[test]
        fn should_list_nothing_without_backups() {
            let fx = Fixture::new(3);
            let path = fx.file("a.js", "a");
            assert!(fx.manager.list_backups(&path).unwrap().is_empty());
        }
    }

    mod restore_tests {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn should_restore_original_content() {
            let fx = Fixture::new(10);
            let path = fx.file("src/a.js", "before\n");
            let info = fx.manager.create_backup(&path, "test").unwrap();
            fs::write(&path, "after\n").unwrap();

            let restored = fx.manager.restore_from_backup(&info.backup_path, None).unwrap();

            assert_eq!(restored, path);
            assert_eq!(fs::read_to_string(&path).unwrap(), "before\n");
            assert!(temp_files(&fx.dir.path().join("src")).is_empty());
        }

        #[test]
        fn should_restore_to_another_target() {
            let fx = Fixture::new(10);
            let path = fx.file("a.js", "before\n");
            let info = fx.manager.create_backup(&path, "test").unwrap();
            let target = fx.dir.path().join("restored/a.js");

            fx.manager
                .restore_from_backup(&info.backup_path, Some(&target))
                .unwrap();

            assert_eq!(fs::read_to_string(&target).unwrap(), "before\n");
            assert_eq!(fs::read_to_string(&path).unwrap(), "before\n");
        }

        #[test]
        fn should_refuse_tampered_records() {
            let fx = Fixture::new(10);
            let path = fx.file("a.js", "before\n");
            let info = fx.manager.create_backup(&path, "test").unwrap();
            fs::write(&path, "current\n").unwrap();

            let raw = fs::read_to_string(&info.backup_path).unwrap();
            let mut record: serde_json::Value = serde_json::from_str(&raw).unwrap();
            record["content"] = serde_json::Value::String("tampered\n".to_string());
            fs::write(&info.backup_path, serde_json::to_string(&record).unwrap()).unwrap();

            let result = fx.manager.restore_from_backup(&info.backup_path, None);

            assert!(matches!(result, Err(EngineError::Integrity { .. })));
            assert_eq!(fs::read_to_string(&path).unwrap(), "current\n");
            assert!(temp_files(fx.dir.path()).is_empty());
        }

        #[test]
        fn should_leave_target_alone_until_commit() {
            let fx = Fixture::new(10);
            let path = fx.file("a.js", "before\n");
            let info = fx.manager.create_backup(&path, "test").unwrap();
            fs::write(&path, "current\n").unwrap();

            let staged = fx.manager.stage_restore(&info.backup_path, None).unwrap();
            assert!(staged.temp_path().exists());
            assert_eq!(fs::read_to_string(&path).unwrap(), "current\n");

            let temp = staged.temp_path().to_path_buf();
            drop(staged);
            assert!(!temp.exists());
            assert_eq!(fs::read_to_string(&path).unwrap(), "current\n");
        }
    }

    mod safe_write_tests {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn should_back_up_before_replacing() {
            let fx = Fixture::new(10);
            let path = fx.file("a.js", "old\n");

            let receipt = fx.manager.safe_write_file(&path, "new\n", "layer 1").unwrap();

            assert_eq!(fs::read_to_string(&path).unwrap(), "new\n");
            assert_eq!(receipt.bytes, 4);
            let backup = receipt.backup.unwrap();
            assert_eq!(fx.manager.read_record(&backup.backup_path).unwrap().content, "old\n");
            assert!(temp_files(fx.dir.path()).is_empty());
        }

        #[test]
        fn should_create_new_files_without_backup() {
            let fx = Fixture::new(10);
            let path = fx.dir.path().join("fresh/b.js");

            let receipt = fx.manager.safe_write_file(&path, "b\n", "test").unwrap();

            assert!(receipt.backup.is_none());
            assert_eq!(fs::read_to_string(&path).unwrap(), "b\n");
        }

        #[test]
        fn should_write_backup_to_alternate_location() {
            let fx = Fixture::new(10);
            let alternate = fx.dir.path().join("alt");
            let manager = BackupManager::new(
                fx.dir.path().join(".backups"),
                fx.dir.path(),
                RetentionPolicy::default(),
            )
            .with_alternate_root(&alternate);
            let path = fx.file("a.js", "old\n");

            let receipt = manager
                .safe_write_file_in(BackupLocation::Alternate, &path, "new\n", "test")
                .unwrap();

            let backup = receipt.backup.unwrap();
            assert!(backup.backup_path.starts_with(&alternate));
            assert_eq!(manager.list_backups(&path).unwrap().len(), 1);
        }
    }

    mod filter_tests {
        use super::*;
        use pretty_assertions::assert_eq;

        fn filter(include: &[&str], exclude: &[&str]) -> FileFilter {
            let include: Vec<String> = include.iter().map(|s| s.to_string()).collect();
            let exclude: Vec<String> = exclude.iter().map(|s| s.to_string()).collect();
            FileFilter::new("/project", &include, &exclude).unwrap()
        }

        #[test]
        fn should_exclude_directories_recursively() {
            let f = filter(&[], &["node_modules/**"]);
            assert!(!f.allows(Path::new("/project/node_modules/react/index.js")));
            assert!(f.allows(Path::new("/project/src/index.js")));
        }

        #[test]
        fn should_match_bare_names_anywhere() {
            let f = filter(&[], &["*.min.js"]);
            assert!(!f.allows(Path::new("/project/public/vendor/app.min.js")));
            assert!(f.allows(Path::new("/project/public/vendor/app.js")));
        }

        #[test]
        fn should_not_cross_separators_with_single_star() {
            let f = filter(&["src/*.ts"], &[]);
            assert!(f.allows(Path::new("src/a.ts")));
            assert!(!f.allows(Path::new("src/nested/a.ts")));
        }

        #[test]
        fn should_let_exclusion_win() {
            let f = filter(&["src/**"], &["src/generated/**"]);
            assert!(f.allows(Path::new("/project/src/a.tsx")));
            assert!(!f.allows(Path::new("/project/src/generated/a.tsx")));
            assert!(!f.allows(Path::new("/project/lib/a.tsx")));
        }

        #[test]
        fn should_reject_invalid_patterns() {
            let invalid = vec!["src/[".to_string()];
            assert!(matches!(
                FileFilter::new("/project", &[], &invalid),
                Err(EngineError::Config(_))
            ));
        }

        #[test]
        fn should_discover_allowed_files_in_order() {
            let dir = TempDir::new().unwrap();
            for name in ["src/b.js", "src/a.js", "node_modules/x/i.js"] {
                let path = dir.path().join(name);
                fs::create_dir_all(path.parent().unwrap()).unwrap();
                fs::write(&path, "").unwrap();
            }
            let f = FileFilter::new(dir.path(), &[], &["node_modules/**".to_string()]).unwrap();

            let found = f.discover(dir.path());

            assert_eq!(found, vec![dir.path().join("src/a.js"), dir.path().join("src/b.js")]);
        }
    }
}
