//! Tests for workspace module.

#[cfg(test)]
mod tests {
    use crate::workspace::{
        enumerate_files, load_sources, relative_path, strip_markers, ScanOptions, SourceFile,
    };
    use std::fs::{self, File};
    use std::io::Write;
    use std::path::Path;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut f = File::create(path).unwrap();
        write!(f, "{}", content).unwrap();
    }

    fn rel_names(root: &Path, options: &ScanOptions) -> Vec<String> {
        enumerate_files(root, options)
            .unwrap()
            .iter()
            .map(|p| relative_path(p, root).unwrap())
            .collect()
    }

    #[test]
    fn test_enumerate_skips_structured_documents() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "b.py", "x = 1");
        write(temp_dir.path(), "a.py", "y = 2");
        write(temp_dir.path(), "pkg/c.py", "z = 3");
        write(temp_dir.path(), "pkg/old.json", "{}");
        write(temp_dir.path(), "notes.md", "# notes");

        let names = rel_names(temp_dir.path(), &ScanOptions::default());
        assert_eq!(names, vec!["a.py", "b.py", "notes.md", "pkg/c.py"]);
    }

    #[test]
    fn test_enumerate_excludes_nested_output() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "main.py", "print(1)");
        write(temp_dir.path(), "out/main.md", "old output");

        let options = ScanOptions {
            respect_ignore: false,
            exclude: Some(temp_dir.path().join("out")),
        };
        assert_eq!(rel_names(temp_dir.path(), &options), vec!["main.py"]);
    }

    #[test]
    fn test_enumerate_respects_gitignore() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), ".gitignore", "*.log\nbuild/\n");
        write(temp_dir.path(), "app.py", "import os");
        write(temp_dir.path(), "debug.log", "noise");
        write(temp_dir.path(), "build/gen.py", "x = 1");

        let all = rel_names(temp_dir.path(), &ScanOptions::default());
        assert!(all.contains(&"debug.log".to_string()));
        assert!(all.contains(&"build/gen.py".to_string()));

        let options = ScanOptions {
            respect_ignore: true,
            exclude: None,
        };
        assert_eq!(rel_names(temp_dir.path(), &options), vec!["app.py"]);
    }

    #[test]
    fn test_load_sources_skips_binary_and_large_files() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "ok.py", "import os\n");
        write(temp_dir.path(), "big.py", &"x".repeat(64));
        fs::write(temp_dir.path().join("blob.bin"), [0xff, 0xfe, 0x00, 0x80]).unwrap();

        let paths = enumerate_files(temp_dir.path(), &ScanOptions::default()).unwrap();
        let sources = load_sources(&paths, temp_dir.path(), 32).unwrap();

        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].relative_path, "ok.py");
        assert_eq!(sources[0].content, "import os\n");
    }

    #[test]
    fn test_source_subject_has_header() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "pkg/mod.py", "import os");
        let source = SourceFile::load(&temp_dir.path().join("pkg/mod.py"), "pkg/mod.py", 1024)
            .unwrap()
            .unwrap();
        assert_eq!(source.subject(), "# python file pkg/mod.py\n\nimport os");
    }

    #[test]
    fn test_load_skips_oversized_file() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "big.py", "0123456789");
        let path = temp_dir.path().join("big.py");
        assert!(SourceFile::load(&path, "big.py", 9).unwrap().is_none());
        assert!(SourceFile::load(&path, "big.py", 10).unwrap().is_some());
    }

    #[test]
    fn test_read_missing_file_is_error() {
        let temp_dir = TempDir::new().unwrap();
        assert!(SourceFile::load(&temp_dir.path().join("nope.py"), "nope.py", 1024).is_err());
    }

    #[test]
    fn test_strip_markers() {
        let temp_dir = TempDir::new().unwrap();
        let dirty = "\n\n### Summary\n\n<|im_end|>\nText<|im_end|> more\n";
        let clean = "# untouched\n";
        write(temp_dir.path(), "a.md", dirty);
        write(temp_dir.path(), "sub/b.md", clean);
        write(temp_dir.path(), "c.json", "\"<|im_end|>\"");

        let report = strip_markers(temp_dir.path(), "<|im_end|>", "md").unwrap();
        assert_eq!(report.files_scanned, 2);
        assert_eq!(report.files_changed, 1);
        assert_eq!(report.markers_removed, 2);

        let after = fs::read_to_string(temp_dir.path().join("a.md")).unwrap();
        assert_eq!(after, dirty.replace("<|im_end|>", ""));
        assert!(!after.contains("<|im_end|>"));
        assert_eq!(fs::read_to_string(temp_dir.path().join("sub/b.md")).unwrap(), clean);
        // Other extensions are left alone.
        assert_eq!(
            fs::read_to_string(temp_dir.path().join("c.json")).unwrap(),
            "\"<|im_end|>\""
        );
    }

    #[test]
    fn test_strip_markers_rejects_empty_marker() {
        let temp_dir = TempDir::new().unwrap();
        assert!(strip_markers(temp_dir.path(), "", "md").is_err());
    }
}
