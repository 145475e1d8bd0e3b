//! Loading directories of PHP files into a `FileSet`.

use std::fs;
use std::path::Path;

use phpscope::{
    DeclarationKinds, FileSet, LoaderOptions, ReflectionError, ReflectionFile, ReflectionFlags,
    WorkspaceLoader,
};

fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

#[test]
fn test_open_reads_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "Model.php", "<?php namespace App; final class Model {}");

    let path = dir.path().join("Model.php");
    let file = ReflectionFile::open(&path, ReflectionFlags::LOADED).unwrap();
    assert_eq!(file.path(), Some(path.as_path()));

    let handle = file.class("App\\Model").unwrap().into_handle().unwrap();
    assert!(handle.is_final());
    assert_eq!(handle.namespace(), Some("App"));
}

#[test]
fn test_open_missing_file_fails_at_construction() {
    let dir = tempfile::tempdir().unwrap();
    let err = ReflectionFile::open(dir.path().join("absent.php"), ReflectionFlags::empty())
        .unwrap_err();
    assert!(matches!(err, ReflectionError::Io { .. }));
    assert!(err.to_string().contains("absent.php"));
}

#[test]
fn test_load_directory_and_locate() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "src/Model/User.php", "<?php namespace App\\Model; class User {}");
    write(dir.path(), "src/helpers.php", "<?php namespace App; function helper() {}");
    write(dir.path(), "src/Contracts.php", "<?php namespace App; interface Entity {}");
    write(dir.path(), "README.md", "# not php");

    let files = FileSet::new();
    let loaded = WorkspaceLoader::new()
        .load_directory(dir.path(), &files)
        .unwrap();
    assert_eq!(loaded, 3);
    assert_eq!(files.len(), 3);

    let user = files
        .locate("App\\Model\\User", DeclarationKinds::CLASS_LIKE)
        .unwrap();
    assert!(files.path(user).unwrap().ends_with("src/Model/User.php"));

    let helpers = files.locate("\\App\\helper", DeclarationKinds::FUNCTION).unwrap();
    assert!(files.path(helpers).unwrap().ends_with("src/helpers.php"));

    assert!(files.locate("App\\Entity", DeclarationKinds::CLASS).is_none());
    assert!(files.locate("App\\Entity", DeclarationKinds::INTERFACE).is_some());
}

#[test]
fn test_failures_are_aggregated() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "good.php", "<?php class Good {}");
    write(dir.path(), "bad_one.php", "<?php const ONE;");
    write(dir.path(), "bad_two.php", "<?php const TWO 2;");

    let files = FileSet::new();
    let err = WorkspaceLoader::new()
        .load_directory(dir.path(), &files)
        .unwrap_err();

    match err {
        ReflectionError::Load { count, ref details } => {
            assert_eq!(count, 2);
            assert!(details.contains("bad_one.php"));
            assert!(details.contains("bad_two.php"));
        }
        other => panic!("expected a load error, got {other:?}"),
    }
    // the good file is still registered
    assert!(files.locate("Good", DeclarationKinds::CLASS).is_some());
}

#[test]
fn test_loader_options() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "legacy.inc", "<?php const LIMIT = 2 * 5;");
    write(dir.path(), "ignored.php", "<?php class Ignored {}");

    let loader = WorkspaceLoader::with_options(LoaderOptions {
        extensions: vec!["inc".to_owned()],
        flags: ReflectionFlags::SAFE,
    });
    let files = FileSet::new();
    assert_eq!(loader.load_directory(dir.path(), &files).unwrap(), 1);

    let id = files.locate("LIMIT", DeclarationKinds::CONSTANT).unwrap();
    let file = files.get(id).unwrap();
    let limit = file.constant("LIMIT").unwrap();
    assert_eq!(limit.value.as_value(), Some(&phpscope::Value::Int(10)));
}
