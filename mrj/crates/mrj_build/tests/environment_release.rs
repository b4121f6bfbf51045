use mrj_build::classfile::{ClassFileWriter, MemberSpec};
use mrj_build::classpath::{AnswerKind, ClasspathMultiDirectory, ModuleConstraint};
use mrj_build::{BuildSession, NameEnvironment, Release};
use std::fs;
use std::path::Path;
use std::sync::Arc;

fn write_type(folder: &Path, name: &str, method: &str) {
    ClassFileWriter::new(name)
        .method(MemberSpec::public(method, "()V"))
        .write_to(&folder.join(format!("{name}.class")))
        .unwrap();
}

fn first_method(answer: &mrj_build::classpath::Answer) -> String {
    answer.binary_type().expect("binary answer").methods[0].name.clone()
}

/// Baseline plus overlays for 9 and 11, all compiled into `bin`.
fn multi_release_environment(root: &Path) -> NameEnvironment {
    let bin = root.join("bin");
    write_type(&bin, "p/T", "base");
    write_type(&bin.join("META-INF/versions/9"), "p/T", "nine");
    write_type(&bin.join("META-INF/versions/11"), "p/T", "eleven");
    write_type(&bin, "p/Common", "common");

    let session = Arc::new(BuildSession::new());
    let mut environment = NameEnvironment::default();
    for release in [Some(11), None, Some(9)] {
        let source = match release {
            Some(release) => root.join(format!("src{release}")),
            None => root.join("src"),
        };
        environment.push(Box::new(ClasspathMultiDirectory::new(
            source,
            &bin,
            release,
            Arc::clone(&session),
        )));
    }
    environment
}

#[test]
fn never_answers_with_a_newer_release() {
    let dir = tempfile::tempdir().unwrap();
    let environment = multi_release_environment(dir.path());

    for requested in 6..=21u16 {
        let answer = environment
            .find_type_any(&["p", "T"], Release::Java(requested))
            .expect("type resolves at every release");
        if let Release::Java(answered) = answer.release {
            assert!(
                answered <= requested,
                "release {requested} answered with variant for {answered}"
            );
        }
        let expected = match requested {
            0..=8 => "base",
            9..=10 => "nine",
            _ => "eleven",
        };
        assert_eq!(first_method(&answer), expected, "requested {requested}");
    }
}

#[test]
fn unversioned_lookup_sees_only_the_baseline() {
    let dir = tempfile::tempdir().unwrap();
    let environment = multi_release_environment(dir.path());

    let answer = environment.find_type_unversioned(&["p", "T"]).unwrap();
    assert_eq!(answer.release, Release::Unversioned);
    assert_eq!(first_method(&answer), "base");
}

#[test]
fn types_without_overlays_resolve_identically_at_every_release() {
    let dir = tempfile::tempdir().unwrap();
    let environment = multi_release_environment(dir.path());

    let baseline = environment.find_type_unversioned(&["p", "Common"]).unwrap();
    for requested in [8, 9, 11, 17] {
        let answer = environment
            .find_type_any(&["p", "Common"], Release::Java(requested))
            .unwrap();
        assert_eq!(answer, baseline);
    }
    assert!(environment
        .find_type_any(&["p", "Missing"], Release::Java(17))
        .is_none());
}

#[test]
fn compiled_output_wins_over_source_of_the_same_package() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src");
    let bin = dir.path().join("bin");
    fs::create_dir_all(src.join("p")).unwrap();
    fs::write(src.join("p/T.java"), "package p; public class T {}").unwrap();
    fs::write(src.join("p/Fresh.java"), "package p; public class Fresh {}").unwrap();
    fs::create_dir_all(src.join("q")).unwrap();
    fs::write(src.join("q/U.java"), "package q; public class U {}").unwrap();
    write_type(&bin, "p/T", "compiled");

    let environment = NameEnvironment::new(vec![Box::new(ClasspathMultiDirectory::new(
        &src,
        &bin,
        None,
        Arc::default(),
    ))]);

    let compiled = environment.find_type_unversioned(&["p", "T"]).unwrap();
    assert!(!compiled.is_source());
    assert_eq!(first_method(&compiled), "compiled");

    // The binary listing of `p` hides sources that were not compiled yet.
    assert!(environment.find_type_unversioned(&["p", "Fresh"]).is_none());

    let source = environment.find_type_unversioned(&["q", "U"]).unwrap();
    match source.kind {
        AnswerKind::Source {
            path,
            main_type_name,
        } => {
            assert_eq!(path, src.join("q/U.java"));
            assert_eq!(main_type_name, "U");
        }
        other => panic!("expected a source answer, got {other:?}"),
    }
}

#[test]
fn module_constraint_filters_roots() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src");
    let bin = dir.path().join("bin");
    fs::create_dir_all(&src).unwrap();
    fs::write(src.join("module-info.java"), "module app.core { exports p; }").unwrap();
    write_type(&bin, "p/T", "base");

    let session = Arc::new(BuildSession::new());
    let location = ClasspathMultiDirectory::new(&src, &bin, None, Arc::clone(&session));
    let module = location
        .initialize_module_from_source()
        .expect("module declaration parses");
    let environment = NameEnvironment::new(vec![Box::new(location.with_module(module))]);

    let named = environment
        .find_type_in_module(&["p", "T"], ModuleConstraint::Named("app.core"))
        .unwrap();
    assert_eq!(named.module_name.as_deref(), Some("app.core"));
    assert!(environment
        .find_type_in_module(&["p", "T"], ModuleConstraint::Named("other"))
        .is_none());
    assert!(environment
        .find_type_in_module(&["p", "T"], ModuleConstraint::Unnamed)
        .is_none());
}
