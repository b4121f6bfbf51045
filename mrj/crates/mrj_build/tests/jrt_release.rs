use mrj_build::classfile::{ClassFileWriter, MemberSpec};
use mrj_build::classpath::{
    AccessRuleKind, AccessRuleSet, ClassQuery, ClasspathJrtWithRelease, ClasspathLocation,
    ModuleConstraint,
};
use mrj_build::module::ModuleDescriptor;
use mrj_build::{BuildError, BuildSession, Release};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::fs::{self, File};
use std::hash::{Hash, Hasher};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use zip::write::SimpleFileOptions;

fn class_bytes(name: &str, method: &str) -> Vec<u8> {
    ClassFileWriter::new(name)
        .method(MemberSpec::public(method, "()V"))
        .to_bytes()
}

fn module_bytes(name: &str) -> Vec<u8> {
    ClassFileWriter::module_info(&ModuleDescriptor::new(name)).to_bytes()
}

fn write_symbol_archive(root: &Path, entries: Vec<(&str, Vec<u8>)>) {
    let mut writer = zip::ZipWriter::new(File::create(root.join("lib/ct.sym")).unwrap());
    for (name, bytes) in entries {
        writer.start_file(name, SimpleFileOptions::default()).unwrap();
        writer.write_all(&bytes).unwrap();
    }
    writer.finish().unwrap();
}

/// `lib/jrt-fs.jar` plus an exploded runtime image holding `java.base`.
fn jdk_image(root: &Path) -> PathBuf {
    fs::create_dir_all(root.join("lib")).unwrap();
    let archive = root.join("lib/jrt-fs.jar");
    fs::write(&archive, b"").unwrap();

    let image = root.join("modules/java.base");
    fs::create_dir_all(image.join("java/lang")).unwrap();
    fs::write(
        image.join("java/lang/Object.class"),
        class_bytes("java/lang/Object", "live"),
    )
    .unwrap();
    fs::write(image.join("module-info.class"), module_bytes("java.base")).unwrap();
    archive
}

/// A JDK home with a per-module `lib/ct.sym` knowing releases 8, 9 and 11,
/// with 17 marked as served from the running image.
fn fake_jdk(root: &Path) -> PathBuf {
    let archive = jdk_image(root);
    write_symbol_archive(
        root,
        vec![
            ("89B/java.base/java/lang/Object.sig", class_bytes("java/lang/Object", "legacy")),
            ("B/java.base/module-info.sig", module_bytes("java.base")),
            ("B/java.sql/module-info.sig", module_bytes("java.sql")),
            ("B/java.sql/java/sql/Driver.sig", class_bytes("java/sql/Driver", "connect")),
            ("B/java.base/java/lang/Broken.sig", b"not a class file".to_vec()),
            ("8/java.base/java/lang/Object.sig", class_bytes("java/lang/Object", "eight")),
            ("9/java.base/module-info.sig", module_bytes("java.base")),
            ("H/system-modules", Vec::new()),
        ],
    );
    archive
}

/// A JDK 9 style `lib/ct.sym`: packages sit directly under the release
/// directories and module descriptors under `<code>-modules`.
fn legacy_jdk(root: &Path) -> PathBuf {
    let archive = jdk_image(root);
    write_symbol_archive(
        root,
        vec![
            ("89/java/lang/Object.sig", class_bytes("java/lang/Object", "legacy")),
            ("9/java/util/List.sig", class_bytes("java/util/List", "size")),
            ("9-modules/java.base/module-info.sig", module_bytes("java.base")),
        ],
    );
    archive
}

fn entry(archive: &Path, compliance: &str, session: &Arc<BuildSession>) -> ClasspathJrtWithRelease {
    ClasspathJrtWithRelease::new(archive, None, None, compliance, Arc::clone(session)).unwrap()
}

fn lookup(
    entry: &ClasspathJrtWithRelease,
    name: &str,
    release: Release,
) -> Option<mrj_build::classpath::Answer> {
    let query = ClassQuery::from_dotted(name).unwrap();
    entry.find_class(&query, ModuleConstraint::Any, release)
}

fn first_method(answer: &mrj_build::classpath::Answer) -> &str {
    &answer.binary_type().unwrap().methods[0].name
}

fn hash_of(value: &impl Hash) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

#[test]
fn sentinel_lookup_reads_release_signatures() {
    let dir = tempfile::tempdir().unwrap();
    let archive = fake_jdk(dir.path());
    let session = Arc::new(BuildSession::new());
    let jrt = entry(&archive, "11", &session);

    let object = lookup(&jrt, "java.lang.Object", Release::Unversioned).unwrap();
    assert_eq!(first_method(&object), "legacy");
    assert_eq!(object.release, Release::Java(11));
    assert_eq!(object.module_name.as_deref(), Some("java.base"));
    assert_eq!(
        object.binary_type().unwrap().module_name.as_deref(),
        Some("java.base")
    );

    let driver = lookup(&jrt, "java.sql.Driver", Release::Unversioned).unwrap();
    assert_eq!(driver.module_name.as_deref(), Some("java.sql"));
    assert!(lookup(&jrt, "java.lang.Missing", Release::Unversioned).is_none());
}

#[test]
fn named_module_scopes_signature_lookup() {
    let dir = tempfile::tempdir().unwrap();
    let archive = fake_jdk(dir.path());
    let jrt = entry(&archive, "11", &Arc::new(BuildSession::new()));
    let query = ClassQuery::from_dotted("java.sql.Driver").unwrap();

    assert!(jrt
        .find_class(&query, ModuleConstraint::Named("java.sql"), Release::Unversioned)
        .is_some());
    assert!(jrt
        .find_class(&query, ModuleConstraint::Named("java.base"), Release::Unversioned)
        .is_none());
}

#[test]
fn legacy_compliance_selects_its_release() {
    let dir = tempfile::tempdir().unwrap();
    let archive = fake_jdk(dir.path());
    let jrt = entry(&archive, "1.8", &Arc::new(BuildSession::new()));

    assert_eq!(jrt.release_option(), "8");
    assert_eq!(jrt.release_number(), 8);
    let object = lookup(&jrt, "java.lang.Object", Release::Unversioned).unwrap();
    assert_eq!(object.release, Release::Java(8));
}

#[test]
fn concrete_release_uses_runtime_image() {
    let dir = tempfile::tempdir().unwrap();
    let archive = fake_jdk(dir.path());
    let jrt = entry(&archive, "11", &Arc::new(BuildSession::new()));

    let object = lookup(&jrt, "java.lang.Object", Release::Java(11)).unwrap();
    assert_eq!(first_method(&object), "live");
    assert_eq!(object.release, Release::Unversioned);
    assert_eq!(object.module_name.as_deref(), Some("java.base"));
}

#[test]
fn system_modules_release_is_served_from_runtime_image() {
    let dir = tempfile::tempdir().unwrap();
    let archive = fake_jdk(dir.path());
    let jrt = entry(&archive, "17", &Arc::new(BuildSession::new()));

    let object = lookup(&jrt, "java.lang.Object", Release::Unversioned).unwrap();
    assert_eq!(first_method(&object), "live");
    assert!(jrt.has_module());
    assert_eq!(jrt.key(), Some(archive.display().to_string()));
    assert_eq!(jrt.module_names(None), vec!["java.base".to_string()]);
}

#[test]
fn unknown_release_defers_failure_to_lookup() {
    let dir = tempfile::tempdir().unwrap();
    let archive = fake_jdk(dir.path());
    // Construction succeeds; the archive has no directory for release 10.
    let jrt = entry(&archive, "10", &Arc::new(BuildSession::new()));

    assert!(lookup(&jrt, "java.lang.Object", Release::Unversioned).is_none());
    assert!(lookup(&jrt, "java.lang.Object", Release::Java(10)).is_some());
}

#[test]
fn malformed_signature_counts_as_missing() {
    let dir = tempfile::tempdir().unwrap();
    let archive = fake_jdk(dir.path());
    let jrt = entry(&archive, "11", &Arc::new(BuildSession::new()));

    assert!(lookup(&jrt, "java.lang.Broken", Release::Unversioned).is_none());
    assert!(lookup(&jrt, "java.lang.Object", Release::Unversioned).is_some());
}

#[test]
fn release_without_symbol_code_defers_failure_to_lookup() {
    let dir = tempfile::tempdir().unwrap();
    let archive = fake_jdk(dir.path());
    let jrt = entry(&archive, "40", &Arc::new(BuildSession::new()));

    assert_eq!(jrt.release_number(), 40);
    assert!(lookup(&jrt, "java.lang.Object", Release::Unversioned).is_none());
    assert_eq!(
        first_method(&lookup(&jrt, "java.lang.Object", Release::Java(40)).unwrap()),
        "live"
    );
}

#[test]
fn legacy_layout_lists_modules_from_module_directory() {
    let dir = tempfile::tempdir().unwrap();
    let archive = legacy_jdk(dir.path());
    let session = Arc::new(BuildSession::new());
    let jrt = entry(&archive, "9", &session);

    let object = lookup(&jrt, "java.lang.Object", Release::Unversioned).unwrap();
    assert_eq!(first_method(&object), "legacy");
    assert_eq!(object.module_name, None);

    let key = format!("{}|9-modules", archive.display());
    assert!(jrt.has_module());
    assert_eq!(jrt.key(), Some(key.clone()));
    assert_eq!(jrt.module_names(None), vec!["java.base".to_string()]);
    assert!(session.module_names().contains(&key));
}

#[test]
fn missing_platform_archive_is_a_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = ClasspathJrtWithRelease::new(
        dir.path().join("lib/jrt-fs.jar"),
        None,
        None,
        "11",
        Arc::new(BuildSession::new()),
    );
    assert!(matches!(result, Err(BuildError::SymbolArchive(_))));

    let archive = fake_jdk(dir.path());
    let result =
        ClasspathJrtWithRelease::new(archive, None, None, "", Arc::new(BuildSession::new()));
    assert!(matches!(result, Err(BuildError::Release(_))));
}

#[test]
fn module_listing_comes_from_release_descriptors() {
    let dir = tempfile::tempdir().unwrap();
    let archive = fake_jdk(dir.path());
    let session = Arc::new(BuildSession::new());
    let jrt = entry(&archive, "11", &session);

    assert_eq!(jrt.key(), Some(format!("{}|B", archive.display())));
    assert!(jrt.has_module());
    assert_eq!(
        jrt.module_names(None),
        vec!["java.base".to_string(), "java.sql".to_string()]
    );
    assert_eq!(
        jrt.module_names(Some(&["java.sql".to_string()])),
        vec!["java.sql".to_string()]
    );

    let nine = entry(&archive, "9", &session);
    assert_eq!(nine.module_names(None), vec!["java.base".to_string()]);
    assert_eq!(session.module_names().len(), 2);
}

#[test]
fn equality_and_hash_follow_archive_and_release() {
    let dir = tempfile::tempdir().unwrap();
    let archive = fake_jdk(dir.path());
    let session = Arc::new(BuildSession::new());

    let eleven = entry(&archive, "11", &session);
    let same = entry(&archive, "11", &session);
    let seventeen = entry(&archive, "17", &session);

    assert_eq!(eleven, same);
    assert_eq!(hash_of(&eleven), hash_of(&same));
    assert_ne!(eleven, seventeen);
    assert_ne!(hash_of(&eleven), hash_of(&seventeen));

    let distinct: HashSet<_> = [eleven, same, seventeen].into_iter().collect();
    assert_eq!(distinct.len(), 2);
}

#[test]
fn display_names_archive_and_release() {
    let dir = tempfile::tempdir().unwrap();
    let archive = fake_jdk(dir.path());
    let jrt = entry(&archive, "1.8", &Arc::new(BuildSession::new()));

    assert_eq!(
        jrt.to_string(),
        format!("Classpath jrt file {} with --release option 8", archive.display())
    );
}

#[test]
fn access_rules_mark_platform_answers() {
    let dir = tempfile::tempdir().unwrap();
    let archive = fake_jdk(dir.path());
    let rules = AccessRuleSet::new(
        [("java/sql/**", AccessRuleKind::Forbidden)],
        archive.display().to_string(),
    )
    .unwrap();
    let jrt = ClasspathJrtWithRelease::new(
        &archive,
        Some(rules),
        None,
        "11",
        Arc::new(BuildSession::new()),
    )
    .unwrap();

    let driver = lookup(&jrt, "java.sql.Driver", Release::Unversioned).unwrap();
    let restriction = driver.access_restriction.expect("restricted");
    assert_eq!(restriction.kind, AccessRuleKind::Forbidden);
    assert!(lookup(&jrt, "java.lang.Object", Release::Unversioned)
        .unwrap()
        .access_restriction
        .is_none());
}

#[test]
fn concurrent_entries_share_one_module_listing() {
    let dir = tempfile::tempdir().unwrap();
    let archive = fake_jdk(dir.path());
    let session = Arc::new(BuildSession::new());

    let listings: Vec<Vec<String>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let archive = archive.clone();
                let session = Arc::clone(&session);
                scope.spawn(move || entry(&archive, "11", &session).module_names(None))
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("thread panicked"))
            .collect()
    });

    assert!(listings.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(listings[0], vec!["java.base".to_string(), "java.sql".to_string()]);
    assert_eq!(
        session.module_names().len(),
        1,
        "only the release listing is cached"
    );
}
