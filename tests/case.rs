use casexml_bin::{parse, Case, EntryType, EnvBase, Error, Headers, NewEntry};
use std::fs;
use test_case::test_case;

const ENV_BUILD: &str = r#"<?xml version="1.0"?>
<file id="env_build.xml" version="2.0">
  <header>
    Hand written build settings.
  </header>
  <group id="build_def">
    <entry id="COMPILER" value="gnu">
      <type>char</type>
      <valid_values>gnu,intel,nvhpc</valid_values>
      <desc>Machine compiler</desc>
    </entry>
    <entry id="EXEROOT" value="$CASEROOT/bld">
      <type>char</type>
    </entry>
  </group>
</file>
"#;

#[test_case("env_case.xml")]
#[test_case("env_build.xml")]
#[test_case("env_run.xml")]
#[test_case("env_mach_pes.xml")]
#[test_case("env_batch.xml")]
fn new_env_files_get_their_own_header(file: &str) {
    let dir = tempfile::tempdir().unwrap();
    let headers = Headers::builtin().unwrap();

    let mut env = EnvBase::new(dir.path(), file, &headers).unwrap();
    assert!(env.is_new());
    assert_eq!(env.headers().len(), 1);
    env.write().unwrap();

    // The written file carries the template text that belongs to this file name
    let expected = {
        let header = casexml_bin::HeaderProvider::header_node(&headers, file).unwrap();
        let root = header.root().unwrap();
        header.text(root).unwrap()
    };
    let written = parse(&fs::read_to_string(dir.path().join(file)).unwrap()).unwrap();
    let root = written.root().unwrap();
    let found = written.children(root, Some("header"), &[]);
    assert_eq!(found.len(), 1);
    assert_eq!(written.text(found[0]).unwrap(), expected);
    assert_eq!(written.get(root, "id"), Some(file));
}

#[test]
fn existing_file_keeps_its_own_header() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("env_build.xml"), ENV_BUILD).unwrap();
    let headers = Headers::builtin().unwrap();

    let env = EnvBase::new(dir.path(), "env_build.xml", &headers).unwrap();
    assert!(!env.is_new());

    let found = env.headers();
    assert_eq!(found.len(), 1);
    assert!(env.document().text(found[0]).unwrap().contains("Hand written"));
}

#[test]
fn case_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("env_build.xml"), ENV_BUILD).unwrap();
    let headers = Headers::builtin().unwrap();

    let mut case = Case::open(dir.path(), &Case::DEFAULT_FILES, &headers).unwrap();
    assert_eq!(case.files().iter().filter(|env| env.is_new()).count(), 4);

    let root = dir.path().display().to_string();
    case.env_mut("env_case.xml")
        .unwrap()
        .add_entry(
            "case_desc",
            NewEntry::new("CASEROOT", &root)
                .with_type(EntryType::Char)
                .with_description("full pathname of case"),
        )
        .unwrap();

    assert_eq!(
        case.get_resolved_value("EXEROOT").unwrap(),
        Some(format!("{root}/bld"))
    );

    assert!(matches!(
        case.set_value("COMPILER", "clang", false),
        Err(Error::InvalidValue { .. })
    ));
    case.set_value("COMPILER", "intel", false).unwrap();

    // four new files plus the modified env_build.xml
    assert_eq!(case.flush().unwrap(), 5);

    let reopened = Case::open(dir.path(), &Case::DEFAULT_FILES, &headers).unwrap();
    assert!(reopened.files().iter().all(|env| !env.is_new()));
    assert_eq!(reopened.get_value("COMPILER").unwrap().as_deref(), Some("intel"));
    assert_eq!(reopened.find("*ROOT").unwrap(), vec!["CASEROOT", "EXEROOT"]);
}

#[test]
fn custom_header_templates() {
    let dir = tempfile::tempdir().unwrap();
    let templates = dir.path().join("config_headers.xml");
    fs::write(
        &templates,
        r#"<files><file name="env_test.xml"><header>test header</header></file></files>"#,
    )
    .unwrap();
    let headers = Headers::load(&templates).unwrap();

    let env = EnvBase::new(dir.path(), "env_test.xml", &headers).unwrap();
    let found = env.headers();
    assert_eq!(env.document().text(found[0]).as_deref(), Some("test header"));

    assert!(matches!(
        Case::open(dir.path(), &["env_case.xml"], &headers),
        Err(Error::MissingHeader(_))
    ));
}
