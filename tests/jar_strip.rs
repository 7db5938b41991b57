mod common;

use classfile_stripper::code_attribute::Instruction;
use classfile_stripper::jar_strip::strip_jar;
use classfile_stripper::jar_utils::JarFile;
use classfile_stripper::method_info::MethodAccessFlags;
use classfile_stripper::strip::ClassStripper;
use classfile_stripper::ClassFile;

use common::{code_attr, marker_annotation};

const CLIENT_ONLY: &str = "Lexample/ClientOnly;";
const SERVER_ONLY: &str = "Lexample/ServerOnly;";

fn stripper() -> ClassStripper {
    ClassStripper::builder()
        .annotation("client", CLIENT_ONLY)
        .annotation("server", SERVER_ONLY)
        .build("server")
}

fn build_jar() -> JarFile {
    let mut jar = JarFile::new();

    // Entirely client-only class.
    let mut screen = ClassFile::new("example/ClientScreen", "java/lang/Object");
    let annotation = marker_annotation(&mut screen, CLIENT_ONLY);
    screen
        .attach_class_attribute("RuntimeInvisibleAnnotations", annotation)
        .unwrap();
    jar.set_class("example/ClientScreen.class", screen).unwrap();

    // Mixed class: one client-only method.
    let mut mixed = ClassFile::new("example/Mixed", "java/lang/Object");
    let client_method = mixed.add_method(MethodAccessFlags::PUBLIC, "clientTick", "()V");
    let annotation = marker_annotation(&mut mixed, CLIENT_ONLY);
    mixed
        .attach_method_attribute(client_method, "RuntimeInvisibleAnnotations", annotation)
        .unwrap();
    mixed
        .attach_code(client_method, code_attr(1, 1, vec![Instruction::Return]))
        .unwrap();
    let shared = mixed.add_method(MethodAccessFlags::PUBLIC, "sharedTick", "()V");
    mixed
        .attach_code(shared, code_attr(1, 1, vec![Instruction::Return]))
        .unwrap();
    jar.set_class("example/Mixed.class", mixed).unwrap();

    // Untouched class and a resource.
    let plain = ClassFile::new("example/Plain", "java/lang/Object");
    jar.set_class("example/Plain.class", plain).unwrap();
    jar.set_entry(
        "META-INF/MANIFEST.MF",
        b"Manifest-Version: 1.0\r\n\r\n".to_vec(),
    );

    jar
}

#[test]
fn strips_across_an_archive() {
    let mut jar = build_jar();
    let plain_before = jar.get_entry("example/Plain.class").unwrap().to_vec();

    let summary = strip_jar(&mut jar, &stripper()).unwrap();

    assert_eq!(summary.removed, vec!["example/ClientScreen.class"]);
    assert_eq!(summary.modified, vec!["example/Mixed.class"]);
    assert!(!jar.contains_entry("example/ClientScreen.class"));

    // Untouched entries are byte-identical.
    assert_eq!(
        jar.get_entry("example/Plain.class").unwrap(),
        &plain_before[..]
    );
    assert_eq!(
        jar.get_entry("META-INF/MANIFEST.MF").unwrap(),
        &b"Manifest-Version: 1.0\r\n\r\n"[..]
    );

    let mixed = jar.parse_class("example/Mixed.class").unwrap();
    assert!(mixed.find_method("clientTick", "()V").is_none());
    assert!(mixed.find_method("sharedTick", "()V").is_some());
}

#[test]
fn stripped_jar_round_trips_through_zip() {
    let mut jar = build_jar();
    strip_jar(&mut jar, &stripper()).unwrap();

    let bytes = jar.to_bytes().unwrap();
    let reloaded = JarFile::from_bytes(&bytes).unwrap();

    let names: Vec<&str> = reloaded.entry_names().collect();
    assert_eq!(
        names,
        vec![
            "META-INF/MANIFEST.MF",
            "example/Mixed.class",
            "example/Plain.class",
        ]
    );
    reloaded.parse_class("example/Mixed.class").unwrap();
}

#[test]
fn client_build_keeps_client_classes() {
    let mut jar = build_jar();
    let summary = strip_jar(
        &mut jar,
        &ClassStripper::builder()
            .annotation("client", CLIENT_ONLY)
            .annotation("server", SERVER_ONLY)
            .build("client"),
    )
    .unwrap();

    assert!(summary.is_empty());
    assert!(jar.contains_entry("example/ClientScreen.class"));
}
