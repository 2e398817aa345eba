mod common;

use common::{zip_entry_names, FailingBuilder};
use docbatch::{
    error::PipelineError,
    packager::{Artifact, NamingRule, OutputPackager, ZipArchiveBuilder},
};
use std::io::Read;
use zip::CompressionMethod;

fn outputs(names: &[&str]) -> Vec<(String, Vec<u8>)> {
    names
        .iter()
        .map(|n| (n.to_string(), format!("body of {n}").into_bytes()))
        .collect()
}

#[test]
fn naming_rules() {
    assert_eq!(NamingRule::Prefix("repaired_".into()).apply("report.pdf"), "repaired_report.pdf");
    assert_eq!(NamingRule::ReplaceExtension("pdf".into()).apply("scan.JPG"), "scan.pdf");
    assert_eq!(NamingRule::ReplaceExtension("pdf".into()).apply("noext"), "noext.pdf");
}

#[test]
fn single_success_is_not_archived() {
    let packager = OutputPackager::new(
        NamingRule::Prefix("repaired_".into()),
        "repaired_pdfs.zip",
        ZipArchiveBuilder::default(),
    );
    let artifact = packager.package(&outputs(&["a.pdf"])).unwrap();
    assert!(!artifact.is_archive());
    assert_eq!(artifact.file_name(), "repaired_a.pdf");
    assert_eq!(artifact.bytes(), b"body of a.pdf");
}

#[test]
fn many_successes_become_one_archive_in_order() {
    let packager = OutputPackager::new(
        NamingRule::ReplaceExtension("pdf".into()),
        "converted_images.zip",
        ZipArchiveBuilder::new(CompressionMethod::Deflated),
    );
    let artifact = packager.package(&outputs(&["z.jpg", "a.jpg", "m.jpeg"])).unwrap();
    assert!(artifact.is_archive());
    assert_eq!(artifact.file_name(), "converted_images.zip");
    assert_eq!(zip_entry_names(artifact.bytes()), vec!["z.pdf", "a.pdf", "m.pdf"]);

    let Artifact::Archive { entries, .. } = &artifact else {
        panic!("expected archive");
    };
    assert_eq!(entries, &vec!["z.pdf", "a.pdf", "m.pdf"]);

    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(artifact.bytes())).unwrap();
    let mut body = String::new();
    archive.by_name("a.pdf").unwrap().read_to_string(&mut body).unwrap();
    assert_eq!(body, "body of a.jpg");
}

#[test]
fn duplicate_output_names_are_disambiguated() {
    let packager = OutputPackager::new(
        NamingRule::ReplaceExtension("pdf".into()),
        "converted_images.zip",
        ZipArchiveBuilder::default(),
    );
    let artifact = packager
        .package(&outputs(&["scan.jpg", "scan.jpeg", "scan.JPG"]))
        .unwrap();
    assert_eq!(
        zip_entry_names(artifact.bytes()),
        vec!["scan.pdf", "scan (2).pdf", "scan (3).pdf"]
    );
}

#[test]
fn stored_archives_are_readable() {
    let packager = OutputPackager::new(
        NamingRule::Prefix("x_".into()),
        "out.zip",
        ZipArchiveBuilder::new(CompressionMethod::Stored),
    );
    let artifact = packager.package(&outputs(&["a.pdf", "b.pdf"])).unwrap();
    assert_eq!(zip_entry_names(artifact.bytes()), vec!["x_a.pdf", "x_b.pdf"]);
}

#[test]
fn nothing_to_package_is_an_error() {
    let packager = OutputPackager::new(NamingRule::Prefix("x_".into()), "out.zip", ZipArchiveBuilder::default());
    assert!(matches!(packager.package(&[]), Err(PipelineError::Packaging(_))));
}

#[test]
fn builder_failure_is_a_packaging_error() {
    let packager = OutputPackager::new(NamingRule::Prefix("x_".into()), "out.zip", FailingBuilder);
    let err = packager.package(&outputs(&["a.pdf", "b.pdf"])).unwrap_err();
    match err {
        PipelineError::Packaging(msg) => assert!(msg.contains("out of memory")),
        other => panic!("unexpected error: {other}"),
    }
}
