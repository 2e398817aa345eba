use anyhow::bail;
use docbatch::{
    executor::{BatchStatus, CancelToken, SequentialExecutor},
    session::{FileId, FileUnit},
};

fn unit(name: &str, bytes: &[u8]) -> FileUnit {
    FileUnit {
        id: FileId::new(name),
        name: name.to_string(),
        size_bytes: bytes.len() as u64,
        bytes: bytes.to_vec(),
    }
}

fn upper(unit: &FileUnit) -> anyhow::Result<Vec<u8>> {
    if unit.bytes.starts_with(b"bad") {
        bail!("cannot handle {}", unit.name);
    }
    Ok(unit.bytes.to_ascii_uppercase())
}

#[test]
fn outcomes_keep_submission_order() {
    let units = vec![unit("a.pdf", b"aa"), unit("b.pdf", b"bad"), unit("c.pdf", b"cc")];
    let mut exec = SequentialExecutor::default();
    let mut seen = Vec::new();

    let result = exec.run_batch(&units, upper, |i, total, name| seen.push((i, total, name.to_string())));

    assert_eq!(
        seen,
        vec![
            (0, 3, "a.pdf".to_string()),
            (1, 3, "b.pdf".to_string()),
            (2, 3, "c.pdf".to_string())
        ]
    );
    assert_eq!(result.successes, vec![
        ("a.pdf".to_string(), b"AA".to_vec()),
        ("c.pdf".to_string(), b"CC".to_vec()),
    ]);
    assert_eq!(result.failed_names(), vec!["b.pdf"]);
    assert!(result.failures[0].reason.contains("cannot handle b.pdf"));
    assert_eq!(result.submitted(), 3);
    assert_eq!(result.status(), BatchStatus::PartiallySucceeded);
    assert!(!result.cancelled);
}

#[test]
fn empty_output_is_a_failure() {
    let units = vec![unit("a.pdf", b"a")];
    let mut exec = SequentialExecutor::default();
    let result = exec.run_batch(&units, |_| Ok(Vec::new()), |_, _, _| {});
    assert!(result.successes.is_empty());
    assert_eq!(result.failures[0].reason, "empty output");
    assert_eq!(result.status(), BatchStatus::Failed);
}

#[test]
fn all_success_status() {
    let units = vec![unit("a.pdf", b"a"), unit("b.pdf", b"b")];
    let mut exec = SequentialExecutor::default();
    let result = exec.run_batch(&units, upper, |_, _, _| {});
    assert_eq!(result.status(), BatchStatus::Succeeded);
    assert!(result.failures.is_empty());
}

#[test]
fn cancel_skips_remaining_units() {
    let token = CancelToken::new();
    let mut exec = SequentialExecutor::new(token.clone());
    let units = vec![unit("a.pdf", b"a"), unit("b.pdf", b"b"), unit("c.pdf", b"c")];
    let mut transformed = Vec::new();

    let result = exec.run_batch(
        &units,
        |u| {
            transformed.push(u.name.clone());
            token.cancel();
            upper(u)
        },
        |_, _, _| {},
    );

    assert_eq!(transformed, vec!["a.pdf"]);
    assert!(result.cancelled);
    assert_eq!(result.successes.len(), 1);
    assert_eq!(result.failed_names(), vec!["b.pdf", "c.pdf"]);
    assert!(result.failures.iter().all(|f| f.reason == "cancelled"));
    assert!(exec.cancel_token().is_cancelled());
}
