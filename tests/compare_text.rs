use anyhow::Result;
use cmdline_regress::compare::{Comparator, TextComparator, normalize_text, normalized_file, texts_match};
use cmdline_regress::types::Comparison;
use pretty_assertions::assert_eq;
use std::fs;
use tempfile::tempdir;

#[test]
fn line_endings_do_not_matter() -> Result<()> {
    let dir = tempdir()?;
    let expected = dir.path().join("a-expected.txt");
    let actual = dir.path().join("a-actual.txt");
    fs::write(&expected, "a\r\n")?;
    fs::write(&actual, "a\n")?;

    assert!(texts_match(&expected, &actual));
    let record = TextComparator.compare(&expected, &actual);
    assert_eq!(record.kind, "diff");
    assert!(record.matches);
    Ok(())
}

#[test]
fn normalization_rules() {
    assert_eq!(normalize_text(b"a\r\nb\r\n"), b"a\nb\n");
    assert_eq!(normalize_text(b"\n\nabc\r\n\r\n\n"), b"abc\n");
    assert_eq!(normalize_text(b""), b"\n");
    // A lone CR inside a line is content
    assert_eq!(normalize_text(b"a\rb"), b"a\rb\n");
    // Interior blank lines survive
    assert_eq!(normalize_text(b"a\n\n\nb"), b"a\n\n\nb\n");
}

#[test]
fn normalization_is_idempotent() {
    let samples: [&[u8]; 6] = [
        b"",
        b"\r\n",
        b"x",
        b"x\r\n\r\ny\r\n",
        b"\r\r\n\n\rz\r",
        b"line\r\r\nother\n",
    ];
    for sample in samples {
        let once = normalize_text(sample);
        assert_eq!(normalize_text(&once), once, "sample {sample:?}");
    }
}

#[test]
fn equality_is_symmetric() -> Result<()> {
    let dir = tempdir()?;
    let contents = ["a\n", "a\r\n", "b\n", "", "\n\n"];
    let paths: Vec<_> = contents
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let p = dir.path().join(format!("{i}.txt"));
            fs::write(&p, c).map(|()| p)
        })
        .collect::<Result<_, _>>()?;

    for a in &paths {
        for b in &paths {
            assert_eq!(texts_match(a, b), texts_match(b, a));
        }
    }
    // Empty and newline-only files both normalize to a single LF
    assert!(texts_match(&paths[3], &paths[4]));
    Ok(())
}

#[test]
fn mismatch_is_recorded() -> Result<()> {
    let dir = tempdir()?;
    let expected = dir.path().join("e.txt");
    let actual = dir.path().join("a.txt");
    fs::write(&expected, "one\ntwo\n")?;
    fs::write(&actual, "one\nthree\n")?;

    let record = TextComparator.compare(&expected, &actual);
    assert!(!record.matches);
    match record.comparison {
        Comparison::Text(text) => {
            assert!(!text.matches);
            assert_eq!(text.expected, expected.display().to_string());
            assert_eq!(text.actual, actual.display().to_string());
        }
        Comparison::Image(_) => panic!("text comparator produced an image record"),
    }
    Ok(())
}

#[test]
fn unreadable_file_reads_as_empty() {
    assert_eq!(normalized_file(std::path::Path::new("/nonexistent/file.txt")), b"\n");
}

#[test]
fn generated_files_are_normalized_in_place() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("g-expected.txt");
    fs::write(&path, "\r\nx\r\ny\r\n\r\n")?;
    TextComparator.generated(&path)?;
    assert_eq!(fs::read(&path)?, b"x\ny\n");
    Ok(())
}
