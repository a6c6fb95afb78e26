use crate::config::OrganizeConfig;
use crate::error::{Error, ExtractionError, FilesystemError};
use crate::organizer::*;
use crate::types::{Disposition, Event, QuarantineReason};
use std::path::Path;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Write a ZIP to `path`; names ending in '/' become directories
fn write_zip(path: &Path, entries: &[(&str, &[u8])], password: Option<&[u8]>) {
    use ::zip::unstable::write::FileOptionsExt;

    let file = std::fs::File::create(path).unwrap();
    let mut writer = ::zip::ZipWriter::new(file);
    let plain =
        ::zip::write::FileOptions::default().compression_method(::zip::CompressionMethod::Stored);
    for (name, content) in entries {
        if name.ends_with('/') {
            writer.add_directory(*name, plain).unwrap();
            continue;
        }
        let options = match password {
            Some(pw) => plain.with_deprecated_encryption(pw),
            None => plain,
        };
        writer.start_file(*name, options).unwrap();
        std::io::Write::write_all(&mut writer, content).unwrap();
    }
    writer.finish().unwrap();
}

fn zip_bytes(entries: &[(&str, &[u8])], password: Option<&[u8]>) -> Vec<u8> {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("tmp.zip");
    write_zip(&path, entries, password);
    std::fs::read(path).unwrap()
}

fn organizer(root: &Path) -> Organizer {
    Organizer::new(root, OrganizeConfig::default()).unwrap()
}

/// Sorted names of the direct children of `dir`
fn listing(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn today_prefix() -> String {
    chrono::Local::now().format("%Y%m%d").to_string()
}

// ---------------------------------------------------------------------------
// Dispositions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn prefixed_folders_are_moved_unchanged() {
    let root = TempDir::new().unwrap();
    let archive = root.path().join("bundle.zip");
    write_zip(
        &archive,
        &[("RJ1/a.wav", b"a"), ("RJ2/b.wav", b"b")],
        None,
    );

    let report = organizer(root.path()).process(&archive).await;

    assert!(report.is_success());
    assert_eq!(listing(root.path()), vec!["RJ1", "RJ2"]);
    assert!(root.path().join("RJ2/b.wav").is_file());
    let organized = report.outcomes[0].result.as_ref().unwrap();
    assert_eq!(organized.disposition, Disposition::KeepAsIs);
}

#[tokio::test]
async fn single_folder_takes_archive_base_name() {
    let root = TempDir::new().unwrap();
    let archive = root.path().join("RJ999.zip");
    write_zip(&archive, &[("audio/track.mp3", b"mp3")], None);

    let report = organizer(root.path()).process(&archive).await;

    assert!(report.is_success());
    assert_eq!(listing(root.path()), vec!["RJ999"]);
    assert!(root.path().join("RJ999/track.mp3").is_file());
}

#[tokio::test]
async fn loose_files_are_quarantined_with_manifest() {
    let root = TempDir::new().unwrap();
    let archive = root.path().join("RJ1.zip");
    write_zip(&archive, &[("RJ1/x.wav", b"x"), ("readme.txt", b"read me")], None);

    let report = organizer(root.path()).process(&archive).await;
    assert!(report.is_success());

    let folder = format!("{}-RJ1", today_prefix());
    assert_eq!(listing(root.path()), vec![folder.clone()]);

    let quarantined = root.path().join(&folder);
    assert_eq!(
        listing(&quarantined),
        vec!["RJ1", "processing_log.txt", "readme.txt"]
    );
    let manifest = std::fs::read_to_string(quarantined.join("processing_log.txt")).unwrap();
    assert!(manifest.contains("Original file: RJ1.zip"));
    assert!(manifest.contains(&format!("Target folder: {folder}")));

    let organized = report.outcomes[0].result.as_ref().unwrap();
    assert_eq!(
        organized.disposition,
        Disposition::Quarantine {
            reason: QuarantineReason::LooseFiles
        }
    );
}

#[tokio::test]
async fn quarantine_folder_collisions_get_suffixes() {
    let root = TempDir::new().unwrap();
    let org = organizer(root.path());

    for _ in 0..3 {
        let archive = root.path().join("RJ1.zip");
        write_zip(&archive, &[("a.txt", b"a")], None);
        assert!(org.process(&archive).await.is_success());
    }

    let folder = format!("{}-RJ1", today_prefix());
    assert_eq!(
        listing(root.path()),
        vec![folder.clone(), format!("{folder}_1"), format!("{folder}_2")]
    );
}

#[tokio::test]
async fn existing_folder_gets_numeric_suffix() {
    let root = TempDir::new().unwrap();
    std::fs::create_dir(root.path().join("RJ1")).unwrap();
    let archive = root.path().join("RJ1.zip");
    write_zip(&archive, &[("RJ1/new.wav", b"n")], None);

    assert!(organizer(root.path()).process(&archive).await.is_success());

    assert_eq!(listing(root.path()), vec!["RJ1", "RJ1_1"]);
    assert!(root.path().join("RJ1_1/new.wav").is_file());
}

#[tokio::test]
async fn empty_archive_is_just_removed() {
    let root = TempDir::new().unwrap();
    let archive = root.path().join("RJ1.zip");
    write_zip(&archive, &[], None);

    let report = organizer(root.path()).process(&archive).await;

    assert!(report.is_success());
    assert!(listing(root.path()).is_empty());
}

// ---------------------------------------------------------------------------
// Passwords and cascades
// ---------------------------------------------------------------------------

#[tokio::test]
async fn grouped_password_is_used_and_stripped() {
    let root = TempDir::new().unwrap();
    let archive = root.path().join("RJ123456 pass-(my password).zip");
    write_zip(&archive, &[("content/a.txt", b"secret")], Some(b"my password".as_slice()));

    let report = organizer(root.path()).process(&archive).await;

    assert!(report.is_success(), "{:?}", report);
    // renamed to the cleaned base name, not the raw file name
    assert_eq!(listing(root.path()), vec!["RJ123456"]);
}

#[tokio::test]
async fn wrong_password_leaves_everything_untouched() {
    let root = TempDir::new().unwrap();
    let archive = root.path().join("RJ1 pass-wrong.zip");
    write_zip(&archive, &[("RJ1/a.txt", b"a")], Some(b"right".as_slice()));

    let report = organizer(root.path()).process(&archive).await;

    assert!(!report.is_success());
    assert_eq!(report.failures(), 1);
    assert!(matches!(
        report.outcomes[0].result,
        Err(Error::Extraction(_))
    ));
    // archive still there, no scratch directory left behind
    assert_eq!(listing(root.path()), vec!["RJ1 pass-wrong.zip"]);
}

#[tokio::test]
async fn missing_password_is_reported() {
    let root = TempDir::new().unwrap();
    let archive = root.path().join("RJ1.zip");
    write_zip(&archive, &[("RJ1/a.txt", b"a")], Some(b"right".as_slice()));

    let err = organizer(root.path())
        .process_one(&archive)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Extraction(ExtractionError::WrongPassword { .. })
    ));
    assert!(archive.exists());
}

#[tokio::test]
async fn nested_archive_cascades_with_second_password() {
    let root = TempDir::new().unwrap();
    let inner = zip_bytes(&[("RJ5/track.wav", b"wav")], Some(b"inner pw".as_slice()));
    let archive = root.path().join("RJ5 pass-outer (inner pw).zip");
    write_zip(&archive, &[("disc.zip", inner.as_slice())], Some(b"outer".as_slice()));

    let report = organizer(root.path()).process(&archive).await;

    assert!(report.is_success(), "{:?}", report);
    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(report.outcomes[1].depth, 1);
    assert_eq!(
        report.outcomes[1].archive,
        root.path().join("disc pass-(inner pw).zip")
    );
    assert_eq!(listing(root.path()), vec!["RJ5"]);
    assert!(root.path().join("RJ5/track.wav").is_file());
}

#[tokio::test]
async fn several_nested_archives_are_processed_breadth_first() {
    let root = TempDir::new().unwrap();
    let a = zip_bytes(&[("RJ1/a.txt", b"a")], None);
    let b = zip_bytes(&[("RJ2/b.txt", b"b")], None);
    let archive = root.path().join("pack.zip");
    write_zip(&archive, &[("a.zip", a.as_slice()), ("b.zip", b.as_slice())], None);

    let report = organizer(root.path()).process(&archive).await;

    assert!(report.is_success());
    let order: Vec<_> = report
        .outcomes
        .iter()
        .map(|o| o.archive.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(order, vec!["pack.zip", "a.zip", "b.zip"]);
    assert_eq!(listing(root.path()), vec!["RJ1", "RJ2"]);
}

#[tokio::test]
async fn depth_guard_leaves_nested_archive_in_root() {
    let root = TempDir::new().unwrap();
    let inner = zip_bytes(&[("RJ1/a.txt", b"a")], None);
    let archive = root.path().join("outer.zip");
    write_zip(&archive, &[("inner.zip", inner.as_slice())], None);

    let config = OrganizeConfig {
        max_cascade_depth: Some(0),
        ..Default::default()
    };
    let report = Organizer::new(root.path(), config)
        .unwrap()
        .process(&archive)
        .await;

    assert!(report.is_success());
    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.skipped, vec![root.path().join("inner.zip")]);
    assert_eq!(listing(root.path()), vec!["inner.zip"]);
}

#[tokio::test]
async fn mixed_archive_and_folder_is_quarantined_not_cascaded() {
    let root = TempDir::new().unwrap();
    let inner = zip_bytes(&[("x.txt", b"x")], None);
    let archive = root.path().join("RJ3.zip");
    write_zip(&archive, &[("RJ3/", b""), ("bonus.zip", inner.as_slice())], None);

    let report = organizer(root.path()).process(&archive).await;

    assert_eq!(report.outcomes.len(), 1);
    let organized = report.outcomes[0].result.as_ref().unwrap();
    assert_eq!(
        organized.disposition,
        Disposition::Quarantine {
            reason: QuarantineReason::MixedArchives
        }
    );
    let folder = root.path().join(format!("{}-RJ3", today_prefix()));
    assert!(folder.join("bonus.zip").is_file());
}

#[tokio::test]
async fn nested_archive_named_like_its_parent_keeps_the_name() {
    let root = TempDir::new().unwrap();
    let inner = zip_bytes(&[("audio/a.txt", b"a")], None);
    let archive = root.path().join("RJ1.zip");
    write_zip(&archive, &[("RJ1.zip", inner.as_slice())], None);

    let report = organizer(root.path()).process(&archive).await;

    assert!(report.is_success(), "{:?}", report);
    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(report.outcomes[1].archive, root.path().join("RJ1.zip"));
    assert_eq!(listing(root.path()), vec!["RJ1"]);
    assert!(root.path().join("RJ1/a.txt").is_file());
}

#[tokio::test]
async fn quarantined_entry_named_like_the_manifest_is_kept() {
    let root = TempDir::new().unwrap();
    let archive = root.path().join("RJ2.zip");
    write_zip(
        &archive,
        &[("RJ2/a.txt", b"a"), ("processing_log.txt", b"USER DATA")],
        None,
    );

    let report = organizer(root.path()).process(&archive).await;
    assert!(report.is_success());
    assert!(!archive.exists());

    let quarantined = root.path().join(format!("{}-RJ2", today_prefix()));
    assert_eq!(
        listing(&quarantined),
        vec!["RJ2", "processing_log.txt", "processing_log_1.txt"]
    );
    assert_eq!(
        std::fs::read(quarantined.join("processing_log.txt")).unwrap(),
        b"USER DATA"
    );
    let manifest = std::fs::read_to_string(quarantined.join("processing_log_1.txt")).unwrap();
    assert!(manifest.contains("Original file: RJ2.zip"));
}

#[tokio::test]
async fn failed_disposition_puts_the_archive_back() {
    let root = TempDir::new().unwrap();
    let archive = root.path().join("RJ4.zip");
    write_zip(&archive, &[("RJ4/a.txt", b"a"), ("notes.txt", b"n")], None);

    // the quarantine folder would need a parent directory that does not exist
    let config = OrganizeConfig {
        quarantine_date_format: "%Y/%m%d".to_string(),
        ..Default::default()
    };
    let report = Organizer::new(root.path(), config)
        .unwrap()
        .process(&archive)
        .await;

    assert!(!report.is_success());
    assert!(matches!(
        report.outcomes[0].result,
        Err(Error::Filesystem(FilesystemError::CreateDirFailed { .. }))
    ));
    // archive back under its own name, scratch and holding directories gone
    assert_eq!(listing(root.path()), vec!["RJ4.zip"]);
}

// ---------------------------------------------------------------------------
// Detection and error boundaries
// ---------------------------------------------------------------------------

#[tokio::test]
async fn extensionless_archive_is_sniffed() {
    let root = TempDir::new().unwrap();
    // no extension, and the folder inside takes the archive's own name
    let archive = root.path().join("RJ77");
    write_zip(&archive, &[("RJ77/a.txt", b"a")], None);

    let report = organizer(root.path()).process(&archive).await;

    assert!(report.is_success(), "{:?}", report);
    assert_eq!(listing(root.path()), vec!["RJ77"]);
    assert!(root.path().join("RJ77/a.txt").is_file());
}

#[tokio::test]
async fn non_archive_is_rejected_and_kept() {
    let root = TempDir::new().unwrap();
    let path = root.path().join("notes.txt");
    std::fs::write(&path, b"plain text").unwrap();

    let err = organizer(root.path()).process_one(&path).await.unwrap_err();

    assert!(matches!(err, Error::NotAnArchive { .. }));
    assert!(path.exists());
}

#[tokio::test]
async fn vanished_archive_is_already_processed() {
    let root = TempDir::new().unwrap();
    let err = organizer(root.path())
        .process_one(&root.path().join("gone.zip"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AlreadyProcessed { .. }));
}

#[tokio::test]
async fn process_root_is_a_no_op_on_organized_tree() {
    let root = TempDir::new().unwrap();
    std::fs::create_dir_all(root.path().join("RJ1")).unwrap();
    std::fs::write(root.path().join("RJ1/a.txt"), b"a").unwrap();
    std::fs::write(root.path().join("notes.txt"), b"n").unwrap();

    let report = organizer(root.path()).process_root().await.unwrap();

    assert!(report.outcomes.is_empty());
    assert_eq!(listing(root.path()), vec!["RJ1", "notes.txt"]);
}

#[tokio::test]
async fn process_root_handles_every_archive() {
    let root = TempDir::new().unwrap();
    write_zip(&root.path().join("a.zip"), &[("RJ1/a.txt", b"a")], None);
    write_zip(&root.path().join("b.zip"), &[("RJ2/b.txt", b"b")], None);

    let report = organizer(root.path()).process_root().await.unwrap();

    assert_eq!(report.outcomes.len(), 2);
    assert!(report.is_success());
    assert_eq!(listing(root.path()), vec!["RJ1", "RJ2"]);
}

#[tokio::test]
async fn events_follow_the_pipeline() {
    let root = TempDir::new().unwrap();
    let archive = root.path().join("RJ9.zip");
    write_zip(&archive, &[("RJ9/a.txt", b"a")], None);

    let org = organizer(root.path());
    let mut events = org.subscribe();
    org.process(&archive).await;

    assert!(matches!(
        events.try_recv().unwrap(),
        Event::Extracted { entries: 1, .. }
    ));
    match events.try_recv().unwrap() {
        Event::Organized {
            disposition,
            outputs,
            ..
        } => {
            assert_eq!(disposition, Disposition::KeepAsIs);
            assert_eq!(outputs, vec![root.path().join("RJ9")]);
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn failure_emits_failed_event() {
    let root = TempDir::new().unwrap();
    let path = root.path().join("broken.zip");
    std::fs::write(&path, b"not a zip at all").unwrap();

    let org = organizer(root.path());
    let mut events = org.subscribe();
    org.process(&path).await;

    match events.try_recv().unwrap() {
        Event::Failed { code, .. } => assert_eq!(code, "extraction_failed"),
        other => panic!("unexpected event {other:?}"),
    }
    assert!(path.exists());
}
