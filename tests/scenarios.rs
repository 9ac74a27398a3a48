use std::fs;

use anyhow::Result;
use recog::{
    CorruptPolicy, Embedding, Error, ErrorKind, FsStore, IdentityStore, MatchEngine, MemoryStore,
    RecordStore, DEFAULT_THRESHOLD,
};

fn emb(v: &[f32]) -> Embedding {
    Embedding::from(v)
}

fn alice_then_query<B: RecordStore>(store: &IdentityStore<B>) -> Result<()> {
    let res = store.enroll("Alice", vec![emb(&[1.0, 0.0, 0.0]), emb(&[0.9, 0.1, 0.0])])?;
    assert_eq!(res.identifier, "alice");
    assert_eq!(res.sample_count, 2);

    let profile = store.load_profile("alice")?;
    assert!((profile.centroid.vector[0] - 0.95).abs() < 1e-6);
    assert!((profile.centroid.vector[1] - 0.05).abs() < 1e-6);
    assert_eq!(profile.centroid.vector[2], 0.0);

    let engine = MatchEngine::new(store, DEFAULT_THRESHOLD);
    let m = engine.match_embedding(&emb(&[1.0, 0.0, 0.0]))?;
    assert!(m.accepted);
    assert_eq!(m.identifier.as_deref(), Some("alice"));
    assert_eq!(m.display_name.as_deref(), Some("Alice"));
    assert_eq!(m.score, 0.999);
    Ok(())
}

fn bob_opposite<B: RecordStore>(store: &IdentityStore<B>) -> Result<()> {
    store.enroll("Bob", vec![emb(&[0.0, 1.0, 0.0])])?;

    let engine = MatchEngine::new(store, DEFAULT_THRESHOLD);
    let m = engine.match_embedding(&emb(&[0.0, -1.0, 0.0]))?;
    assert!(!m.accepted);
    assert_eq!(m.identifier, None);
    assert_eq!(m.score, -1.0);
    Ok(())
}

fn empty_store<B: RecordStore>(store: &IdentityStore<B>) -> Result<()> {
    let engine = MatchEngine::new(store, DEFAULT_THRESHOLD);
    for q in [[1.0, 0.0, 0.0], [0.2, -0.7, 0.1]] {
        let m = engine.match_embedding(&emb(&q))?;
        assert!(!m.accepted);
        assert_eq!(m.score, -1.0);
    }
    Ok(())
}

#[test]
fn test_scenarios_in_memory() -> Result<()> {
    env_logger::try_init().ok();
    empty_store(&IdentityStore::new(MemoryStore::new()))?;
    alice_then_query(&IdentityStore::new(MemoryStore::new()))?;
    bob_opposite(&IdentityStore::new(MemoryStore::new()))?;
    Ok(())
}

#[test]
fn test_scenarios_on_disk() -> Result<()> {
    env_logger::try_init().ok();
    let tmp = tempfile::tempdir()?;
    empty_store(&IdentityStore::new(FsStore::new(tmp.path().join("a"))))?;
    alice_then_query(&IdentityStore::new(FsStore::new(tmp.path().join("b"))))?;
    bob_opposite(&IdentityStore::new(FsStore::new(tmp.path().join("c"))))?;
    Ok(())
}

#[test]
fn test_survives_reopen() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    {
        let store = IdentityStore::new(FsStore::new(tmp.path()));
        store.enroll("Alice", vec![emb(&[1.0, 0.0, 0.0])])?;
        store.enroll("Bob", vec![emb(&[0.0, 1.0, 0.0])])?;
    }

    let store = IdentityStore::new(FsStore::new(tmp.path()));
    let mut ids: Vec<String> = store.list_identities()?.collect::<Result<_, _>>()?;
    ids.sort();
    assert_eq!(ids, vec!["alice".to_string(), "bob".to_string()]);

    let m = MatchEngine::new(&store, DEFAULT_THRESHOLD).match_embedding(&emb(&[0.0, 0.8, 0.1]))?;
    assert_eq!(m.identifier.as_deref(), Some("bob"));
    Ok(())
}

#[test]
fn test_reenroll_replaces_on_disk() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let store = IdentityStore::new(FsStore::new(tmp.path()));

    store.enroll("Carol", vec![emb(&[1.0, 0.0]), emb(&[0.9, 0.1]), emb(&[0.8, 0.2])])?;
    store.enroll("Carol", vec![emb(&[0.0, 1.0])])?;

    let set = store.load_samples("carol")?;
    assert_eq!(set.samples, vec![emb(&[0.0, 1.0])]);
    assert_eq!(store.load_profile("carol")?.centroid, emb(&[0.0, 1.0]));

    let m = MatchEngine::new(&store, DEFAULT_THRESHOLD).match_embedding(&emb(&[1.0, 0.0]))?;
    assert!(!m.accepted);
    Ok(())
}

#[test]
fn test_enumeration_is_restartable() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let store = IdentityStore::new(FsStore::new(tmp.path()));
    for name in ["Ann", "Ben", "Cat"] {
        store.enroll(name, vec![emb(&[1.0, 2.0])])?;
    }

    let first: Vec<String> = store.list_identities()?.collect::<Result<_, _>>()?;
    let second: Vec<String> = store.list_identities()?.collect::<Result<_, _>>()?;
    assert_eq!(first.len(), 3);
    assert_eq!(first.len(), second.len());
    Ok(())
}

fn corrupt_fixture() -> Result<(tempfile::TempDir, IdentityStore<FsStore>)> {
    let tmp = tempfile::tempdir()?;
    let store = IdentityStore::new(FsStore::new(tmp.path()));
    store.enroll("Alice", vec![emb(&[1.0, 0.0])])?;
    store.enroll("Mallory", vec![emb(&[0.0, 1.0])])?;
    fs::write(tmp.path().join("mallory").join("profile.json"), b"{\"half\":")?;
    Ok((tmp, store))
}

#[test]
fn test_corrupt_record_aborts_by_default() -> Result<()> {
    let (_tmp, store) = corrupt_fixture()?;

    let err = MatchEngine::new(&store, DEFAULT_THRESHOLD)
        .match_embedding(&emb(&[1.0, 0.0]))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CorruptData);
    assert!(matches!(err, Error::Corrupt { ref identifier, .. } if identifier == "mallory"));
    Ok(())
}

#[test]
fn test_corrupt_record_skipped_on_request() -> Result<()> {
    let (_tmp, store) = corrupt_fixture()?;

    let m = MatchEngine::new(&store, DEFAULT_THRESHOLD)
        .with_corrupt_policy(CorruptPolicy::Skip)
        .match_embedding(&emb(&[1.0, 0.0]))?;
    assert!(m.accepted);
    assert_eq!(m.identifier.as_deref(), Some("alice"));
    Ok(())
}

#[test]
fn test_reenroll_heals_corrupt_record() -> Result<()> {
    let (_tmp, store) = corrupt_fixture()?;
    store.enroll("Mallory", vec![emb(&[0.0, 1.0])])?;

    let m = MatchEngine::new(&store, DEFAULT_THRESHOLD).match_embedding(&emb(&[0.0, 1.0]))?;
    assert_eq!(m.identifier.as_deref(), Some("mallory"));
    Ok(())
}

#[test]
fn test_dimension_mismatch_fails_scan() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let store = IdentityStore::new(FsStore::new(tmp.path()));
    store.enroll("Alice", vec![emb(&[1.0, 0.0, 0.0])])?;

    let err = MatchEngine::new(&store, DEFAULT_THRESHOLD)
        .match_embedding(&emb(&[1.0, 0.0, 0.0, 0.0]))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    Ok(())
}

/// Readers running alongside repeated enrollments only ever see one of the
/// published versions, never a torn one.
#[test]
fn test_concurrent_enroll_and_match() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let store = IdentityStore::new(FsStore::new(tmp.path()));
    store.enroll("Alice", vec![emb(&[1.0, 0.0])])?;

    std::thread::scope(|s| -> Result<()> {
        let writer = s.spawn(|| -> Result<()> {
            for i in 0..50 {
                let v = if i % 2 == 0 { [0.0, 1.0] } else { [1.0, 0.0] };
                store.enroll("Alice", vec![emb(&v), emb(&v)])?;
            }
            Ok(())
        });

        let engine = MatchEngine::new(&store, DEFAULT_THRESHOLD);
        for _ in 0..50 {
            let profile = store.load_profile("alice")?;
            let c = &profile.centroid.vector;
            assert!(c == &vec![1.0, 0.0] || c == &vec![0.0, 1.0], "{c:?}");

            let m = engine.match_embedding(&emb(&[1.0, 0.0]))?;
            assert!(m.score == 1.0 || m.score == 0.0, "{}", m.score);

            let set = store.load_samples("alice")?;
            assert!(set.samples.len() == 1 || set.samples.len() == 2);
        }

        writer.join().expect("writer panicked")
    })?;

    let names: Vec<String> = fs::read_dir(tmp.path().join("alice"))?
        .map(|e| e.map(|e| e.file_name().to_string_lossy().into_owned()))
        .collect::<std::io::Result<_>>()?;
    assert_eq!(names.len(), 2, "{names:?}");
    Ok(())
}

#[test]
fn test_large_samples_stay_matchable_on_disk() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let store = IdentityStore::new(FsStore::new(tmp.path()));
    store.enroll("Huge", vec![emb(&[3.0e38, 1.0]), emb(&[3.0e38, 1.0])])?;

    let profile = store.load_profile("huge")?;
    assert_eq!(profile.centroid, emb(&[3.0e38, 1.0]));

    let m = MatchEngine::new(&store, DEFAULT_THRESHOLD).match_embedding(&emb(&[1.0, 0.0]))?;
    assert!(m.accepted);
    assert_eq!(m.identifier.as_deref(), Some("huge"));
    Ok(())
}

/// A publish whose final rename fails reports an internal error, leaves no
/// new files behind and does not disturb other identities.
#[test]
fn test_failed_publish_leaves_no_partial_state() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let store = IdentityStore::new(FsStore::new(tmp.path()));
    store.enroll("Bob", vec![emb(&[0.0, 1.0])])?;

    // A non-empty directory where profile.json belongs makes the rename fail.
    let blocked = tmp.path().join("alice").join("profile.json");
    fs::create_dir_all(blocked.join("occupied"))?;

    let err = store.enroll("Alice", vec![emb(&[1.0, 0.0])]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);

    let names: Vec<String> = fs::read_dir(tmp.path().join("alice"))?
        .map(|e| e.map(|e| e.file_name().to_string_lossy().into_owned()))
        .collect::<std::io::Result<_>>()?;
    assert_eq!(names, vec!["profile.json".to_string()]);

    let ids: Vec<String> = store.list_identities()?.collect::<Result<_, _>>()?;
    assert_eq!(ids, vec!["bob".to_string()]);
    assert_eq!(store.load_profile("bob")?.centroid, emb(&[0.0, 1.0]));
    assert_eq!(store.load_samples("bob")?.samples, vec![emb(&[0.0, 1.0])]);

    let m = MatchEngine::new(&store, DEFAULT_THRESHOLD).match_embedding(&emb(&[0.0, 1.0]))?;
    assert_eq!(m.identifier.as_deref(), Some("bob"));
    Ok(())
}

/// A failed re-enrollment keeps the previously published record readable.
#[test]
fn test_failed_reenroll_keeps_previous_record() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let store = IdentityStore::new(FsStore::new(tmp.path()));
    store.enroll("Alice", vec![emb(&[1.0, 0.0])])?;

    let err = store
        .enroll("Alice", vec![emb(&[0.0, 1.0]), emb(&[0.0, 1.0, 0.0])])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    assert_eq!(store.load_profile("alice")?.centroid, emb(&[1.0, 0.0]));
    assert_eq!(store.load_samples("alice")?.samples, vec![emb(&[1.0, 0.0])]);
    Ok(())
}
