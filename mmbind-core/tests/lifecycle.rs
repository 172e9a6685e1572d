mod common;

use common::{open_fixture, reference_fasta, QUERY1};
use mmbind_core::bridge::Fault;
use mmbind_core::{Aligner, FixtureEngine, Mm2Error, Runtime};

#[test]
fn close_refused_while_leased() {
    let (_file, engine, index) = open_fixture();

    let lease = index.acquire().unwrap();
    assert_eq!(index.ref_count(), 1);
    match index.close() {
        Err(Mm2Error::InUse { borrowers }) => assert_eq!(borrowers, 1),
        other => panic!("expected InUse, got {:?}", other),
    }
    assert!(index.is_open());

    drop(lease);
    index.close().unwrap();
    assert!(!index.is_open());
    assert_eq!(engine.open_indices(), 0);

    assert!(matches!(Aligner::new(&index), Err(Mm2Error::Closed(_))));
    assert!(matches!(index.acquire(), Err(Mm2Error::Closed(_))));
}

#[test]
fn closing_twice_destroys_once() {
    let (_file, engine, index) = open_fixture();
    index.close().unwrap();
    index.close().unwrap();
    drop(index);
    assert_eq!(engine.open_indices(), 0);
}

#[test]
fn names_survive_close_once_cached() {
    let (_file, _engine, index) = open_fixture();
    assert_eq!(index.ref_names().unwrap().len(), 2);
    index.close().unwrap();
    assert_eq!(index.ref_name(0).unwrap(), "ref1");
    assert!(matches!(index.ref_name(7), Err(Mm2Error::RefIdOutOfRange { id: 7, count: 2 })));
}

#[test]
fn names_unavailable_if_never_fetched() {
    let (_file, _engine, index) = open_fixture();
    index.close().unwrap();
    assert!(matches!(index.ref_names(), Err(Mm2Error::Closed(_))));
}

#[test]
fn no_buffers_leak_on_any_path() {
    let (_file, engine, index) = open_fixture();
    {
        let mut aligner = Aligner::new(&index).unwrap();
        aligner.align_seqs(&[QUERY1, QUERY1]).unwrap();

        engine.inject(Fault::FailAlign);
        assert!(matches!(aligner.align_seqs(&[QUERY1]), Err(Mm2Error::AlignmentFailed)));

        engine.inject(Fault::TruncateResults);
        assert!(matches!(aligner.align_seqs(&[QUERY1]), Err(Mm2Error::MalformedResult(_))));

        engine.inject(Fault::FailAlloc);
        assert!(matches!(aligner.align_seqs(&[QUERY1]), Err(Mm2Error::Allocation(_))));

        engine.clear_faults();
        assert_eq!(aligner.align_seqs(&[QUERY1]).unwrap()[0][0].ref_start, 0);
    }
    assert_eq!(engine.live_buffers(), 0);
    assert_eq!(index.ref_count(), 0);
    assert!(engine.total_allocations() > 0);
}

#[test]
fn options_creation_failure() {
    let (_file, engine, index) = open_fixture();
    engine.inject(Fault::FailOptions);
    assert!(matches!(Aligner::new(&index), Err(Mm2Error::Allocation(_))));
    assert_eq!(engine.live_buffers(), 0);
}

#[test]
fn engine_version_mismatch() {
    let file = reference_fasta();
    let runtime = Runtime::new(FixtureEngine::with_options_size(184)).unwrap();
    let engine = runtime.bridge();
    let index = runtime.open_index(file.path()).unwrap();

    match Aligner::new(&index) {
        Err(Mm2Error::VersionMismatch { expected, actual }) => {
            assert_eq!(expected, 192);
            assert_eq!(actual, 184);
        }
        Err(other) => panic!("expected VersionMismatch, got {:?}", other),
        Ok(_) => panic!("expected VersionMismatch"),
    }
    assert_eq!(engine.live_buffers(), 0);
}

#[test]
fn every_index_comes_from_an_initialized_engine() {
    let (_file, engine, index) = open_fixture();
    let mut aligner = Aligner::new(&index).unwrap();
    assert!(!aligner.align_one(QUERY1).unwrap().is_empty());
    assert_eq!(engine.initializations(), 1);

    let runtime = Runtime::new(FixtureEngine::new()).unwrap();
    let file = reference_fasta();
    let handles: Vec<_> = (0..3).map(|_| runtime.open_index(file.path()).unwrap()).collect();
    assert_eq!(handles.len(), 3);
    assert_eq!(runtime.bridge().initializations(), 1);
    assert_eq!(runtime.bridge().open_indices(), 3);
}

#[test]
fn unreadable_index() {
    let runtime = Runtime::new(FixtureEngine::new()).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let garbage = dir.path().join("garbage.mmi");
    std::fs::write(&garbage, b"\x00\x01not an index").unwrap();

    assert!(matches!(runtime.open_index(&garbage), Err(Mm2Error::Open { .. })));
    let missing = runtime.open_index(dir.path().join("missing.mmi"));
    assert!(matches!(missing, Err(Mm2Error::Open { .. })));
    assert_eq!(runtime.bridge().open_indices(), 0);
}
