// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! STF file round-trips: sink rotation and framing-error recovery.

use std::path::PathBuf;
use std::sync::Arc;
use tempfile::tempdir;
use tfdist::data::EquipmentIdentifier;
use tfdist::file::{FormatError, SinkConfig, StfFileReader, StfFileSink, StfFileWriter};
use tfdist::headers::{DataDescription, DataOrigin};
use tfdist::queue::ConcurrentFifo;
use tfdist::transport::Message;
use tfdist::SubTimeFrame;

fn cru(link: u64) -> EquipmentIdentifier {
    EquipmentIdentifier::new(DataDescription::CRU_DATA, DataOrigin::CRU, link)
}

fn stf_with_id_payload(id: u64) -> SubTimeFrame {
    let mut stf = SubTimeFrame::new(0, id);
    stf.add_hb_frame(cru(1), Message::from_vec(vec![id as u8; 64]))
        .expect("add");
    stf.add_hb_frame(cru(2), Message::from_vec(vec![id as u8; 32]))
        .expect("add");
    stf
}

fn session_files(session: &PathBuf) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(session)
        .expect("session dir")
        .map(|e| e.expect("entry").path())
        .collect();
    files.sort();
    files
}

#[test]
fn sink_rotation_by_count_and_full_readback() {
    let dir = tempdir().expect("tempdir");
    let config = SinkConfig {
        enabled: true,
        root_dir: dir.path().to_path_buf(),
        stfs_per_file: 2,
        ..Default::default()
    };

    let in_q = Arc::new(ConcurrentFifo::new());
    let out_q = Arc::new(ConcurrentFifo::new());
    let sink = StfFileSink::new(config, in_q.clone(), out_q.clone()).expect("sink");
    let session = sink.session_dir().clone();
    let handle = sink.start();

    let ids = [10u64, 11, 12, 13, 14];
    for &id in &ids {
        in_q.push(stf_with_id_payload(id));
    }
    in_q.stop();
    handle.join();

    // every STF also flowed downstream
    out_q.stop();
    for &id in &ids {
        assert_eq!(out_q.pop().expect("forwarded").id(), Some(id));
    }

    // two full files plus one with the leftover STF
    let files = session_files(&session);
    assert_eq!(files.len(), 3);
    assert_eq!(files[0].file_name().unwrap(), "000000");
    assert_eq!(files[1].file_name().unwrap(), "000001");
    assert_eq!(files[2].file_name().unwrap(), "000002");

    // reading the files in order reconstructs all five STFs
    let mut next_id = ids.iter();
    for (file, expect_count) in files.iter().zip([2usize, 2, 1]) {
        let mut reader = StfFileReader::open(file).expect("open");
        for _ in 0..expect_count {
            let want = *next_id.next().expect("id");
            let stf = reader.read(want).expect("read").expect("record");
            assert_eq!(stf.id(), Some(want));
            assert_eq!(stf.equipment_count(), 2);
            assert_eq!(stf.data_size(), 96);

            let frames = stf.equipment(&cru(1)).expect("equipment").frames();
            assert_eq!(frames.len(), 1);
            assert_eq!(frames[0].data(), vec![want as u8; 64].as_slice());
        }
        assert!(reader.read(0).expect("eof").is_none());
    }
}

#[test]
fn sink_rotation_by_size() {
    let dir = tempdir().expect("tempdir");
    let config = SinkConfig {
        enabled: true,
        root_dir: dir.path().to_path_buf(),
        stfs_per_file: u64::MAX,
        // every record is larger than this, so each write rotates
        max_file_size: 64,
        ..Default::default()
    };

    let in_q = Arc::new(ConcurrentFifo::new());
    let out_q = Arc::new(ConcurrentFifo::new());
    let sink = StfFileSink::new(config, in_q.clone(), out_q.clone()).expect("sink");
    let session = sink.session_dir().clone();
    let handle = sink.start();

    for id in 0..3 {
        in_q.push(stf_with_id_payload(id));
    }
    in_q.stop();
    handle.join();
    out_q.stop();

    assert_eq!(session_files(&session).len(), 3);
}

#[test]
fn truncated_final_record_fails_cleanly() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("000000");

    {
        let mut writer = StfFileWriter::create(&path).expect("create");
        for id in 0..3u64 {
            writer.write(&stf_with_id_payload(id)).expect("write");
        }
    }

    // chop the last 100 bytes off the final record
    let len = std::fs::metadata(&path).expect("stat").len();
    std::fs::OpenOptions::new()
        .write(true)
        .open(&path)
        .expect("open rw")
        .set_len(len - 100)
        .expect("truncate");

    let mut reader = StfFileReader::open(&path).expect("open");
    for id in 0..2u64 {
        let stf = reader.read(id).expect("read").expect("record");
        assert_eq!(stf.id(), Some(id));
    }

    let res = reader.read(2);
    assert!(matches!(res, Err(FormatError::ShortFile { .. })));
    assert!(!reader.is_usable());
}
