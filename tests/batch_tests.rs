//! 批处理协调器集成测试
//!
//! 验证每个文件恰好被处理一次、进度单调、最终快照以及各种空目录/失败场景。


use ncm_batch_decoder::{
    BatchDecoder, BatchProgress, DecodeSettings, ErrorCategory, NcmDecoder, NcmErrorKind,
    WorkerPool,
};
use ncm_test_fixtures::{NcmFixture, log, pseudo_random_bytes};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn batch_decoder(max_size: usize) -> BatchDecoder {
    BatchDecoder::with_pool(Arc::new(WorkerPool::new(max_size, NcmDecoder::new())))
}

/// 写入 `good` 个正常文件和 `bad` 个魔数错误的文件，返回 (输入路径 -> 明文)
fn populate(dir: &Path, good: usize, bad: usize) -> HashMap<PathBuf, Vec<u8>> {
    let mut expected = HashMap::new();
    for i in 0..good {
        let audio = pseudo_random_bytes(10_000 + i * 977, i as u64);
        let format = if i % 2 == 0 { "flac" } else { "mp3" };
        let path = NcmFixture::new(audio.clone())
            .with_format(format)
            .write_to(dir, &format!("good_{i:02}.ncm"));
        expected.insert(path, audio);
    }
    for i in 0..bad {
        NcmFixture::new(vec![0u8; 100])
            .with_magic(*b"BADMAGIC")
            .write_to(dir, &format!("bad_{i:02}.ncm"));
    }
    expected
}

/// 进度流的通用不变式
fn assert_progress_invariants(events: &[BatchProgress], total: usize) {
    assert!(!events.is_empty());
    for pair in events.windows(2) {
        assert!(pair[0].completed <= pair[1].completed, "成功数倒退");
        assert!(pair[0].failed <= pair[1].failed, "失败数倒退");
    }
    for event in events {
        assert_eq!(event.total, total);
        assert!(event.processed() <= total);
    }

    let last = events.last().unwrap();
    assert_eq!(last.processed(), total);
    assert!(last.current_file.is_none());
    assert!(last.result.is_none());
    // 只有最后一个快照没有 current_file
    assert!(events[..events.len() - 1]
        .iter()
        .all(|event| event.current_file.is_some()));
}

#[test]
fn test_every_file_processed_exactly_once() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let expected = populate(input.path(), 12, 3);
    // 非 .ncm 文件与子目录被忽略
    fs::write(input.path().join("cover.jpg"), b"jpg").unwrap();
    fs::create_dir(input.path().join("nested")).unwrap();

    let batch = batch_decoder(4);
    let events: Vec<BatchProgress> = batch
        .decode_directory(input.path(), output.path(), 4, 64 * 1024, 2)
        .collect();

    assert_progress_invariants(&events, 15);
    let last = events.last().unwrap();
    assert_eq!(last.completed, 12);
    assert_eq!(last.failed, 3);

    // 15 个认领快照 + 15 个完成快照 + 1 个最终快照
    assert_eq!(events.len(), 31);

    let results: Vec<_> = events.iter().filter_map(|e| e.result.as_ref()).collect();
    assert_eq!(results.len(), 15);

    let mut seen: HashMap<&Path, usize> = HashMap::new();
    for result in &results {
        *seen.entry(result.input_path.as_path()).or_default() += 1;
    }
    assert_eq!(seen.len(), 15);
    assert!(seen.values().all(|count| *count == 1), "存在重复处理的文件");

    for result in results {
        match expected.get(&result.input_path) {
            Some(audio) => {
                let output_path = result.output_path().expect("正常文件应解码成功");
                assert_eq!(output_path.parent().unwrap(), output.path());
                assert_eq!(&fs::read(output_path).unwrap(), audio);
            }
            None => assert_eq!(result.error_kind(), Some(NcmErrorKind::InvalidFormat)),
        }
    }

    assert!(output.path().join("good_00.flac").exists());
    assert!(output.path().join("good_01.mp3").exists());
    assert!(batch.pool().stats().live <= 4);
    log("批处理每个文件恰好处理一次", "Each file was processed exactly once");
}

#[test]
fn test_empty_directory_yields_single_snapshot() {
    let input = tempfile::tempdir().unwrap();
    fs::write(input.path().join("readme.txt"), b"not ncm").unwrap();
    let output = tempfile::tempdir().unwrap();

    let events: Vec<BatchProgress> = batch_decoder(2)
        .decode_directory(input.path(), output.path(), 2, 64 * 1024, 8)
        .collect();

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].total, 0);
    assert_eq!(events[0].completed, 0);
    assert_eq!(events[0].failed, 0);
    assert!(events[0].current_file.is_none());
}

#[test]
fn test_missing_directory_yields_single_snapshot() {
    let output = tempfile::tempdir().unwrap();
    let summary = batch_decoder(2)
        .decode_directory("/no/such/ncm/dir", output.path(), 2, 64 * 1024, 8)
        .wait();

    assert_eq!(summary.total, 0);
    assert_eq!(summary.processed, 0);
    assert_eq!(summary.failed, 0);
}

#[test]
fn test_empty_batch_still_creates_output_directory() {
    let input = tempfile::tempdir().unwrap();
    let output_root = tempfile::tempdir().unwrap();

    let empty_output = output_root.path().join("empty").join("nested");
    let summary = batch_decoder(2)
        .decode_directory(input.path(), &empty_output, 2, 64 * 1024, 8)
        .wait();
    assert_eq!(summary.total, 0);
    assert!(empty_output.is_dir(), "空目录批次也应创建输出目录");

    let missing_output = output_root.path().join("missing").join("nested");
    let summary = batch_decoder(2)
        .decode_directory("/no/such/ncm/dir", &missing_output, 2, 64 * 1024, 8)
        .wait();
    assert_eq!(summary.total, 0);
    assert!(missing_output.is_dir());
    assert_eq!(fs::read_dir(&missing_output).unwrap().count(), 0);
}

#[test]
fn test_concurrency_larger_than_file_count() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    populate(input.path(), 2, 0);

    let batch = batch_decoder(32);
    let events: Vec<BatchProgress> = batch
        .decode_directory(input.path(), output.path(), 100, 64 * 1024, 8)
        .collect();

    assert_progress_invariants(&events, 2);
    assert_eq!(events.last().unwrap().completed, 2);
    // 逻辑 worker 数不超过文件数
    assert!(batch.pool().stats().live <= 2);
}

#[test]
fn test_whole_file_mode_with_single_worker() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let expected = populate(input.path(), 5, 1);

    let settings = DecodeSettings {
        concurrency: 1,
        whole_file: true,
        ..DecodeSettings::default()
    };
    let events: Vec<BatchProgress> = batch_decoder(1)
        .decode_directory_with(input.path(), output.path(), &settings)
        .collect();

    assert_progress_invariants(&events, 6);

    // 单个 worker 时认领与完成严格交替
    let claimed: Vec<&str> = events
        .iter()
        .filter(|e| e.result.is_none())
        .filter_map(|e| e.current_file.as_deref())
        .collect();
    let mut sorted = claimed.clone();
    sorted.sort();
    assert_eq!(claimed, sorted, "单 worker 应按排序顺序认领文件");

    let summary = ncm_batch_decoder::BatchSummary::from_progress(events);
    assert_eq!(summary.processed, expected.len());
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.error_stats[&ErrorCategory::Format], vec!["bad_00.ncm"]);
}

#[test]
fn test_output_directory_is_created() {
    let input = tempfile::tempdir().unwrap();
    let output_root = tempfile::tempdir().unwrap();
    let output = output_root.path().join("a").join("b");
    populate(input.path(), 3, 0);

    let summary = batch_decoder(2)
        .decode_directory(input.path(), &output, 2, 64 * 1024, 8)
        .wait();

    assert_eq!(summary.processed, 3);
    assert!(output.is_dir());
    assert_eq!(fs::read_dir(&output).unwrap().count(), 3);
}

#[test]
fn test_disposed_pool_marks_files_failed() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    populate(input.path(), 4, 0);

    let batch = batch_decoder(2);
    batch.pool().dispose();

    let events: Vec<BatchProgress> = batch
        .decode_directory(input.path(), output.path(), 2, 64 * 1024, 8)
        .collect();

    assert_progress_invariants(&events, 4);
    let last = events.last().unwrap();
    assert_eq!(last.completed, 0);
    assert_eq!(last.failed, 4);
    assert!(events
        .iter()
        .filter_map(|e| e.result.as_ref())
        .all(|r| r.error_kind() == Some(NcmErrorKind::PoolDisposed)));
}

#[test]
fn test_dropping_run_early_still_finishes_batch() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    populate(input.path(), 6, 0);

    let batch = batch_decoder(3);
    {
        let mut run = batch.decode_directory(input.path(), output.path(), 3, 64 * 1024, 8);
        assert!(run.next().is_some());
        // drop 时等待批处理跑完
    }

    assert_eq!(fs::read_dir(output.path()).unwrap().count(), 6);
    assert_eq!(batch.pool().stats().busy, 0);
}

#[test]
fn test_batch_decoder_is_reusable() {
    let input = tempfile::tempdir().unwrap();
    populate(input.path(), 3, 0);
    let batch = batch_decoder(2);

    for _ in 0..2 {
        let output = tempfile::tempdir().unwrap();
        let summary = batch
            .decode_directory(input.path(), output.path(), 2, 64 * 1024, 8)
            .wait();
        assert_eq!(summary.processed, 3);
    }
    assert!(batch.pool().stats().live <= 2);
}
