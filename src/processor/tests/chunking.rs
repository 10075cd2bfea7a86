//! Full vs chunked reads under both empty-column policies

use super::{test_config, write_extract_file};
use crate::config::{ConvertConfig, EmptyColumnPolicy};
use crate::models::ReadMode;
use crate::processor::BatchConverter;
use std::fs;
use tempfile::TempDir;

/// Column `note` is empty for the first two rows only
const DRUG: &[u8] = b"primaryid$drug_seq$note$blank\n\
1$1$$\n\
2$1$ $\n\
3$2$late value$\n\
4$1$$\n\
5$3$$\n";

async fn convert(config: ConvertConfig, temp_dir: &TempDir) -> (String, ReadMode) {
    let mut converter = BatchConverter::new(config).unwrap();
    let report = converter.run().await.unwrap();
    assert_eq!(report.counts.ok, 1);
    let mode = report.results[0].mode.unwrap();
    let text = fs::read_to_string(temp_dir.path().join("out/2020/Q1/DRUG20Q1.csv")).unwrap();
    (text, mode)
}

#[tokio::test]
async fn test_global_policy_matches_full_read() {
    let full_dir = TempDir::new().unwrap();
    write_extract_file(&full_dir, "2020", "Q1", "DRUG20Q1.txt", DRUG);
    let (full, full_mode) = convert(test_config(&full_dir), &full_dir).await;

    let chunk_dir = TempDir::new().unwrap();
    write_extract_file(&chunk_dir, "2020", "Q1", "DRUG20Q1.txt", DRUG);
    let config = test_config(&chunk_dir)
        .with_chunking(0, 2)
        .with_empty_column_policy(EmptyColumnPolicy::Global);
    let (chunked, chunked_mode) = convert(config, &chunk_dir).await;

    assert_eq!(full_mode, ReadMode::Full);
    assert_eq!(chunked_mode, ReadMode::Chunked);
    assert_eq!(full, chunked);
    assert_eq!(
        full,
        "primaryid,drug_seq,note\n1,1,\n2,1,\n3,2,late value\n4,1,\n5,3,\n"
    );
}

#[tokio::test]
async fn test_per_chunk_policy_loses_late_columns() {
    let temp_dir = TempDir::new().unwrap();
    write_extract_file(&temp_dir, "2020", "Q1", "DRUG20Q1.txt", DRUG);
    let config = test_config(&temp_dir)
        .with_chunking(0, 2)
        .with_empty_column_policy(EmptyColumnPolicy::PerChunk);

    let (chunked, mode) = convert(config, &temp_dir).await;

    // The first chunk fixes the header without `note`; later chunks are
    // aligned onto it and their `note` values are dropped
    assert_eq!(mode, ReadMode::Chunked);
    assert_eq!(chunked, "primaryid,drug_seq\n1,1\n2,1\n3,2\n4,1\n5,3\n");
}

#[tokio::test]
async fn test_chunked_header_only_input() {
    let temp_dir = TempDir::new().unwrap();
    write_extract_file(&temp_dir, "2020", "Q1", "DRUG20Q1.txt", b"primaryid$drug_seq$\n");
    let config = test_config(&temp_dir).with_chunking(0, 2);

    let (text, mode) = convert(config, &temp_dir).await;

    assert_eq!(mode, ReadMode::Chunked);
    assert_eq!(text, "primaryid,drug_seq,Unnamed: 2\n");
}
