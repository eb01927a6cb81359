//! End-to-end tests of the dataset session
//!
//! Covers the interaction between:
//! - Folder persistence
//! - Extent layout and recovery
//! - Segmented I/O through the write-behind cache
//! - Frame codecs

#[cfg(test)]
mod tests {
    use crate::config::DATASET_CONFIG_FILE;
    use crate::core::codec::Uncompressed;
    use crate::core::stream::StreamKind;
    use crate::dataset::DatasetBuilder;
    use crate::error::{ExtentError, Severity};
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn project_path(root: &Path, fs_name: &str) -> PathBuf {
        root.join(fs_name).join("home/proj/sub/line.js")
    }

    /// Three folders, 1000-byte traces in 3 x 384, 300-byte headers in 3 x 120
    fn three_folder_builder(root: &Path) -> (DatasetBuilder, Vec<PathBuf>) {
        let folders: Vec<PathBuf> = ["prim", "sec1", "sec2"]
            .iter()
            .map(|name| project_path(root, name))
            .collect();
        let builder = DatasetBuilder::new(&folders[0])
            .folders(folders.iter().map(|p| p.to_string_lossy().into_owned()))
            .trace_stream(1000, 64)
            .header_stream(300, 30)
            .num_extents(3);
        (builder, folders)
    }

    fn reopen(folders: &[PathBuf]) -> DatasetBuilder {
        DatasetBuilder::new(&folders[0])
            .folders(folders.iter().map(|p| p.to_string_lossy().into_owned()))
    }

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn test_single_folder_write_reopen_read() {
        let temp_dir = TempDir::new().unwrap();
        let path = project_path(temp_dir.path(), "prim");

        let mut dataset = DatasetBuilder::new(&path)
            .trace_stream(4096, 512)
            .header_stream(1024, 64)
            .num_extents(4)
            .create()
            .unwrap();
        dataset.write(StreamKind::TraceData, 1000, b"samples").unwrap();
        dataset.write(StreamKind::TraceHeaders, 64, b"header").unwrap();
        dataset.close().unwrap();

        // No explicit folders: the persisted "." entry resolves to the dataset
        let mut dataset = DatasetBuilder::new(&path).open().unwrap();
        assert_eq!(dataset.folders().len(), 1);
        assert_eq!(dataset.extents(StreamKind::TraceData).num_extents(), 4);
        assert_eq!(dataset.extents(StreamKind::TraceData).extent_size(), 1024);

        let mut buf = [0u8; 7];
        dataset.read(StreamKind::TraceData, 1000, &mut buf).unwrap();
        assert_eq!(&buf, b"samples");
        let mut buf = [0u8; 6];
        dataset.read(StreamKind::TraceHeaders, 64, &mut buf).unwrap();
        assert_eq!(&buf, b"header");
    }

    #[test]
    fn test_multi_folder_placement_and_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let (builder, folders) = three_folder_builder(temp_dir.path());

        let mut dataset = builder.create().unwrap();
        let data = pattern(1000);
        dataset.write(StreamKind::TraceData, 0, &data).unwrap();
        dataset.close().unwrap();

        // One extent per folder, in folder order
        for (i, folder) in folders.iter().enumerate() {
            let file = folder.join(format!("TraceFile{}", i));
            assert!(file.is_file(), "missing {}", file.display());
        }
        assert_eq!(fs::metadata(folders[2].join("TraceFile2")).unwrap().len(), 232);

        let mut dataset = reopen(&folders).open().unwrap();
        let list = dataset.extents(StreamKind::TraceData);
        assert!(list.entries().iter().all(|e| !e.is_placeholder()));
        assert_eq!(list.entries()[1].path(), folders[1].join("TraceFile1"));

        let mut back = vec![0u8; 1000];
        dataset.read(StreamKind::TraceData, 0, &mut back).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn test_reopen_after_partial_writes_uses_placeholders() {
        let temp_dir = TempDir::new().unwrap();
        let (builder, folders) = three_folder_builder(temp_dir.path());

        let mut dataset = builder.create().unwrap();
        dataset.write(StreamKind::TraceData, 800, b"tail").unwrap();
        dataset.close().unwrap();
        assert!(!folders[0].join("TraceFile0").exists());

        let mut dataset = reopen(&folders).open().unwrap();
        let entries = dataset.extents(StreamKind::TraceData).entries().to_vec();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].name(), "TraceFile0_NOT_FOUND");
        assert_eq!(entries[1].name(), "TraceFile1_NOT_FOUND");
        assert_eq!(entries[2].name(), "TraceFile2");
        assert_eq!(entries[0].path(), folders[0].join("TraceFile0"));
        assert_eq!(entries[2].size(), 1000 - 768);

        // Never-written extents read as zeros
        let mut buf = [0xFFu8; 16];
        dataset.read(StreamKind::TraceData, 10, &mut buf).unwrap();
        assert_eq!(buf, [0u8; 16]);

        // First write into a placeholder materializes it in place
        dataset.write(StreamKind::TraceData, 10, b"head").unwrap();
        dataset.flush().unwrap();
        assert_eq!(dataset.extents(StreamKind::TraceData).entries()[0].name(), "TraceFile0");
        assert!(folders[0].join("TraceFile0").is_file());

        let mut buf = [0u8; 4];
        dataset.read(StreamKind::TraceData, 800, &mut buf).unwrap();
        assert_eq!(&buf, b"tail");
    }

    #[test]
    fn test_write_spanning_extent_boundary() {
        let temp_dir = TempDir::new().unwrap();
        let (builder, folders) = three_folder_builder(temp_dir.path());

        let mut dataset = builder.create().unwrap();
        dataset.write(StreamKind::TraceHeaders, 110, &[7u8; 20]).unwrap();
        dataset.close().unwrap();

        let first = fs::read(folders[0].join("TraceHeaders0")).unwrap();
        let second = fs::read(folders[1].join("TraceHeaders1")).unwrap();
        assert_eq!(&first[110..], &[7u8; 10]);
        assert_eq!(second, vec![7u8; 10]);
    }

    #[test]
    fn test_write_frame_with_uncompressed_codec() {
        let temp_dir = TempDir::new().unwrap();
        let (builder, _) = three_folder_builder(temp_dir.path());
        let mut dataset = builder.create().unwrap();

        let frame = pattern(64);
        let written = dataset
            .write_frame(StreamKind::TraceData, 6, &Uncompressed, &frame)
            .unwrap();
        assert_eq!(written, 64);

        let mut back = vec![0u8; 64];
        dataset.read_frame(StreamKind::TraceData, 6, &mut back).unwrap();
        assert_eq!(back, frame);

        // Frame 6 starts exactly where extent 1 does
        let mut raw = vec![0u8; 64];
        dataset.read(StreamKind::TraceData, 384, &mut raw).unwrap();
        assert_eq!(raw, frame);
    }

    #[test]
    fn test_oversized_frame_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let (builder, _) = three_folder_builder(temp_dir.path());
        let mut dataset = builder.create().unwrap();

        let err = dataset
            .write_frame(StreamKind::TraceHeaders, 0, &Uncompressed, &[1u8; 31])
            .unwrap_err();
        assert!(matches!(err, ExtentError::InvalidArgument(_)));
        assert_eq!(err.severity(), Severity::UserError);

        let mut too_big = vec![0u8; 31];
        assert!(dataset
            .read_frame(StreamKind::TraceHeaders, 0, &mut too_big)
            .is_err());
    }

    #[test]
    fn test_out_of_range_write_is_a_user_error() {
        let temp_dir = TempDir::new().unwrap();
        let (builder, _) = three_folder_builder(temp_dir.path());
        let mut dataset = builder.create().unwrap();

        let err = dataset.write(StreamKind::TraceData, 990, &[0u8; 20]).unwrap_err();
        assert!(matches!(err, ExtentError::PositionOutOfRange { .. }));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_delete_removes_extents_and_folders() {
        let temp_dir = TempDir::new().unwrap();
        let (builder, folders) = three_folder_builder(temp_dir.path());

        let mut dataset = builder.create().unwrap();
        dataset.write(StreamKind::TraceData, 0, &pattern(1000)).unwrap();
        dataset.flush().unwrap();
        dataset.delete().unwrap();

        for folder in &folders {
            assert!(!folder.exists(), "{} still exists", folder.display());
        }
    }

    #[test]
    fn test_open_without_config_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = project_path(temp_dir.path(), "prim");

        DatasetBuilder::new(&path)
            .trace_stream(1000, 64)
            .header_stream(300, 30)
            .num_extents(3)
            .create()
            .unwrap()
            .close()
            .unwrap();
        fs::remove_file(path.join(DATASET_CONFIG_FILE)).unwrap();

        // Extent tables come from the stream metadata, not the config
        let dataset = DatasetBuilder::new(&path).open().unwrap();
        assert_eq!(dataset.config().trace_length, 0);
        assert_eq!(dataset.extents(StreamKind::TraceData).max_file_position(), 1000);
        assert_eq!(dataset.extents(StreamKind::TraceHeaders).extent_size(), 120);
    }

    #[test]
    fn test_open_errors() {
        let temp_dir = TempDir::new().unwrap();
        let path = project_path(temp_dir.path(), "prim");

        let err = DatasetBuilder::new(&path).open().err().unwrap();
        assert!(matches!(err, ExtentError::InvalidArgument(_)));

        DatasetBuilder::new(&path)
            .trace_stream(1000, 64)
            .header_stream(300, 30)
            .create()
            .unwrap()
            .close()
            .unwrap();
        fs::remove_file(path.join(StreamKind::TraceHeaders.metadata_file())).unwrap();

        let err = DatasetBuilder::new(&path).open().err().unwrap();
        assert!(matches!(err, ExtentError::Format(_)));
    }

    #[test]
    fn test_create_rejects_invalid_config() {
        let temp_dir = TempDir::new().unwrap();
        let path = project_path(temp_dir.path(), "prim");

        let err = DatasetBuilder::new(&path)
            .trace_stream(1000, 0)
            .header_stream(300, 30)
            .create()
            .err()
            .unwrap();
        assert!(matches!(err, ExtentError::InvalidArgument(_)));
        assert!(!path.exists());
    }

    #[test]
    fn test_read_only_archive_opens_and_reads() {
        let temp_dir = TempDir::new().unwrap();
        let path = project_path(temp_dir.path(), "prim");

        let mut dataset = DatasetBuilder::new(&path)
            .trace_stream(1000, 64)
            .header_stream(300, 30)
            .num_extents(3)
            .create()
            .unwrap();
        dataset.write(StreamKind::TraceData, 0, &pattern(500)).unwrap();
        dataset.close().unwrap();

        let archived = format!("{},READ_ONLY", path.display());
        let mut dataset = DatasetBuilder::new(&path).folder(archived).open().unwrap();
        let list = dataset.extents(StreamKind::TraceData);
        assert!(!list.accepts_new_extents());
        assert!(list.entries()[2].is_placeholder());

        let mut back = vec![0u8; 1000];
        dataset.read(StreamKind::TraceData, 0, &mut back).unwrap();
        assert_eq!(&back[..500], &pattern(500)[..]);
        assert!(back[500..].iter().all(|&b| b == 0));

        let err = dataset.write(StreamKind::TraceData, 900, b"late").unwrap_err();
        assert_eq!(err.severity(), Severity::UserError);
        assert!(!path.join("TraceFile2").exists());
    }

    #[test]
    fn test_create_refuses_existing_dataset() {
        let temp_dir = TempDir::new().unwrap();
        let (builder, folders) = three_folder_builder(temp_dir.path());

        let mut dataset = builder.clone().create().unwrap();
        dataset.write(StreamKind::TraceData, 0, &pattern(1000)).unwrap();
        dataset.close().unwrap();

        let err = builder.clone().create().err().unwrap();
        assert!(matches!(err, ExtentError::InvalidArgument(_)));

        // Metadata gone, but stale extents in a secondary folder remain
        for file in ["VirtualFolders.toml", "TraceFile.toml", "TraceHeaders.toml", "TraceFile0"] {
            fs::remove_file(folders[0].join(file)).unwrap();
        }
        let err = builder.clone().create().err().unwrap();
        assert!(matches!(err, ExtentError::InvalidArgument(_)));
        assert!(!folders[0].join("TraceFile.toml").exists());

        for folder in &folders[1..] {
            for entry in fs::read_dir(folder).unwrap() {
                fs::remove_file(entry.unwrap().path()).unwrap();
            }
        }
        let mut dataset = builder.create().unwrap();
        let mut buf = [0xFFu8; 8];
        dataset.read(StreamKind::TraceData, 400, &mut buf).unwrap();
        assert_eq!(buf, [0u8; 8]);
    }
}
