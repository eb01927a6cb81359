#![no_main]
use libfuzzer_sys::fuzz_target;
use seisvfio::{ExtentList, VirtualFolders};

// Arbitrary metadata files must be rejected with an error, never a panic
fuzz_target!(|input: (String, String)| {
    let (folders_text, extent_text) = input;

    let dir = match tempfile::TempDir::new() {
        Ok(d) => d,
        Err(_) => return,
    };
    let dataset = dir.path().join("proj/sub/line.js");
    if std::fs::create_dir_all(&dataset).is_err() {
        return;
    }
    let _ = std::fs::write(dataset.join("VirtualFolders.toml"), folders_text);
    let _ = std::fs::write(dataset.join("TraceFile.toml"), extent_text);

    let mut folders = VirtualFolders::new();
    let _ = folders.load(&dataset);

    let mut list = ExtentList::with_folders(VirtualFolders::from_paths([dataset.to_string_lossy()]));
    let _ = list.init_from_metadata(&dataset, "TraceFile.toml");
});
