#![no_main]
use libfuzzer_sys::{fuzz_target, arbitrary::{Arbitrary, Unstructured}};
use seisvfio::{ExtentList, ExtentStream, VirtualFolders};

#[derive(Debug, Arbitrary)]
struct SpanOp {
    offset: u16,
    data: Vec<u8>,
    read_back: bool,
}

// Random spans against a small two-folder stream must never panic, and
// every successful write must read back unchanged
fuzz_target!(|input: &[u8]| {
    let mut u = Unstructured::new(input);

    let ops: Vec<SpanOp> = match u.arbitrary() {
        Ok(ops) => ops,
        Err(_) => return,
    };
    if ops.is_empty() {
        return;
    }

    let dir = match tempfile::TempDir::new() {
        Ok(d) => d,
        Err(_) => return,
    };
    let folders = VirtualFolders::from_paths([
        dir.path().join("a").to_string_lossy().into_owned(),
        dir.path().join("b").to_string_lossy().into_owned(),
    ]);
    if folders.create_folders().is_err() {
        return;
    }

    let mut list = ExtentList::new();
    if list.init("TraceFile", 5, 4_000, 1_000, &folders).is_err() {
        return;
    }
    let mut stream = ExtentStream::with_capacity(list, 256);

    for op in ops.iter().take(32) {
        let offset = op.offset as u64;
        if stream.write_span(offset, &op.data).is_ok() && op.read_back {
            let mut back = vec![0u8; op.data.len()];
            stream.read_span(offset, &mut back).unwrap();
            assert_eq!(back, op.data);
        }
    }
    let _ = stream.close();
});
