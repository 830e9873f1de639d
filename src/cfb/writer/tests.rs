use super::*;
use crate::cfb::CompoundFile;

fn reopen(writer: &CompoundFileWriter) -> CompoundFile<Cursor<Vec<u8>>> {
    let bytes = writer.to_bytes().unwrap();
    assert_eq!(bytes.len() % SECTOR_SIZE, 0);
    CompoundFile::open(Cursor::new(bytes)).unwrap()
}

#[test]
fn empty_file_is_minimal() {
    let bytes = CompoundFileWriter::new().to_bytes().unwrap();
    assert_eq!(bytes.len(), MINIMAL_FILE_SIZE);
    let file = CompoundFile::open(Cursor::new(bytes)).unwrap();
    assert!(file.list_streams().is_empty());
}

#[test]
fn small_and_large_streams_roundtrip() {
    let large: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
    let mut writer = CompoundFileWriter::new();
    writer.create_stream(&["EncryptionInfo"], b"small stream").unwrap();
    writer.create_stream(&["EncryptedPackage"], &large).unwrap();

    let mut file = reopen(&writer);
    assert_eq!(file.open_stream(&["EncryptionInfo"]).unwrap(), b"small stream");
    assert_eq!(file.open_stream(&["encryptedpackage"]).unwrap(), large);
}

#[test]
fn stream_at_cutoff_uses_fat() {
    let data = vec![7u8; MINI_STREAM_CUTOFF as usize];
    let mut writer = CompoundFileWriter::new();
    writer.create_stream(&["Exact"], &data).unwrap();
    writer.create_stream(&["Below"], &data[1..]).unwrap();
    let mut file = reopen(&writer);
    assert_eq!(file.open_stream(&["Exact"]).unwrap(), data);
    assert_eq!(file.open_stream(&["Below"]).unwrap(), &data[1..]);
}

#[test]
fn nested_storages_are_listed() {
    let mut writer = CompoundFileWriter::new();
    writer.create_storage(&["\u{6}DataSpaces", "DataSpaceInfo"]).unwrap();
    writer
        .create_stream(&["\u{6}DataSpaces", "Version"], b"version")
        .unwrap();
    writer
        .create_stream(
            &["\u{6}DataSpaces", "TransformInfo", "StrongEncryptionTransform", "\u{6}Primary"],
            b"primary",
        )
        .unwrap();
    writer.create_stream(&["EncryptionInfo"], b"info").unwrap();

    let mut file = reopen(&writer);
    let streams = file.list_streams();
    assert_eq!(streams.len(), 3);
    assert!(streams.contains(&vec!["EncryptionInfo".to_string()]));
    assert!(file.exists(&["\u{6}DataSpaces", "DataSpaceInfo"]));
    assert_eq!(
        file.open_stream(&["\u{6}DataSpaces", "TransformInfo", "StrongEncryptionTransform", "\u{6}Primary"])
            .unwrap(),
        b"primary"
    );
    assert!(matches!(
        file.open_stream(&["\u{6}DataSpaces"]),
        Err(CfbError::InvalidFormat(_))
    ));
    assert!(matches!(
        file.open_stream(&["Missing"]),
        Err(CfbError::StreamNotFound(_))
    ));
}

#[test]
fn many_siblings_are_all_reachable() {
    let mut writer = CompoundFileWriter::new();
    let names: Vec<String> = (0..40).map(|i| format!("Stream{i}")).collect();
    for name in &names {
        writer.create_stream(&[name.as_str()], name.as_bytes()).unwrap();
    }
    let mut file = reopen(&writer);
    assert_eq!(file.list_streams().len(), names.len());
    for name in &names {
        assert_eq!(file.open_stream(&[name.as_str()]).unwrap(), name.as_bytes());
    }
}

#[test]
fn replacing_a_stream_keeps_one_entry() {
    let mut writer = CompoundFileWriter::new();
    writer.create_stream(&["A"], b"one").unwrap();
    writer.create_stream(&["A"], b"two").unwrap();
    let mut file = reopen(&writer);
    assert_eq!(file.list_streams().len(), 1);
    assert_eq!(file.open_stream(&["A"]).unwrap(), b"two");
}

#[test]
fn rejects_bad_names() {
    let mut writer = CompoundFileWriter::new();
    assert!(writer.create_stream(&[], b"").is_err());
    let long = "x".repeat(32);
    assert!(writer.create_stream(&[long.as_str()], b"").is_err());
}

#[test]
fn large_file_uses_difat() {
    let data = vec![0x5Au8; 120 * 128 * SECTOR_SIZE];
    let mut writer = CompoundFileWriter::new();
    writer.create_stream(&["Big"], &data).unwrap();
    let bytes = writer.to_bytes().unwrap();
    // DIFAT sector count in the header
    assert_eq!(&bytes[72..76], &1u32.to_le_bytes());
    let mut file = CompoundFile::open(Cursor::new(bytes)).unwrap();
    let read = file.open_stream(&["Big"]).unwrap();
    assert_eq!(read.len(), data.len());
    assert!(read.iter().all(|&b| b == 0x5A));
}

#[test]
fn oversized_mini_stream_is_corrupt() {
    let mut writer = CompoundFileWriter::new();
    writer.create_stream(&["Small"], b"small stream").unwrap();
    let mut bytes = writer.to_bytes().unwrap();

    // Raise the cutoff so a huge declared size still goes through the MiniFAT.
    bytes[56..60].copy_from_slice(&u32::MAX.to_le_bytes());
    let name: Vec<u8> = "Small".encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
    let entry = bytes.windows(name.len()).position(|w| w == name.as_slice()).unwrap();
    bytes[entry + 120..entry + 124].copy_from_slice(&0xFFFF_FF00u32.to_le_bytes());

    let mut file = CompoundFile::open(Cursor::new(bytes)).unwrap();
    assert!(matches!(
        file.open_stream(&["Small"]),
        Err(CfbError::CorruptedFile(_))
    ));
}
