//! Archives produced by the streaming writer, read back with the `zip` crate.

use std::io::{Cursor, Read};

use feedzip::zip::{EntryOptions, ZipStreamWriter};

fn open(bytes: Vec<u8>) -> zip::ZipArchive<Cursor<Vec<u8>>> {
    zip::ZipArchive::new(Cursor::new(bytes)).expect("archive should parse")
}

fn read_entry(archive: &mut zip::ZipArchive<Cursor<Vec<u8>>>, index: usize) -> (String, Vec<u8>) {
    let mut file = archive.by_index(index).unwrap();
    let mut data = Vec::new();
    file.read_to_end(&mut data).unwrap();
    (file.name().to_string(), data)
}

#[tokio::test]
async fn single_stored_file() {
    let mut zip = ZipStreamWriter::new(Vec::new());
    zip.add_file(EntryOptions::file("a.txt"), b"hello").await.unwrap();
    zip.close().await.unwrap();

    let mut archive = open(zip.into_inner());
    assert_eq!(archive.len(), 1);
    {
        let file = archive.by_index(0).unwrap();
        assert_eq!(file.compression(), zip::CompressionMethod::Stored);
        assert_eq!(file.size(), 5);
    }
    assert_eq!(read_entry(&mut archive, 0), ("a.txt".to_string(), b"hello".to_vec()));
}

#[tokio::test]
async fn entries_keep_insertion_order() {
    let mut zip = ZipStreamWriter::new(Vec::new());
    let names = ["z.txt", "a/b.txt", "m.bin", "a/c.txt"];
    for (i, name) in names.iter().enumerate() {
        let body = vec![i as u8; 100 * (i + 1)];
        zip.add_file(EntryOptions::file(*name), &body).await.unwrap();
    }
    zip.close().await.unwrap();

    let mut archive = open(zip.into_inner());
    for (i, name) in names.iter().enumerate() {
        let (read_name, data) = read_entry(&mut archive, i);
        assert_eq!(read_name, *name);
        assert_eq!(data, vec![i as u8; 100 * (i + 1)]);
    }
}

#[tokio::test]
async fn chunked_entry_spanning_several_chunks() {
    let payload: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();

    let mut zip = ZipStreamWriter::new(Vec::new());
    zip.start_entry(EntryOptions::file("big.bin")).await.unwrap();
    for chunk in payload.chunks(7_777) {
        zip.write_chunk(chunk).await.unwrap();
    }
    zip.finish_entry().await.unwrap();
    zip.close().await.unwrap();

    let mut archive = open(zip.into_inner());
    assert_eq!(read_entry(&mut archive, 0).1, payload);
}

#[tokio::test]
async fn empty_archive_is_readable() {
    let mut zip = ZipStreamWriter::new(Vec::new());
    zip.close().await.unwrap();

    let bytes = zip.into_inner();
    assert_eq!(bytes.len(), 22);
    assert_eq!(open(bytes).len(), 0);
}

#[tokio::test]
async fn directories_and_comments() {
    let mut zip = ZipStreamWriter::new(Vec::new());
    zip.add_directory("photos").await.unwrap();
    zip.add_file(
        EntryOptions::file("photos/a.jpg").with_comment("first"),
        b"\xff\xd8\xff",
    )
    .await
    .unwrap();
    zip.add_file(EntryOptions::file("empty.txt"), b"").await.unwrap();
    zip.close().await.unwrap();

    let mut archive = open(zip.into_inner());
    assert_eq!(archive.len(), 3);
    {
        let dir = archive.by_index(0).unwrap();
        assert_eq!(dir.name(), "photos/");
        assert!(dir.is_dir());
    }
    {
        let photo = archive.by_name("photos/a.jpg").unwrap();
        assert_eq!(photo.comment(), "first");
    }
    assert_eq!(read_entry(&mut archive, 2), ("empty.txt".to_string(), Vec::new()));
}

#[tokio::test]
async fn utf8_names_survive() {
    let mut zip = ZipStreamWriter::new(Vec::new());
    zip.add_file(EntryOptions::file("日本語/ノート.txt"), "こんにちは".as_bytes())
        .await
        .unwrap();
    zip.close().await.unwrap();

    let mut archive = open(zip.into_inner());
    let (name, data) = read_entry(&mut archive, 0);
    assert_eq!(name, "日本語/ノート.txt");
    assert_eq!(String::from_utf8(data).unwrap(), "こんにちは");
}
