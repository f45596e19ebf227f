use std::collections::BTreeMap;
use std::io::{Cursor, Read, Seek, Write};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::pool::DonorPool;

/// Builds a zip in memory with stored (uncompressed) entries. Names ending in
/// `/` become directory entries and their content is ignored.
pub fn zip_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Stored);
    for (name, content) in files {
        if name.ends_with('/') {
            writer.add_directory(*name, options).unwrap();
            continue;
        }
        writer.start_file(*name, options).unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

pub fn memory_archive(files: &[(&str, &[u8])]) -> ZipArchive<Cursor<Vec<u8>>> {
    ZipArchive::new(Cursor::new(zip_bytes(files))).unwrap()
}

pub fn memory_pool(files: &[(&str, &[u8])]) -> DonorPool<Cursor<Vec<u8>>> {
    DonorPool::new(memory_archive(files))
}

pub fn read_entries<R: Read + Seek>(archive: &mut ZipArchive<R>) -> BTreeMap<String, Vec<u8>> {
    let mut out = BTreeMap::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).unwrap();
        let mut buf = Vec::new();
        entry.read_to_end(&mut buf).unwrap();
        out.insert(entry.name().to_string(), buf);
    }
    out
}
