use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;
use zip::ZipArchive;

use crate::Result;

/// Read side of a donor pool ("supermod") archive.
///
/// The entry listing is taken once, on first use, and kept for as long as
/// the handle lives. Nothing may append to the underlying archive while a
/// handle is open on it.
pub struct DonorPool<R> {
    archive: ZipArchive<R>,
    listing: Option<Vec<String>>,
    folders: HashMap<String, Vec<String>>,
}

impl DonorPool<File> {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(DonorPool::new(ZipArchive::new(file)?))
    }
}

impl<R: Read + Seek> DonorPool<R> {
    pub fn new(archive: ZipArchive<R>) -> Self {
        DonorPool {
            archive,
            listing: None,
            folders: HashMap::new(),
        }
    }

    /// All entry names, sorted so that a seeded run picks the same files.
    pub fn listing(&mut self) -> &[String] {
        self.listing.get_or_insert_with(|| {
            let mut names: Vec<String> = self.archive.file_names().map(str::to_owned).collect();
            names.sort();
            names
        })
    }

    /// Candidate entries stored directly or indirectly under `folder/`.
    pub fn candidates(&mut self, folder: &str) -> &[String] {
        if !self.folders.contains_key(folder) {
            let prefix = format!("{folder}/");
            let names: Vec<String> = self
                .listing()
                .iter()
                .filter(|name| name.starts_with(&prefix) && !name.ends_with('/'))
                .cloned()
                .collect();
            self.folders.insert(folder.to_string(), names);
        }
        &self.folders[folder]
    }

    pub fn pick<G: Rng + ?Sized>(&mut self, folder: &str, rng: &mut G) -> Option<String> {
        self.candidates(folder).choose(rng).cloned()
    }

    pub fn read(&mut self, name: &str) -> Result<Vec<u8>> {
        let mut entry = self.archive.by_name(name)?;
        let mut buf = Vec::new();
        entry.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::memory_pool;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn candidates_are_scoped_to_folder() {
        let mut pool = memory_pool(&[
            ("assets/models/block/0/aaa.json", b"[1,1,1]"),
            ("assets/models/block/0/bbb.json", b"[2,2,2]"),
            ("assets/models/block/1/ccc.json", b"[3,3,3]"),
            ("assets/models/block/10/ddd.json", b"[4,4,4]"),
        ]);

        assert_eq!(
            pool.candidates("assets/models/block/0"),
            ["assets/models/block/0/aaa.json", "assets/models/block/0/bbb.json"]
        );
        assert_eq!(pool.candidates("assets/models/block/1"), ["assets/models/block/1/ccc.json"]);
        assert!(pool.candidates("assets/models/item/0").is_empty());
    }

    #[test]
    fn pick_from_empty_folder_is_none() {
        let mut pool = memory_pool(&[("textures/abc.png", b"png")]);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(pool.pick("sounds/ogg", &mut rng), None);
        assert_eq!(pool.pick("textures", &mut rng).as_deref(), Some("textures/abc.png"));
    }

    #[test]
    fn read_returns_entry_bytes() {
        let mut pool = memory_pool(&[("sounds/ogg/x.ogg", b"OggS data")]);
        assert_eq!(pool.read("sounds/ogg/x.ogg").unwrap(), b"OggS data");
        assert!(pool.read("sounds/ogg/missing.ogg").is_err());
    }

    #[test]
    fn listing_is_sorted() {
        let mut pool = memory_pool(&[("b/2", b"2"), ("a/1", b"1"), ("c/3", b"3")]);
        assert_eq!(pool.listing(), ["a/1", "b/2", "c/3"]);
    }
}
