use serde::Serialize;
use std::collections::HashSet;
use std::io::{Read, Seek, Write};
use zip::write::FileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::rules::Rule;
use crate::{Result, SupermodError};

#[derive(Debug, Default, Clone, Serialize)]
pub struct ConcatSummary {
    pub archives: usize,
    pub entries_scanned: usize,
    pub candidates_written: usize,
    pub duplicates_skipped: usize,
    pub malformed_skipped: usize,
}

/// Pool entry name for a candidate: `{folder}/{blake3}{ext}`, where `ext` is
/// the donor entry's extension. Identical content always lands on the same
/// name.
pub fn candidate_name(folder: &str, bytes: &[u8], entry_name: &str) -> String {
    let file_name = entry_name.rsplit('/').next().unwrap_or(entry_name);
    let ext = file_name.rfind('.').map_or("", |dot| &file_name[dot..]);
    format!("{}/{}{}", folder, blake3::hash(bytes).to_hex(), ext)
}

/// Runs every matching rule over every entry of `source` and appends the
/// candidates `pool` does not hold yet. `existing` tracks the names already
/// in the pool and is updated as entries are written.
pub fn append_assets<R, W>(
    source: &mut ZipArchive<R>,
    pool: &mut ZipWriter<W>,
    existing: &mut HashSet<String>,
    rules: &[&Rule],
    summary: &mut ConcatSummary,
) -> Result<()>
where
    R: Read + Seek,
    W: Write + Seek,
{
    for i in 0..source.len() {
        let mut entry = source.by_index(i)?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        let matching: Vec<&Rule> = rules.iter().copied().filter(|r| r.applies_to(&name)).collect();
        if matching.is_empty() {
            continue;
        }

        let mut raw = Vec::new();
        entry.read_to_end(&mut raw)?;
        drop(entry);
        summary.entries_scanned += 1;

        for rule in matching {
            let candidates = match rule.transform(&raw) {
                Ok(candidates) => candidates,
                Err(SupermodError::MalformedInput { source }) => {
                    log::warn!("{}: skipping {} ({})", rule.tag(), name, source);
                    summary.malformed_skipped += 1;
                    continue;
                }
                Err(err) => return Err(err),
            };

            for candidate in candidates {
                let target = candidate_name(&candidate.folder, &candidate.bytes, &name);
                if existing.contains(&target) {
                    summary.duplicates_skipped += 1;
                    continue;
                }
                pool.start_file(target.as_str(), FileOptions::default())?;
                pool.write_all(&candidate.bytes)?;
                existing.insert(target);
                summary.candidates_written += 1;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::test_utils::{memory_archive, read_entries};
    use std::io::Cursor;

    fn concat(sources: &[&[(&str, &[u8])]], tags: &str) -> (Vec<(String, Vec<u8>)>, ConcatSummary) {
        let catalog = Catalog::standard();
        let rules = catalog.select(tags);
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let mut existing = HashSet::new();
        let mut summary = ConcatSummary::default();

        for files in sources {
            let mut archive = memory_archive(files);
            append_assets(&mut archive, &mut writer, &mut existing, &rules, &mut summary).unwrap();
            summary.archives += 1;
        }

        let bytes = writer.finish().unwrap().into_inner();
        let mut pool = ZipArchive::new(Cursor::new(bytes)).unwrap();
        (read_entries(&mut pool).into_iter().collect(), summary)
    }

    #[test]
    fn candidate_names_are_content_addressed() {
        let a = candidate_name("textures", b"pixels", "assets/m/textures/a.png");
        let b = candidate_name("textures", b"pixels", "other/place/b.PNG");
        let c = candidate_name("textures", b"other", "assets/m/textures/a.png");
        assert!(a.starts_with("textures/"));
        assert!(a.ends_with(".png"));
        assert_eq!(a.len(), "textures/".len() + 64 + ".png".len());
        assert_ne!(a, c);
        assert_eq!(a.trim_end_matches(".png"), b.trim_end_matches(".PNG"));
        assert!(candidate_name("3d/obj", b"v", "dir.d/noext").ends_with(&blake3::hash(b"v").to_hex().to_string()));
    }

    #[test]
    fn whole_files_and_fields_are_pooled() {
        let model = br#"{"elements":[{"from":[0,0,0],"to":[1,1,1]}]}"#;
        let (entries, summary) = concat(
            &[&[
                ("assets/m/textures/block/ore.png", b"png-bytes"),
                ("assets/m/models/block/ore.json", model),
                ("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0"),
            ]],
            "any",
        );

        let names: Vec<&str> = entries.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names.len(), 3);
        assert!(names.iter().any(|n| n.starts_with("textures/") && n.ends_with(".png")));
        let from = entries
            .iter()
            .find(|(n, _)| n.starts_with("assets/models/block/0/"))
            .unwrap();
        assert_eq!(from.1, b"[0,0,0]");
        assert!(names.iter().any(|n| n.starts_with("assets/models/block/1/")));
        assert_eq!(summary.entries_scanned, 2);
        assert_eq!(summary.candidates_written, 3);
    }

    #[test]
    fn identical_content_is_stored_once() {
        let (entries, summary) = concat(
            &[
                &[("a/x.ogg", b"same sound"), ("b/y.ogg", b"same sound")],
                &[("c/z.ogg", b"same sound"), ("c/w.ogg", b"other sound")],
            ],
            "sounds",
        );
        assert_eq!(entries.len(), 2);
        assert_eq!(summary.duplicates_skipped, 2);
        assert_eq!(summary.archives, 2);
    }

    #[test]
    fn malformed_json_is_skipped() {
        let (entries, summary) = concat(
            &[&[
                ("assets/m/models/block/bad.json", b"{ \"elements\": ["),
                ("assets/m/models/block/good.json", br#"{"elements":[{"from":[5,5,5]}]}"#),
            ]],
            "models",
        );
        assert_eq!(summary.malformed_skipped, 1);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].1, b"[5,5,5]");
    }

    #[test]
    fn inactive_categories_are_ignored() {
        let (entries, _) = concat(&[&[("assets/m/textures/a.png", b"png")]], "sounds,models");
        assert!(entries.is_empty());
    }

    #[test]
    fn directory_entries_are_not_pooled() {
        let everything = Rule::identity("all", "**", "all");
        let mut source = memory_archive(&[("assets/m/", b""), ("assets/m/a.txt", b"text")]);
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let mut existing = HashSet::new();
        let mut summary = ConcatSummary::default();

        append_assets(&mut source, &mut writer, &mut existing, &[&everything], &mut summary).unwrap();

        let bytes = writer.finish().unwrap().into_inner();
        let entries = read_entries(&mut ZipArchive::new(Cursor::new(bytes)).unwrap());
        assert_eq!(entries.len(), 1);
        assert!(entries.keys().all(|name| name.ends_with(".txt")));
        assert_eq!(summary.entries_scanned, 1);
    }
}
