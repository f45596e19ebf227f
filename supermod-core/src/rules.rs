use rand::Rng;
use serde_json::Value;
use std::io::{Read, Seek};

use crate::json_path::{self, enumerate_paths, format_path};
use crate::path_match::Pattern;
use crate::pool::DonorPool;
use crate::{Result, SupermodError};

/// How many pool candidates a structural replacement draws before giving up
/// on a field whose filter keeps rejecting them.
pub const MAX_FILTER_DRAWS: usize = 10;

/// Decides whether an extracted JSON value is worth storing or substituting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptFilter {
    Any,
    /// Rejects any value containing a string. With `no_resource_keys`, also
    /// rejects mappings that have a namespaced (`ns:path`) key. No standard
    /// category uses it; it is there for custom rules built with `Rule::json`.
    NoStrings { no_resource_keys: bool },
    /// Only `minecraft:`-namespaced identifiers, so recipes never reference
    /// items the target mod does not ship.
    MinecraftOnly,
}

impl AcceptFilter {
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            AcceptFilter::Any => true,
            AcceptFilter::NoStrings { no_resource_keys } => has_no_strings(value, *no_resource_keys),
            AcceptFilter::MinecraftOnly => value.as_str().is_some_and(|s| s.starts_with("minecraft:")),
        }
    }
}

fn has_no_strings(value: &Value, no_resource_keys: bool) -> bool {
    match value {
        Value::String(_) => false,
        Value::Object(map) => {
            if no_resource_keys && map.keys().any(|key| key.contains(':')) {
                return false;
            }
            map.values().all(|v| has_no_strings(v, no_resource_keys))
        }
        Value::Array(items) => items.iter().all(|v| has_no_strings(v, no_resource_keys)),
        _ => true,
    }
}

/// One value extracted from a donor file, with the pool folder it belongs in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub folder: String,
    pub bytes: Vec<u8>,
}

/// Result of running a rule's replacement over one target entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub bytes: Vec<u8>,
    pub substitutions: usize,
}

#[derive(Debug, Clone)]
pub struct JsonExtraction {
    points: Vec<Pattern>,
    filter: AcceptFilter,
}

#[derive(Debug, Clone)]
pub enum Behavior {
    /// Whole files move between mods untouched.
    Identity,
    /// Sub-values at the extraction points move between documents; each
    /// point gets its own pool folder.
    Json(JsonExtraction),
}

#[derive(Debug, Clone)]
pub struct Rule {
    tag: String,
    glob: Pattern,
    folder: String,
    behavior: Behavior,
}

impl Rule {
    pub fn identity(tag: &str, file_glob: &str, folder: &str) -> Rule {
        Rule {
            tag: tag.to_string(),
            glob: Pattern::parse(file_glob),
            folder: folder.to_string(),
            behavior: Behavior::Identity,
        }
    }

    /// Builds a structural rule. Each extraction point is a list of path
    /// segments, e.g. `&["elements", "*", "rotation"]`.
    pub fn json(
        tag: &str,
        file_glob: &str,
        folder: &str,
        extraction_points: &[&[&str]],
        filter: AcceptFilter,
    ) -> Rule {
        let points = extraction_points
            .iter()
            .map(|point| Pattern::from_segments(point.iter().copied()))
            .collect();

        Rule {
            tag: tag.to_string(),
            glob: Pattern::parse(file_glob),
            folder: folder.to_string(),
            behavior: Behavior::Json(JsonExtraction { points, filter }),
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn glob(&self) -> &Pattern {
        &self.glob
    }

    pub fn folder(&self) -> &str {
        &self.folder
    }

    pub fn applies_to(&self, entry_name: &str) -> bool {
        self.glob.matches_path(entry_name)
    }

    /// Pool folder holding candidates for one extraction point.
    pub fn point_folder(&self, index: usize) -> String {
        format!("{}/{}", self.folder, index)
    }

    /// Splits a donor file into the pool candidates it contributes.
    pub fn transform(&self, raw: &[u8]) -> Result<Vec<Candidate>> {
        let extraction = match &self.behavior {
            Behavior::Identity => {
                return Ok(vec![Candidate {
                    folder: self.folder.clone(),
                    bytes: raw.to_vec(),
                }])
            }
            Behavior::Json(extraction) => extraction,
        };

        let doc = parse_document(raw)?;
        let mut out = Vec::new();
        for path in enumerate_paths(&doc) {
            for (index, point) in extraction.points.iter().enumerate() {
                if !point.matches(&path) {
                    continue;
                }
                let value = json_path::get(&doc, &path)?;
                if extraction.filter.accepts(value) {
                    out.push(Candidate {
                        folder: self.point_folder(index),
                        bytes: serde_json::to_vec(value)?,
                    });
                }
            }
        }
        Ok(out)
    }

    /// Rewrites one target entry with values drawn from `pool`. `sanity` is
    /// the probability that any single match is left as it was.
    pub fn replace<R, G>(
        &self,
        raw: &[u8],
        pool: &mut DonorPool<R>,
        sanity: f64,
        rng: &mut G,
    ) -> Result<Outcome>
    where
        R: Read + Seek,
        G: Rng + ?Sized,
    {
        match &self.behavior {
            Behavior::Identity => self.replace_whole(raw, pool, sanity, rng),
            Behavior::Json(extraction) => self.replace_fields(extraction, raw, pool, sanity, rng),
        }
    }

    fn replace_whole<R, G>(
        &self,
        raw: &[u8],
        pool: &mut DonorPool<R>,
        sanity: f64,
        rng: &mut G,
    ) -> Result<Outcome>
    where
        R: Read + Seek,
        G: Rng + ?Sized,
    {
        let unchanged = || Outcome {
            bytes: raw.to_vec(),
            substitutions: 0,
        };

        let Some(name) = pool.pick(&self.folder, rng) else {
            return Ok(unchanged());
        };
        if keep_original(sanity, rng) {
            return Ok(unchanged());
        }

        log::debug!("{}: substituting whole file with {}", self.tag, name);
        Ok(Outcome {
            bytes: pool.read(&name)?,
            substitutions: 1,
        })
    }

    fn replace_fields<R, G>(
        &self,
        extraction: &JsonExtraction,
        raw: &[u8],
        pool: &mut DonorPool<R>,
        sanity: f64,
        rng: &mut G,
    ) -> Result<Outcome>
    where
        R: Read + Seek,
        G: Rng + ?Sized,
    {
        let mut doc = parse_document(raw)?;
        // Paths are taken before any substitution changes the document shape.
        let paths = enumerate_paths(&doc);
        let mut substitutions = 0usize;

        for path in &paths {
            for (index, point) in extraction.points.iter().enumerate() {
                if !point.matches(path) {
                    continue;
                }
                let folder = self.point_folder(index);
                if pool.candidates(&folder).is_empty() || keep_original(sanity, rng) {
                    continue;
                }
                match draw_accepted(pool, &folder, extraction.filter, rng)? {
                    Some(value) => {
                        log::trace!("{}: substituting {}", self.tag, format_path(path));
                        json_path::set(&mut doc, path, value)?;
                        substitutions += 1;
                    }
                    None => log::debug!(
                        "{}: no acceptable candidate in {} after {} draws",
                        self.tag,
                        folder,
                        MAX_FILTER_DRAWS
                    ),
                }
            }
        }

        Ok(Outcome {
            bytes: serde_json::to_vec(&doc)?,
            substitutions,
        })
    }
}

fn keep_original<G: Rng + ?Sized>(sanity: f64, rng: &mut G) -> bool {
    rng.gen::<f64>() < sanity
}

fn draw_accepted<R, G>(
    pool: &mut DonorPool<R>,
    folder: &str,
    filter: AcceptFilter,
    rng: &mut G,
) -> Result<Option<Value>>
where
    R: Read + Seek,
    G: Rng + ?Sized,
{
    for _ in 0..MAX_FILTER_DRAWS {
        let Some(name) = pool.pick(folder, rng) else {
            return Ok(None);
        };
        let bytes = pool.read(&name)?;
        match parse_document(&bytes) {
            Ok(value) if filter.accepts(&value) => return Ok(Some(value)),
            Ok(_) => {}
            Err(err) => log::debug!("skipping unreadable candidate {name}: {err}"),
        }
    }
    Ok(None)
}

/// Parses JSON content, tolerating the UTF-8 byte order mark some mod tools
/// write.
pub fn parse_document(raw: &[u8]) -> Result<Value> {
    let raw = raw.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(raw);
    serde_json::from_slice(raw).map_err(|source| SupermodError::MalformedInput { source })
}
