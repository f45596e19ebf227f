use rand::Rng;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::{Read, Seek, Write};
use zip::write::FileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::pool::DonorPool;
use crate::rules::Rule;
use crate::{Result, SupermodError};

#[derive(Debug, Default, Clone, Serialize)]
pub struct ReplaceSummary {
    pub seed: u64,
    pub entries: usize,
    pub copied: usize,
    pub rewritten: usize,
    pub malformed_copied: usize,
    pub substitutions: usize,
    /// Substitution count per rule tag.
    pub by_rule: BTreeMap<String, usize>,
}

/// Colour maps drive biome tinting and are never randomised.
pub fn is_exempt(entry_name: &str) -> bool {
    entry_name.contains("colormap")
}

/// Writes every entry of `input` to `output`, passing each through the
/// first rule that claims it. Unclaimed entries are copied raw.
pub fn replace_mod<I, P, W, G>(
    input: &mut ZipArchive<I>,
    output: &mut ZipWriter<W>,
    pool: &mut DonorPool<P>,
    rules: &[&Rule],
    sanity: f64,
    rng: &mut G,
    summary: &mut ReplaceSummary,
) -> Result<()>
where
    I: Read + Seek,
    P: Read + Seek,
    W: Write + Seek,
    G: Rng + ?Sized,
{
    for i in 0..input.len() {
        let (name, is_dir) = {
            let entry = input.by_index(i)?;
            (entry.name().to_string(), entry.is_dir())
        };
        summary.entries += 1;

        let rule = if is_dir || is_exempt(&name) {
            None
        } else {
            rules.iter().copied().find(|r| r.applies_to(&name))
        };
        let Some(rule) = rule else {
            output.raw_copy_file(input.by_index_raw(i)?)?;
            summary.copied += 1;
            continue;
        };

        let mut raw = Vec::new();
        input.by_index(i)?.read_to_end(&mut raw)?;

        let bytes = match rule.replace(&raw, pool, sanity, rng) {
            Ok(outcome) => {
                summary.rewritten += 1;
                summary.substitutions += outcome.substitutions;
                *summary.by_rule.entry(rule.tag().to_string()).or_default() += outcome.substitutions;
                outcome.bytes
            }
            Err(SupermodError::MalformedInput { source }) => {
                log::warn!("{}: {} is not valid JSON ({}), copied unchanged", rule.tag(), name, source);
                summary.malformed_copied += 1;
                raw
            }
            Err(err) => return Err(err),
        };

        output.start_file(name.as_str(), FileOptions::default())?;
        output.write_all(&bytes)?;
    }
    Ok(())
}
