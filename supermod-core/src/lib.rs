use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;
use zip::{ZipArchive, ZipWriter};

pub mod catalog;
pub mod concat;
pub mod json_path;
pub mod path_match;
pub mod pool;
pub mod replace;
pub mod rules;

#[cfg(test)]
mod test_utils;

pub use catalog::{expand_tags, filter_rules, Catalog};
pub use concat::ConcatSummary;
pub use json_path::PathError;
pub use path_match::{matches, Key, Pattern};
pub use pool::DonorPool;
pub use replace::ReplaceSummary;
pub use rules::{AcceptFilter, Rule};

/// Tag expression selecting every category.
pub const DEFAULT_TAGS: &str = "any";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcatSettings {
    pub pool_path: PathBuf,
    /// Mod archives, or directories searched recursively for them.
    pub sources: Vec<PathBuf>,
    pub tags: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplaceSettings {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub pool_path: PathBuf,
    /// Fraction of matched assets and fields to leave unchanged, 0 to 1.
    pub sanity: f64,
    pub tags: String,
    pub seed: Option<u64>,
    pub debug: bool,
}

impl ReplaceSettings {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.sanity) {
            return Err(SupermodError::Config(format!(
                "sanity must be between 0 and 1, got {}",
                self.sanity
            )));
        }
        if self.input_path == self.output_path {
            return Err(SupermodError::Config(
                "output archive must differ from the input archive".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum SupermodError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed JSON input: {source}")]
    MalformedInput { source: serde_json::Error },
    #[error("path error: {0}")]
    Path(#[from] PathError),
    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, SupermodError>;

const ARCHIVE_EXTENSIONS: &[&str] = &["zip", "jar"];

fn is_archive(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| ARCHIVE_EXTENSIONS.iter().any(|a| ext.eq_ignore_ascii_case(a)))
}

/// Expands directories into the archives found beneath them, in file-name
/// order. Plain files are taken as given.
pub fn collect_sources(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path).sort_by_file_name() {
                let entry = entry.map_err(std::io::Error::from)?;
                if entry.file_type().is_file() && is_archive(entry.path()) {
                    out.push(entry.into_path());
                }
            }
        } else if path.is_file() {
            out.push(path.clone());
        } else {
            return Err(SupermodError::Config(format!(
                "Source archive does not exist: {}",
                path.display()
            )));
        }
    }
    Ok(out)
}

#[derive(Serialize)]
struct RunReport<'a> {
    settings: &'a ReplaceSettings,
    summary: &'a ReplaceSummary,
}

fn report_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_os_string();
    name.push(".report.json");
    PathBuf::from(name)
}

fn create_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Builds or extends the donor pool at `settings.pool_path` from the source
/// archives. Existing pool entries are kept; only unseen content is added.
pub fn run_concat(settings: ConcatSettings) -> Result<ConcatSummary> {
    if settings.sources.is_empty() {
        return Err(SupermodError::Config(
            "at least one source archive is required".to_string(),
        ));
    }
    let sources = collect_sources(&settings.sources)?;

    let catalog = Catalog::standard();
    let rules = catalog.select(&settings.tags);

    let pool_exists = settings.pool_path.exists();
    let mut existing: HashSet<String> = if pool_exists {
        ZipArchive::new(File::open(&settings.pool_path)?)?
            .file_names()
            .map(str::to_owned)
            .collect()
    } else {
        HashSet::new()
    };
    let mut writer = if pool_exists {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&settings.pool_path)?;
        ZipWriter::new_append(file)?
    } else {
        create_parent_dir(&settings.pool_path)?;
        ZipWriter::new(File::create(&settings.pool_path)?)
    };
    log::info!(
        "donor pool {} holds {} entries",
        settings.pool_path.display(),
        existing.len()
    );

    let pool_identity = fs::canonicalize(&settings.pool_path).ok();
    let mut summary = ConcatSummary::default();
    let total = sources.len();
    for (i, source) in sources.iter().enumerate() {
        if pool_identity.is_some() && fs::canonicalize(source).ok() == pool_identity {
            log::warn!("skipping {}: it is the donor pool itself", source.display());
            continue;
        }
        log::info!("[{}/{}] {}", i + 1, total, source.display());
        let mut archive = ZipArchive::new(File::open(source)?)?;
        concat::append_assets(&mut archive, &mut writer, &mut existing, &rules, &mut summary)?;
        summary.archives += 1;
    }

    writer.finish()?;
    Ok(summary)
}

/// Writes a randomised copy of `settings.input_path` to
/// `settings.output_path`, drawing replacements from the donor pool.
pub fn run_replace(settings: ReplaceSettings) -> Result<ReplaceSummary> {
    settings.validate()?;
    for (what, path) in [("Input", &settings.input_path), ("Donor pool", &settings.pool_path)] {
        if !path.is_file() {
            return Err(SupermodError::Config(format!(
                "{} archive does not exist: {}",
                what,
                path.display()
            )));
        }
    }

    let catalog = Catalog::standard();
    let rules = catalog.select(&settings.tags);

    let seed = settings.seed.unwrap_or_else(rand::random);
    let mut rng = StdRng::seed_from_u64(seed);
    log::info!("randomising {} with seed {}", settings.input_path.display(), seed);

    let mut pool = DonorPool::open(&settings.pool_path)?;
    let mut input = ZipArchive::new(File::open(&settings.input_path)?)?;
    create_parent_dir(&settings.output_path)?;
    let mut output = ZipWriter::new(File::create(&settings.output_path)?);

    let mut summary = ReplaceSummary {
        seed,
        ..ReplaceSummary::default()
    };
    replace::replace_mod(
        &mut input,
        &mut output,
        &mut pool,
        &rules,
        settings.sanity,
        &mut rng,
        &mut summary,
    )?;
    output.finish()?;

    if settings.debug {
        let report = RunReport {
            settings: &settings,
            summary: &summary,
        };
        fs::write(report_path(&settings.output_path), serde_json::to_string_pretty(&report)?)?;
    }

    Ok(summary)
}
