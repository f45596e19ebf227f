use clap::{Parser, Subcommand};
use std::path::PathBuf;

use supermod_core::{run_concat, run_replace, Catalog, ConcatSettings, ReplaceSettings, DEFAULT_TAGS};

#[derive(Debug, Parser)]
#[command(name = "supermod", version, about = "Randomise mod assets from a pool of donor mods")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Add the assets of one or more mods to a donor pool archive.
    Concat {
        /// Pool archive; created if it does not exist yet.
        supermod_file: PathBuf,

        /// Mod archives, or directories containing .zip/.jar files.
        #[arg(required = true)]
        mod_file: Vec<PathBuf>,

        /// Only pool assets of these rule tags (comma-separated).
        #[arg(short = 'f', long, default_value = DEFAULT_TAGS)]
        filter_only: String,
    },

    /// Write a randomised copy of a mod using assets from a donor pool.
    Replace {
        mod_in: PathBuf,

        mod_out: PathBuf,

        supermod_file: PathBuf,

        /// From 0 to 1, the fraction of the mod to remain unchanged.
        #[arg(short, long, default_value_t = 0.0)]
        sanity: f64,

        /// Only allow replacement rules with these tags (comma-separated).
        #[arg(short = 'f', long, default_value = DEFAULT_TAGS)]
        filter_only: String,

        #[arg(long)]
        seed: Option<u64>,

        /// Write a JSON report next to the output archive.
        #[arg(long, default_value_t = false)]
        debug: bool,
    },

    /// Show which rules a tag expression selects.
    Tags {
        #[arg(default_value = DEFAULT_TAGS)]
        filter_only: String,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let result = match args.command {
        Command::Concat {
            supermod_file,
            mod_file,
            filter_only,
        } => run_concat(ConcatSettings {
            pool_path: supermod_file,
            sources: mod_file,
            tags: filter_only,
        })
        .map(|summary| {
            println!(
                "pooled {} new candidates from {} archives ({} entries scanned, {} duplicates, {} malformed)",
                summary.candidates_written,
                summary.archives,
                summary.entries_scanned,
                summary.duplicates_skipped,
                summary.malformed_skipped,
            );
        }),
        Command::Replace {
            mod_in,
            mod_out,
            supermod_file,
            sanity,
            filter_only,
            seed,
            debug,
        } => run_replace(ReplaceSettings {
            input_path: mod_in,
            output_path: mod_out,
            pool_path: supermod_file,
            sanity,
            tags: filter_only,
            seed,
            debug,
        })
        .map(|summary| {
            println!(
                "seed {}: {} of {} entries rewritten, {} substitutions, {} copied unchanged",
                summary.seed,
                summary.rewritten,
                summary.entries,
                summary.substitutions,
                summary.copied + summary.malformed_copied,
            );
            for (tag, count) in &summary.by_rule {
                println!("  {tag}: {count}");
            }
        }),
        Command::Tags { filter_only } => {
            let catalog = Catalog::standard();
            for rule in catalog.select(&filter_only) {
                println!("{}\t{}\t{}", rule.tag(), rule.glob(), rule.folder());
            }
            Ok(())
        }
    };

    if let Err(err) = result {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}
