// Thu Feb 12 2026 - Alex

use anyhow::{bail, Context, Result};
use clap::Parser;
use itanium_rtti::output::{summarize_class, vtable_database, write_json};
use itanium_rtti::{load_elf, Config, RttiContext};
use log::{info, warn, LevelFilter};
use memmap2::Mmap;
use rayon::prelude::*;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(author = "Alex")]
#[command(version)]
#[command(about = "C++ class hierarchy recovery for GNU/Itanium ABI binaries", long_about = None)]
struct Args {
    /// ELF binary to analyze.
    #[arg(short, long)]
    binary: PathBuf,

    #[arg(short, long, default_value = "classes.json")]
    output: PathBuf,

    /// Also dump the vtable database keyed by unique type name.
    #[arg(long)]
    vtable_db: Option<PathBuf>,

    /// Resolve a single class by its mangled typename instead of
    /// enumerating everything.
    #[arg(long)]
    find: Option<String>,

    /// Skip VTT parsing.
    #[arg(long)]
    no_vtts: bool,

    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    env_logger::Builder::from_default_env()
        .filter_level(if args.verbose { LevelFilter::Debug } else { LevelFilter::Info })
        .init();

    let start = Instant::now();
    info!("loading {}", args.binary.display());
    let file = File::open(&args.binary)
        .with_context(|| format!("opening {}", args.binary.display()))?;
    // Never written to; read-only map.
    let mapped = unsafe { Mmap::map(&file) }
        .with_context(|| format!("mapping {}", args.binary.display()))?;
    let image = load_elf(&mapped).context("parsing ELF image")?;

    let config = Config { parse_vtts: !args.no_vtts, ..Config::default() };
    let ctx = RttiContext::new(Arc::new(image), config).context("initializing RTTI analysis")?;

    let classes = match &args.find {
        Some(name) => {
            let found = ctx
                .find_type_info(None, name, ctx.cancel_token())
                .context("searching for typename")?;
            match found {
                Some(class) => vec![class],
                None => bail!("no unambiguous type_info for typename {:?}", name),
            }
        }
        None => ctx.enumerate_class_type_infos(),
    };
    info!("identified {} classes in {:.2?}", classes.len(), start.elapsed());
    if classes.is_empty() {
        warn!("no _ZTI symbols resolved; is the binary stripped?");
    }

    // Parsing is memoized per class, so the parallel walk touching parents
    // across tasks only ever fills each OnceCell once.
    let summaries: Vec<_> = classes.par_iter().map(|class| summarize_class(&ctx, class)).collect();
    let with_vtables = summaries.iter().filter(|s| s.vtable.is_some()).count();
    info!("recovered {} vtables in {:.2?}", with_vtables, start.elapsed());

    write_json(&args.output, &summaries)
        .with_context(|| format!("writing {}", args.output.display()))?;
    info!("wrote {}", args.output.display());

    if let Some(path) = &args.vtable_db {
        let database = vtable_database(&ctx, &classes);
        write_json(path, &database).with_context(|| format!("writing {}", path.display()))?;
        info!("wrote {} ({} entries)", path.display(), database.len());
    }
    Ok(())
}
