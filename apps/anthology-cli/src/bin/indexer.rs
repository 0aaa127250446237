use std::env;
use std::process::ExitCode;

use anthology_cli::{exit_on_error, App};

fn main() -> ExitCode {
    exit_on_error(run())
}

fn run() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let mut force = false;
    let mut corpus = None;
    for arg in &args {
        match arg.as_str() {
            "--force" | "-f" => force = true,
            _ if !arg.starts_with('-') => corpus = Some(arg.clone()),
            other => anyhow::bail!("unexpected argument '{other}'. Usage: anthology-indexer [--force] [corpus]"),
        }
    }

    let app = App::start(corpus.as_deref())?;
    let mut manager = app.manager();
    println!("Anthology Indexer\n=================");
    match app.corpus_path() {
        Some(path) => println!("Corpus: {}", path.display()),
        None => println!("⚠️  No corpus configured (set corpus.path or pass one)"),
    }
    if force {
        println!("♻️  Forcing a rebuild (--force)");
    }
    let index = manager.build(None, force)?;
    println!("\n✅ Indexing completed successfully!");
    println!("📊 {} documents, {} chunks, dimension {}", index.document_count(), index.len(), index.identity().dimension);
    println!("📁 Stored in {}", manager.paths().dir.display());
    println!("\n💡 To search, use: cargo run --bin anthology-search '<query>'");
    Ok(())
}
