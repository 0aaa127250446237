use std::env;
use std::process::ExitCode;

use anthology_cli::{exit_on_error, flag_value, print_hits, App};
use anthology_core::traits::Retriever;

fn main() -> ExitCode {
    exit_on_error(run())
}

fn run() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let mut query = None;
    let mut limit = 10usize;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--limit" | "-n" => {
                limit = flag_value(&args, i, "--limit")?;
                i += 1;
            }
            _ if !args[i].starts_with('-') => query = Some(args[i].clone()),
            other => anyhow::bail!("unexpected argument '{other}'"),
        }
        i += 1;
    }
    let Some(query) = query else {
        anyhow::bail!("Usage: anthology-search <query> [--limit N]\nExample: anthology-search 'graph neural networks' --limit 5");
    };

    let app = App::start(None)?;
    println!("🔍 anthology-search\n==================");
    println!("Query: {}", query);
    let hits = app.retriever()?.search(&query, limit)?;
    println!("\n🔍 Found {} results for: \"{}\"", hits.len(), query);
    print_hits(&hits);
    Ok(())
}
