use std::env;
use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use std::sync::Arc;

use anthology_cli::{exit_on_error, flag_value, print_hits, App};
use anthology_core::traits::Retriever;
use anthology_rag::{QueryPipeline, QueryRequest, QueryResponse};

const USAGE: &str = "Usage: anthology <command>\n\n\
  build [--force] [--corpus PATH]   build or load the index\n\
  search \"<query>\" [--limit N]      show the nearest chunks\n\
  ask \"<question>\"                  answer one question\n\
  chat                              answer questions from stdin until an empty line";

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();
    let Some(command) = args.first() else {
        eprintln!("{USAGE}");
        return ExitCode::FAILURE;
    };
    let rest = &args[1..];
    let result = match command.as_str() {
        "build" => build(rest),
        "search" => search(rest),
        "ask" => ask(rest),
        "chat" => chat(),
        "-h" | "--help" | "help" => {
            println!("{USAGE}");
            Ok(())
        }
        other => Err(anyhow::anyhow!("unknown command '{other}'\n{USAGE}")),
    };
    exit_on_error(result)
}

fn build(args: &[String]) -> anyhow::Result<()> {
    let mut force = false;
    let mut corpus = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--force" | "-f" => force = true,
            "--corpus" => {
                corpus = Some(flag_value::<String>(args, i, "--corpus")?);
                i += 1;
            }
            other => anyhow::bail!("unexpected argument '{other}'"),
        }
        i += 1;
    }
    let app = App::start(corpus.as_deref())?;
    let mut manager = app.manager();
    println!("📚 anthology build\n==================");
    if let Some(path) = app.corpus_path() {
        println!("Corpus: {}", path.display());
    }
    println!("Index directory: {}", manager.paths().dir.display());
    let index = manager.build(None, force)?;
    println!(
        "\n✅ Index ready: {} documents, {} chunks (build {})",
        index.document_count(),
        index.len(),
        index.build_id()
    );
    Ok(())
}

fn search(args: &[String]) -> anyhow::Result<()> {
    let mut query = None;
    let mut limit = 5usize;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--limit" | "-n" => {
                limit = flag_value(args, i, "--limit")?;
                i += 1;
            }
            _ if !args[i].starts_with('-') => query = Some(args[i].clone()),
            other => anyhow::bail!("unexpected argument '{other}'"),
        }
        i += 1;
    }
    let query = query.ok_or_else(|| anyhow::anyhow!("search needs a query\n{USAGE}"))?;
    let app = App::start(None)?;
    let hits = app.retriever()?.search(&query, limit)?;
    println!("\n🔍 Found {} results for: \"{}\"", hits.len(), query);
    print_hits(&hits);
    Ok(())
}

fn pipeline() -> anyhow::Result<QueryPipeline> {
    let app = App::start(None)?;
    let retriever = app.retriever()?;
    Ok(QueryPipeline::from_settings(&app.settings, retriever as Arc<dyn Retriever>)?)
}

fn ask(args: &[String]) -> anyhow::Result<()> {
    let question = args.join(" ");
    if question.trim().is_empty() {
        anyhow::bail!("ask needs a question\n{USAGE}");
    }
    let response = pipeline()?.ask(QueryRequest::new(question))?;
    print_response(&response);
    Ok(())
}

fn chat() -> anyhow::Result<()> {
    let pipeline = pipeline()?;
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("\n❓ ");
        io::stdout().flush()?;
        let Some(line) = lines.next() else { break };
        let line = line?;
        if line.trim().is_empty() {
            break;
        }
        match pipeline.ask(QueryRequest::new(line)) {
            Ok(response) => print_response(&response),
            Err(failure) => eprintln!("Error ({}): {}", failure.status.http_code(), failure.message),
        }
    }
    println!("👋 Bye");
    Ok(())
}

fn print_response(response: &QueryResponse) {
    println!("\n💬 {}", response.answer);
    if let Some(sources) = &response.sources {
        println!("\n📎 Sources:");
        for (i, source) in sources.iter().enumerate() {
            let title = source.title.as_deref().unwrap_or("untitled");
            println!("  {}. {} (score {:.4})", i + 1, title, source.score);
            if let Some(Some(url)) = source.metadata.get("url") {
                println!("     {}", anthology_core::types::render_value(url));
            }
        }
    }
}
