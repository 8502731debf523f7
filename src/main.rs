use std::io::{self, Read};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use is_terminal::IsTerminal;
use owo_colors::OwoColorize;

use wasmpad::cli::Cli;
use wasmpad::client::CompileClient;
use wasmpad::config::Config;
use wasmpad::coordinator::{CycleOutcome, ExecutionCoordinator, Trigger};
use wasmpad::editor::{format_source, BufferEditor, EditorRegistry};
use wasmpad::loader::WasmLoader;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    // CLI overrides land in the environment before the config loads.
    if let Some(url) = args.url.as_deref() {
        std::env::set_var("COMPILE_URL", url);
    }
    if let Some(timeout) = args.timeout {
        std::env::set_var("REQUEST_TIMEOUT", timeout.to_string());
    }
    let cfg = Config::load();

    // Source text: file argument, else piped stdin.
    let mut source = match args.source.as_deref() {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {path}"))?,
        None => {
            if io::stdin().is_terminal() {
                bail!("provide a source file or pipe source text on stdin");
            }
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    if !args.no_format {
        source = format_source(&source);
    }

    let package = args
        .package
        .clone()
        .or_else(|| cfg.get("DEFAULT_PACKAGE"))
        .unwrap_or_else(|| "demo_code".to_string());

    let driver = if let Some(snippet) = &args.run {
        Some(snippet.clone())
    } else if let Some(path) = &args.run_file {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {path}"))?;
        Some(text.trim().to_string())
    } else {
        None
    };

    let mut editors = EditorRegistry::new();
    editors.insert(package.as_str(), Arc::new(BufferEditor::new(source)));
    if let Some(snippet) = &driver {
        editors.insert(
            EditorRegistry::driver_id(&package),
            Arc::new(BufferEditor::new(snippet.clone())),
        );
    }

    let client = CompileClient::from_config(&cfg)?;
    let loader = WasmLoader::from_config(&cfg)?;
    let trigger = Arc::new(Trigger::new());
    let mut coordinator =
        ExecutionCoordinator::new(Arc::new(client), Arc::new(loader), editors, trigger);

    let outcome = if driver.is_some() {
        coordinator.compile_and_run(&package).await?
    } else {
        coordinator.compile(&package).await?
    };

    match outcome {
        CycleOutcome::Rejected { stdout, stderr } => {
            if !stdout.is_empty() {
                println!("{stdout}");
            }
            if !stderr.is_empty() {
                eprintln!("{}", stderr.red());
            }
            bail!("compilation failed");
        }
        CycleOutcome::Built => {
            println!("{}", "compiled and loaded".green());
        }
        CycleOutcome::Ran(Some(value)) => {
            println!("{value}");
        }
        CycleOutcome::Ran(None) => {
            println!("{}", "driver completed".green());
        }
    }
    Ok(())
}
