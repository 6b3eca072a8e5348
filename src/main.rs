//! Overdub CLI

use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use overdub::cassette::{Body, CassetteStore};

fn main() {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Overdub v{}", env!("CARGO_PKG_VERSION"));
        eprintln!();
        eprintln!("Usage: overdub <command> [options]");
        eprintln!();
        eprintln!("Commands:");
        eprintln!("  ls <dir>            List cassettes in a library directory");
        eprintln!("  show <dir> <name>   Show the interactions in a cassette");
        process::exit(1);
    }

    let command = &args[1];

    let result = match command.as_str() {
        "ls" => {
            if args.len() < 3 {
                eprintln!("Usage: overdub ls <dir>");
                process::exit(1);
            }
            list_cassettes(&PathBuf::from(&args[2]))
        }
        "show" => {
            if args.len() < 4 {
                eprintln!("Usage: overdub show <dir> <name>");
                process::exit(1);
            }
            show_cassette(&PathBuf::from(&args[2]), &args[3])
        }
        _ => {
            eprintln!("Unknown command: {command}");
            eprintln!("Run 'overdub' for usage information.");
            process::exit(1);
        }
    };

    if let Err(err) = result {
        eprintln!("Error: {err:#}");
        process::exit(1);
    }
}

fn list_cassettes(dir: &Path) -> Result<()> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory {}", dir.display()))?;

    let mut names: Vec<String> = entries
        .filter_map(std::result::Result::ok)
        .filter_map(|entry| {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                path.file_stem()
                    .and_then(|stem| stem.to_str())
                    .filter(|stem| !stem.starts_with('.'))
                    .map(ToString::to_string)
            } else {
                None
            }
        })
        .collect();
    names.sort();

    let store = CassetteStore::new(dir);
    for name in names {
        match store.load(&name) {
            Some(cassette) => {
                println!("{name}  ({} interactions)", cassette.interactions.len());
            }
            None => println!("{name}  (unreadable)"),
        }
    }

    Ok(())
}

fn show_cassette(dir: &Path, name: &str) -> Result<()> {
    let store = CassetteStore::new(dir);
    let cassette = store
        .load(name)
        .with_context(|| format!("No cassette named '{name}' in {}", dir.display()))?;

    println!("Cassette: {}", cassette.name);
    for (i, interaction) in cassette.interactions.iter().enumerate() {
        let body_len = interaction.response_body.as_ref().map_or(0, Body::len);
        println!(
            "{i:3}  {} {} -> {} ({body_len} body bytes)",
            interaction.request.method, interaction.request.url, interaction.response.status
        );
    }

    Ok(())
}
