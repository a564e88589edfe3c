use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use minisql::{Config, Database};

/// Interactive shell for the minisql engine.
#[derive(Debug, Parser)]
#[command(name = "minisql", version, about)]
struct Args {
    /// Directory holding the database files
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Log filter, e.g. info or minisql=debug
    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let mut config = Config::from_env();
    if let Some(data_dir) = args.data_dir {
        config.data_dir = data_dir;
    }
    if let Some(log_level) = args.log_level {
        config.log_level = log_level;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let db = match Database::open(config) {
        Ok(db) => db,
        Err(err) => {
            eprintln!("failed to open database: {}", err);
            return ExitCode::FAILURE;
        }
    };

    println!("minisql shell - type 'help' for commands, 'quit' to exit");
    let stdin = io::stdin();
    loop {
        print!("minisql> ");
        if io::stdout().flush().is_err() {
            break;
        }
        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match input.to_lowercase().as_str() {
            "quit" | "exit" => break,
            "help" => {
                println!("commands: tables, history, reset, quit");
                println!("anything else is executed as SQL");
                continue;
            }
            "tables" => {
                match db.tables() {
                    Ok(tables) if tables.is_empty() => println!("no tables"),
                    Ok(tables) => {
                        for table in tables {
                            let columns: Vec<String> = table
                                .columns
                                .iter()
                                .map(|c| format!("{} {}", c.name, c.datatype))
                                .collect();
                            println!(
                                "{} ({}) - {} row(s)",
                                table.name,
                                columns.join(", "),
                                table.row_count
                            );
                        }
                    }
                    Err(err) => println!("error: {}", err),
                }
                continue;
            }
            "history" => {
                for entry in db.history("shell", 20).queries {
                    let status = if entry.success { "ok" } else { "failed" };
                    println!("[{}] {:.2}ms {}", status, entry.time_ms, entry.query);
                }
                continue;
            }
            "reset" => {
                match db.reset() {
                    Ok(()) => println!("database reset"),
                    Err(err) => println!("error: {}", err),
                }
                continue;
            }
            _ => {}
        }

        let outcome = db.execute(input, Some("shell"));
        if !outcome.success {
            println!("{}", outcome.error.unwrap_or_else(|| "unknown error".into()));
            continue;
        }
        if let (Some(columns), Some(rows)) = (&outcome.columns, &outcome.result) {
            print_table(columns, rows);
        }
        if let Some(message) = outcome.message {
            println!("{} ({:.2}ms)", message, outcome.time_ms);
        }
    }
    ExitCode::SUCCESS
}

/// Renders rows in a fixed-width grid.
fn print_table(columns: &[String], rows: &[serde_json::Map<String, serde_json::Value>]) {
    let mut widths: Vec<usize> = columns.iter().map(|c| c.len()).collect();
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .enumerate()
                .map(|(i, column)| {
                    let text = match row.get(column) {
                        Some(serde_json::Value::Null) | None => "NULL".to_string(),
                        Some(serde_json::Value::String(s)) => s.clone(),
                        Some(other) => other.to_string(),
                    };
                    widths[i] = widths[i].max(text.len());
                    text
                })
                .collect()
        })
        .collect();

    let header: Vec<String> = columns
        .iter()
        .zip(&widths)
        .map(|(c, w)| format!("{:<width$}", c, width = w))
        .collect();
    println!("{}", header.join(" | "));
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    println!("{}", rule.join("-+-"));
    for row in cells {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(text, w)| format!("{:<width$}", text, width = w))
            .collect();
        println!("{}", line.join(" | "));
    }
}
