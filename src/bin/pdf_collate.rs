//! Collate pages from several PDFs into one.
//!
//! Usage:
//!   cargo run --bin pdf_collate -- a.pdf b.pdf
//!   cargo run --bin pdf_collate -- --pages 1-3,6 --move 6:1 --name bundle a.pdf b.pdf
//!
//! Page numbers refer to positions in the combined sequence (1-based), in
//! upload order before any `--move` is applied.

use pdf_collate::{AreaMode, EditorSession, NoticeLevel, PageId, SessionConfig};
use std::path::PathBuf;
use std::process::ExitCode;

struct CliConfig {
    inputs: Vec<PathBuf>,
    output_dir: PathBuf,
    name: Option<String>,
    config_file: Option<PathBuf>,
    pages: Option<String>,
    moves: Vec<String>,
    no_compress: bool,
    verbose: bool,
}

impl CliConfig {
    fn from_args() -> Result<Self, String> {
        let args: Vec<String> = std::env::args().collect();
        let mut config = Self {
            inputs: Vec::new(),
            output_dir: PathBuf::from("."),
            name: None,
            config_file: None,
            pages: None,
            moves: Vec::new(),
            no_compress: false,
            verbose: false,
        };

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--output-dir" | "-o" => {
                    i += 1;
                    config.output_dir = PathBuf::from(value(&args, i, "--output-dir")?);
                },
                "--name" => {
                    i += 1;
                    config.name = Some(value(&args, i, "--name")?.to_string());
                },
                "--config" => {
                    i += 1;
                    config.config_file = Some(PathBuf::from(value(&args, i, "--config")?));
                },
                "--pages" => {
                    i += 1;
                    config.pages = Some(value(&args, i, "--pages")?.to_string());
                },
                "--move" => {
                    i += 1;
                    config.moves.push(value(&args, i, "--move")?.to_string());
                },
                "--no-compress" => {
                    config.no_compress = true;
                },
                "--verbose" | "-v" => {
                    config.verbose = true;
                },
                "--help" | "-h" => {
                    return Err(String::new());
                },
                other if other.starts_with('-') => {
                    return Err(format!("unknown option {}", other));
                },
                other => config.inputs.push(PathBuf::from(other)),
            }
            i += 1;
        }

        if config.inputs.is_empty() {
            return Err("no input files".to_string());
        }
        Ok(config)
    }
}

fn value<'a>(args: &'a [String], i: usize, flag: &str) -> Result<&'a str, String> {
    args.get(i)
        .map(String::as_str)
        .ok_or_else(|| format!("{} expects a value", flag))
}

/// Parse `1-3,6` into 1-based positions.
fn parse_positions(arg: &str) -> Result<Vec<usize>, String> {
    let mut positions = Vec::new();
    for part in arg.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (start, end) = match part.split_once('-') {
            Some((a, b)) => (parse_position(a)?, parse_position(b)?),
            None => {
                let n = parse_position(part)?;
                (n, n)
            },
        };
        if start > end {
            return Err(format!("descending range {}", part));
        }
        positions.extend(start..=end);
    }
    Ok(positions)
}

fn parse_position(text: &str) -> Result<usize, String> {
    match text.trim().parse::<usize>() {
        Ok(0) | Err(_) => Err(format!("invalid page number '{}'", text)),
        Ok(n) => Ok(n),
    }
}

/// Parse `FROM:TO` into 0-based indices.
fn parse_move(arg: &str) -> Result<(usize, usize), String> {
    let (from, to) = arg
        .split_once(':')
        .ok_or_else(|| format!("invalid move '{}', expected FROM:TO", arg))?;
    Ok((parse_position(from)? - 1, parse_position(to)? - 1))
}

fn print_usage() {
    eprintln!("Usage: pdf_collate [options] <input.pdf>...");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -o, --output-dir DIR   where to write the result (default: .)");
    eprintln!("      --name NAME        output name without extension");
    eprintln!("      --config FILE      JSON session configuration");
    eprintln!("      --pages LIST       pages to keep, e.g. 1-3,6 (default: all)");
    eprintln!("      --move FROM:TO     move one page; may be repeated");
    eprintln!("      --no-compress      do not compress output streams");
    eprintln!("  -v, --verbose          list the final page sequence");
}

fn flush_notices(session: &mut EditorSession) {
    for notice in session.drain_notices() {
        match notice.level {
            NoticeLevel::Success => println!("✓ {}", notice.message),
            NoticeLevel::Error => eprintln!("✗ {}", notice.message),
        }
    }
}

fn run(cli: CliConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &cli.config_file {
        Some(path) => SessionConfig::from_json_file(path)?,
        None => SessionConfig::new(),
    };
    if let Some(name) = &cli.name {
        config = config.with_export_name(name.clone());
    }
    if cli.no_compress {
        config = config.with_compression(false);
    }

    let mut session = EditorSession::new(config);
    session.initialize()?;
    let upload = session.upload_paths(&cli.inputs);
    flush_notices(&mut session);
    upload?;

    if let Some(arg) = &cli.pages {
        let ids: Vec<PageId> = parse_positions(arg)?
            .into_iter()
            .filter_map(|n| session.pages().get(n - 1).map(|p| p.id()))
            .collect();
        session.deselect_all_pages();
        session.select_pages_by_area(&ids, AreaMode::Select);
        session.drain_notices();
    }

    for arg in &cli.moves {
        let (from, to) = parse_move(arg)?;
        if !session.reorder_pages(from, to) {
            log::warn!("Ignoring move {}: out of range", arg);
        }
    }

    if cli.verbose {
        for (i, page) in session.pages().iter().enumerate() {
            let mark = if page.is_selected() { "x" } else { " " };
            println!("[{}] {:>3}. {}", mark, i + 1, page.label());
        }
    }
    println!("{}", session.summary_text());

    std::fs::create_dir_all(&cli.output_dir)?;
    let written = session.export_to_dir(&cli.output_dir);
    flush_notices(&mut session);
    let path = written?;
    println!("Output: {}", path.display());
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();

    let cli = match CliConfig::from_args() {
        Ok(cli) => cli,
        Err(message) => {
            if !message.is_empty() {
                eprintln!("Error: {}", message);
            }
            print_usage();
            return ExitCode::from(2);
        },
    };

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        },
    }
}
