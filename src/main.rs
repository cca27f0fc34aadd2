//! vcrwrap CLI

use std::path::{Path, PathBuf};
use std::process;

use vcrwrap::cassette::read_file;
use vcrwrap::{logging, CassetteName, Owner, Settings};

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if let Err(e) = logging::init(None) {
        eprintln!("{e}");
        process::exit(1);
    }

    if args.len() < 2 {
        usage();
        process::exit(1);
    }

    let command = &args[1];

    match command.as_str() {
        "name" => {
            if args.len() < 5 {
                eprintln!("Usage: vcrwrap name <module> <owner> <method>");
                process::exit(1);
            }
            let name = CassetteName::for_method(&args[2], &Owner::named(&args[3]), &args[4]);
            println!("{name}");
        }
        "sub" => {
            if args.len() < 4 {
                eprintln!("Usage: vcrwrap sub <parent-cassette> <name>");
                process::exit(1);
            }
            let parent = CassetteName::from_raw(&args[2]);
            println!("{}", parent.subcassette(&args[3]));
        }
        "stats" => {
            let settings = Settings::from_env();
            let dir = match args.get(2) {
                Some(dir) => PathBuf::from(dir),
                None => match settings.cassette_dir {
                    Some(dir) => dir,
                    None => {
                        eprintln!("Usage: vcrwrap stats <cassette-dir>");
                        eprintln!("(or set VCR_CASSETTE_PATH)");
                        process::exit(1);
                    }
                },
            };
            show_stats(&dir);
        }
        "check" => check_settings(&Settings::from_env()),
        _ => {
            eprintln!("Unknown command: {command}");
            eprintln!("Run 'vcrwrap' for usage information.");
            process::exit(1);
        }
    }
}

fn usage() {
    eprintln!("vcrwrap v{}", env!("CARGO_PKG_VERSION"));
    eprintln!();
    eprintln!("Usage: vcrwrap <command> [options]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  name <module> <owner> <method>   Print the cassette name for a test");
    eprintln!("  sub <parent> <name>              Print a namespaced subcassette name");
    eprintln!("  stats [cassette-dir]             Show cassette statistics");
    eprintln!("  check                            Validate VCR_* environment settings");
}

fn check_settings(settings: &Settings) {
    match settings.record_mode() {
        Ok(mode) => {
            println!("record mode:            {mode}");
            println!(
                "cassette dir:           {}",
                settings
                    .cassette_dir
                    .as_deref()
                    .map_or_else(|| "(default)".to_string(), |d| d.display().to_string())
            );
            println!(
                "make external requests: {}",
                settings.make_external_requests
            );
        }
        Err(e) => {
            eprintln!("{e}");
            process::exit(2);
        }
    }
}

fn show_stats(dir: &Path) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            eprintln!("Cannot read {}: {e}", dir.display());
            process::exit(1);
        }
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().and_then(|s| s.to_str()) == Some("yaml"))
        .collect();
    paths.sort();

    println!("Cassette directory: {}", dir.display());
    println!();

    let mut total = 0;
    for path in &paths {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        match read_file(path) {
            Ok(Some(file)) => {
                total += file.interactions.len();
                println!("{:>6}  {file_name}", file.interactions.len());
            }
            Ok(None) => {}
            Err(e) => println!("{:>6}  {file_name} ({e})", "error"),
        }
    }

    println!();
    println!("{} cassettes, {total} interactions", paths.len());
}
