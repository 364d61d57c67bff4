#![deny(clippy::pedantic)]

use anyhow::Result;
use camino::{Utf8Path, Utf8PathBuf};
use cbz_epub::{book::DEFAULT_OUTPUT_DIR, Batch, BookOutcome, Config};
use clap::Parser;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory containing the epub files to convert
    #[clap(long, short, default_value = ".")]
    input_dir: Utf8PathBuf,
    /// Dir to output the cbz archives and their image folders
    #[clap(long, short, default_value = DEFAULT_OUTPUT_DIR)]
    outdir: Utf8PathBuf,
}

fn print_header(epub: &Utf8Path) {
    println!("\nProcessing: {}", file_name(epub));
}

fn print_outcome(epub: &Utf8Path, outcome: &BookOutcome) {
    match outcome {
        BookOutcome::Converted { found, assembled } => {
            println!("  Found {found} images");
            println!("  Created CBZ: {}", file_name(&assembled.cbz));
            println!("  Image folder: {}", file_name(&assembled.image_dir));
        }
        BookOutcome::Skipped => {
            println!("  Found 0 images");
            println!("  No images found, skipping...");
        }
        BookOutcome::Failed { error } => {
            println!("  Error processing {}: {error}", file_name(epub));
        }
    }
}

fn file_name(path: &Utf8Path) -> &str {
    path.file_name().unwrap_or(path.as_str())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let config = Config::new(args.input_dir, args.outdir);

    let batch = Batch::discover(&config)?;
    if batch.is_empty() {
        println!("No EPUB files found in {}", config.input_dir);
        return Ok(());
    }
    println!("Found {} EPUB file(s)", batch.len());

    let report = batch.run(&config, print_header, print_outcome)?;

    println!(
        "\nProcessing completed! {} converted, {} skipped, {} failed",
        report.converted(),
        report.skipped(),
        report.failed()
    );
    let output_dir = config
        .output_dir
        .canonicalize_utf8()
        .unwrap_or(config.output_dir);
    println!("Output directory: {output_dir}");

    Ok(())
}
