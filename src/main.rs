//! Main entry point for the remotezip CLI.
//!
//! Lists and extracts ZIP archives from the local filesystem or from remote
//! HTTP servers. Remote extraction fetches every requested entry with a
//! single multi-range request.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use remotezip::{Cli, FileSource, HttpSource, MemoryCache, RangeSource, ZipReader};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    if cli.is_http_url() {
        let source = Arc::new(HttpSource::new(cli.file.clone()).await?);
        let reader = ZipReader::open(source.clone(), MemoryCache::new()).await?;
        process_zip(&reader, &cli).await?;

        // Display network transfer statistics for HTTP sources.
        if !cli.is_quiet() {
            eprintln!(
                "\nTotal bytes transferred: {}",
                format_size(source.transferred_bytes())
            );
        }
        reader.close().await?;
    } else {
        let source = FileSource::open(Path::new(&cli.file))?;
        let reader = ZipReader::open(source, MemoryCache::new()).await?;
        process_zip(&reader, &cli).await?;
        reader.close().await?;
    }

    Ok(())
}

/// Dispatch between list and extract modes.
async fn process_zip<S: RangeSource>(
    reader: &ZipReader<S, MemoryCache>,
    cli: &Cli,
) -> Result<()> {
    if cli.list || cli.verbose {
        return list_files(reader, cli.verbose);
    }

    // Determine which entries to extract: the requested names, or every
    // file in the archive (directories are created as a side effect).
    let mut names: Vec<String> = if cli.entries.is_empty() {
        reader
            .files()
            .into_iter()
            .filter(|name| !name.ends_with('/'))
            .map(str::to_string)
            .collect()
    } else {
        cli.entries.clone()
    };
    names.sort();

    if names.is_empty() {
        if !cli.is_quiet() {
            eprintln!("Nothing to extract");
        }
        return Ok(());
    }

    // One bulk fetch up front: for HTTP sources this is a single
    // multi-range request covering every entry.
    let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
    reader.cache_files(&name_refs).await?;

    for name in &names {
        extract_file(reader, name, cli).await?;
    }
    Ok(())
}

/// List archive contents, either bare names or a detail table.
fn list_files<S: RangeSource>(reader: &ZipReader<S, MemoryCache>, verbose: bool) -> Result<()> {
    let mut names = reader.files();
    names.sort_unstable();

    if !verbose {
        for name in names {
            println!("{name}");
        }
        return Ok(());
    }

    println!(
        "{:>10}  {:>10}  {:>8}  {:>16}  Name",
        "Length", "Size", "CRC-32", "Modified"
    );
    println!("{}", "-".repeat(70));

    let mut total_uncompressed = 0u64;
    let mut total_compressed = 0u64;
    let mut file_count = 0usize;

    for name in names {
        let meta = reader.file_metadata(name)?;
        println!(
            "{:>10}  {:>10}  {:08x}  {}  {}",
            meta.uncompressed_size,
            meta.compressed_size,
            meta.crc32,
            meta.last_modified.format("%Y-%m-%d %H:%M"),
            meta.name
        );
        if !name.ends_with('/') {
            total_uncompressed += meta.uncompressed_size;
            total_compressed += meta.compressed_size;
            file_count += 1;
        }
    }

    println!("{}", "-".repeat(70));
    println!("{total_uncompressed:>10}  {total_compressed:>10}  {file_count} files");
    Ok(())
}

/// Write one cached entry to its destination.
async fn extract_file<S: RangeSource>(
    reader: &ZipReader<S, MemoryCache>,
    name: &str,
    cli: &Cli,
) -> Result<()> {
    if cli.pipe {
        let mut stream = reader.file_stream(name).await?;
        let mut stdout = std::io::stdout().lock();
        std::io::copy(&mut stream, &mut stdout)?;
        stdout.flush()?;
        return Ok(());
    }

    let output_path = match &cli.extract_dir {
        Some(dir) => PathBuf::from(dir).join(name),
        None => PathBuf::from(name),
    };

    if output_path.exists() && !cli.overwrite {
        if !cli.is_quiet() {
            eprintln!("Skipping: {name} (use -o to overwrite)");
        }
        return Ok(());
    }

    if let Some(parent) = output_path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    if !cli.is_quiet() {
        println!("  extracting: {name}");
    }

    let mut stream = reader.file_stream(name).await?;
    let mut file = fs::File::create(&output_path)?;
    std::io::copy(&mut stream, &mut file)?;
    Ok(())
}

/// Format a byte size into a human-readable string.
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{size} bytes")
    }
}
