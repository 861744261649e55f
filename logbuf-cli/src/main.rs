use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use logbuf::LogBuffer;

fn main() {
    #[cfg(feature = "tracing")]
    init_tracing();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Create(args) => create(args),
        Command::Inspect(args) => inspect(args),
        Command::Rotate(args) => rotate(args),
    };

    if let Err(err) = result {
        eprintln!("logbuf-cli: {err}");
        process::exit(1);
    }
}

#[derive(Parser)]
#[command(about = "Create, inspect, and manually rotate log buffer files")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a new log buffer file.
    Create(CreateArgs),
    /// Dump the metadata section of an existing log buffer file.
    Inspect(InspectArgs),
    /// Force a term rotation on an existing log buffer file.
    Rotate(RotateArgs),
}

#[derive(Parser)]
struct CreateArgs {
    #[arg(help = "Path to the log buffer file to create")]
    path: PathBuf,

    #[arg(long, default_value_t = 1 << 16, help = "Term length in bytes (power of two, 64 KiB..1 GiB)")]
    term_length: i32,

    #[arg(long, default_value_t = 4096, help = "File page size in bytes")]
    page_size: i32,

    #[arg(long, default_value_t = 0, help = "Initial term id")]
    initial_term_id: i32,

    #[arg(long, default_value_t = 1408, help = "Maximum transmission unit in bytes")]
    mtu_length: i32,

    #[arg(long, default_value_t = 0, help = "Correlation id to record in metadata")]
    correlation_id: i64,
}

fn create(args: CreateArgs) -> Result<(), logbuf::LogBufferError> {
    LogBuffer::create(
        &args.path,
        args.term_length,
        args.page_size,
        args.initial_term_id,
        args.mtu_length,
        args.correlation_id,
    )?;

    println!("created {}", args.path.display());
    Ok(())
}

#[derive(Parser)]
struct InspectArgs {
    #[arg(help = "Path to an existing log buffer file")]
    path: PathBuf,

    #[arg(long, help = "Term length the file was created with")]
    term_length: i32,
}

fn inspect(args: InspectArgs) -> Result<(), logbuf::LogBufferError> {
    let buffer = LogBuffer::open(&args.path, args.term_length)?;
    let metadata = buffer.metadata();

    println!("term length:          {}", buffer.term_length());
    println!("page size:             {}", metadata.page_size_plain());
    println!("initial term id:       {}", metadata.initial_term_id_plain());
    println!("mtu length:            {}", metadata.mtu_length_plain());
    println!("correlation id:        {}", metadata.correlation_id_plain());
    println!("active term count:     {}", metadata.active_term_count_acquire());
    println!("is connected:          {}", metadata.is_connected_acquire());
    println!("active transports:     {}", metadata.active_transport_count_acquire());
    println!("end of stream position:{}", metadata.end_of_stream_position_acquire());

    for partition in 0..3i32 {
        let raw = metadata.raw_tail(partition).read_acquire();
        let term_id = logbuf::tail::term_id(raw);
        let offset = logbuf::tail::term_offset(raw, buffer.term_length());
        println!("partition {partition}: term_id={term_id} offset={offset}");
    }

    Ok(())
}

#[derive(Parser)]
struct RotateArgs {
    #[arg(help = "Path to an existing log buffer file")]
    path: PathBuf,

    #[arg(long, help = "Term length the file was created with")]
    term_length: i32,

    #[arg(long, help = "The caller's belief about the currently active term count")]
    term_count: i32,

    #[arg(long, help = "The caller's belief about the currently active term id")]
    term_id: i32,
}

fn rotate(args: RotateArgs) -> Result<(), logbuf::LogBufferError> {
    let buffer = LogBuffer::open(&args.path, args.term_length)?;
    let rotated = buffer.rotate(args.term_count, args.term_id);

    if rotated {
        println!("rotated");
    } else {
        println!("not rotated: another actor already advanced this term");
    }

    Ok(())
}

#[cfg(feature = "tracing")]
fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_inspect_round_trip() {
        let path = tempfile::NamedTempFile::new()
            .unwrap()
            .into_temp_path()
            .to_path_buf();

        create(CreateArgs {
            path: path.clone(),
            term_length: 65536,
            page_size: 4096,
            initial_term_id: 3,
            mtu_length: 1408,
            correlation_id: 11,
        })
        .unwrap();

        inspect(InspectArgs {
            path: path.clone(),
            term_length: 65536,
        })
        .unwrap();

        let _ = std::fs::remove_file(&path);
    }
}
