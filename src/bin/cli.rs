//! ministore CLI
//!
//! Build and inspect container images from the command line.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use ministore::{BlockFile, Config, MiniStore, MiniStoreError, MiniStoreRoots, Result};
use tracing_subscriber::{fmt, EnvFilter};

/// ministore CLI
#[derive(Parser, Debug)]
#[command(name = "ministore-cli")]
#[command(about = "Inspect and build compound document mini stores")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new image holding a number of small streams
    Create {
        /// Output image path
        #[arg(short, long)]
        output: PathBuf,

        /// Number of streams to write
        #[arg(short, long, default_value = "4")]
        streams: usize,

        /// Size of each stream in bytes
        #[arg(long, default_value = "100")]
        size: usize,

        /// Big block size (512 or 4096)
        #[arg(short, long, default_value = "512")]
        big_block_size: usize,
    },

    /// Print geometry, occupancy, and size accounting of an image
    Inspect {
        /// Image path
        path: PathBuf,

        /// First big block of the mini stream (from the root directory entry)
        #[arg(short, long)]
        mini_stream_start: Option<u32>,
    },

    /// Print the mini sectors of one chain
    Chain {
        /// Image path
        path: PathBuf,

        /// First mini sector of the chain
        #[arg(short, long)]
        start: u32,

        /// First big block of the mini stream (from the root directory entry)
        #[arg(short, long)]
        mini_stream_start: Option<u32>,
    },
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,ministore=debug"));

    fmt().with_env_filter(filter).with_target(true).init();

    let args = Args::parse();

    tracing::debug!("ministore-cli v{}", ministore::VERSION);

    let result = match args.command {
        Commands::Create {
            output,
            streams,
            size,
            big_block_size,
        } => create(&output, streams, size, big_block_size),
        Commands::Inspect {
            path,
            mini_stream_start,
        } => inspect(&path, mini_stream_start),
        Commands::Chain {
            path,
            start,
            mini_stream_start,
        } => chain(&path, start, mini_stream_start),
    };

    if let Err(e) = result {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn create(output: &Path, streams: usize, size: usize, big_block_size: usize) -> Result<()> {
    let config = Config::builder().big_block_size(big_block_size).build();
    if !config.fits_mini_stream(size as u64) {
        return Err(MiniStoreError::Config(format!(
            "streams of {} bytes exceed the mini-stream cutoff of {}",
            size, config.mini_stream_cutoff
        )));
    }

    let mut store = MiniStore::create(BlockFile::new(&config)?, &config)?;
    for i in 0..streams {
        let data: Vec<u8> = (0..size).map(|b| (i + b) as u8).collect();
        match store.update_contents(None, &data)? {
            Some(head) => println!("stream {:>4}: starts at mini sector {}", i, head),
            None => println!("stream {:>4}: empty", i),
        }
    }

    let info = store.flush()?;
    let mut file = store.into_storage();
    file.header_mut()
        .set_mini_fat(info.mini_fat_start, info.mini_fat_blocks);
    file.save(output)?;

    tracing::info!("Wrote {}", output.display());
    println!("mini stream start: {}", fmt_start(info.mini_stream_start));
    println!("mini stream size:  {}", info.size);
    Ok(())
}

fn inspect(path: &Path, mini_stream_start: Option<u32>) -> Result<()> {
    let mut store = open_store(path, mini_stream_start)?;
    let info = store.info();
    let layout = store.layout();

    println!("big block size:     {}", layout.big_block_size());
    println!("mini sector size:   {}", layout.mini_sector_size());
    println!("blocks in image:    {}", store.storage().physical_block_count());
    println!("FAT sectors:        {}", store.storage().fat_sectors().len());
    println!("mini-FAT start:     {}", fmt_start(info.mini_fat_start));
    println!("mini-FAT blocks:    {}", info.mini_fat_blocks);
    println!("mini stream start:  {}", fmt_start(info.mini_stream_start));
    println!("mini stream blocks: {}", info.mini_stream_blocks);
    println!("sectors in use:     {}", store.table().occupied_count());
    println!("computed size:      {}", info.size);
    println!("high water mark:    {}", info.high_water_mark);
    println!("next free sector:   {}", store.get_free_block()?);
    Ok(())
}

fn chain(path: &Path, start: u32, mini_stream_start: Option<u32>) -> Result<()> {
    let store = open_store(path, mini_stream_start)?;
    let sectors = store.read_chain(start)?;

    let rendered: Vec<String> = sectors.iter().map(|s| s.to_string()).collect();
    println!("{} -> END_OF_CHAIN", rendered.join(" -> "));
    println!("{} sector(s)", sectors.len());
    Ok(())
}

fn open_store(path: &Path, mini_stream_start: Option<u32>) -> Result<MiniStore<BlockFile>> {
    let file = BlockFile::open(path)?;
    let config = file.header().config()?;
    let roots = MiniStoreRoots {
        mini_fat_start: file.header().mini_fat_start(),
        mini_stream_start,
    };
    MiniStore::open(file, &config, roots)
}

fn fmt_start(start: Option<u32>) -> String {
    start.map_or_else(|| "none".to_string(), |s| s.to_string())
}
