use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
pub struct Cli {
    /// Host directory mirrored into the image
    #[arg(long, short)]
    pub source: PathBuf,

    /// Output image
    #[arg(long, short)]
    pub out: PathBuf,

    /// Image size in MiB
    #[arg(long, default_value_t = 16)]
    pub size: u64,

    /// Number of buffer cache slots
    #[arg(long, default_value_t = 64)]
    pub cache: usize,

    /// Print the packed tree
    #[arg(long)]
    pub tree: bool,
}
