mod cli;

use std::fs::OpenOptions;
use std::io;
use std::sync::Arc;

use block_dev::BlockDevice;
use clap::Parser;
use filesys::{Config, FileSystem, SECTOR_SIZE};
use filesys_fuse::BlockFile;
use typed_bytesize::ByteSizeIec;

use self::cli::Cli;

fn main() -> io::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    println!("source={:?}\nout={:?}", cli.source, cli.out);

    let disk_size = ByteSizeIec::mib(cli.size).0;
    let fd = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(&cli.out)?;
    fd.set_len(disk_size)?;

    let block_dev: Arc<dyn BlockDevice> = Arc::new(BlockFile::new(fd));
    let total_sectors = (disk_size / SECTOR_SIZE as u64) as u32;
    let config = Config {
        cache_capacity: cli.cache,
        ..Config::default()
    };
    let fs = FileSystem::format(block_dev, total_sectors, config).map_err(io::Error::other)?;

    let root = fs.root().map_err(io::Error::other)?;
    let files = filesys_fuse::pack(&fs, &root, &cli.source)?;
    println!("{files} files packed, {} sectors free", fs.free_sectors());

    if cli.tree {
        println!("/");
        filesys_fuse::tree(&fs, &root, 1, &mut io::stdout().lock())?;
    }

    drop(root);
    fs.shutdown();

    Ok(())
}
