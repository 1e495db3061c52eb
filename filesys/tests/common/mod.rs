#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use block_dev::BlockDevice;
use filesys::{Config, File, FileSystem, Handle, SECTOR_SIZE};

/// 内存中的块设备，记录每个扇区被写入的次数
pub struct RamDisk {
    sectors: Mutex<Vec<[u8; SECTOR_SIZE]>>,
    writes: Mutex<Vec<usize>>,
}

impl RamDisk {
    pub fn new(sectors: usize) -> Arc<Self> {
        Self::filled(sectors, 0)
    }

    /// 所有扇区预先填满 `byte`，用来暴露未清零的新扇区
    pub fn filled(sectors: usize, byte: u8) -> Arc<Self> {
        Arc::new(Self {
            sectors: Mutex::new(vec![[byte; SECTOR_SIZE]; sectors]),
            writes: Mutex::new(vec![0; sectors]),
        })
    }

    pub fn writes(&self, block_id: usize) -> usize {
        self.writes.lock().unwrap()[block_id]
    }
}

impl BlockDevice for RamDisk {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) {
        buf.copy_from_slice(&self.sectors.lock().unwrap()[block_id]);
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) {
        self.sectors.lock().unwrap()[block_id].copy_from_slice(buf);
        self.writes.lock().unwrap()[block_id] += 1;
    }
}

pub fn format(disk: &Arc<RamDisk>, sectors: u32, config: Config) -> FileSystem {
    match FileSystem::format(disk.clone(), sectors, config) {
        Ok(fs) => fs,
        Err(err) => panic!("format: {err}"),
    }
}

/// 默认配置下格式化一块全新的内存盘
pub fn fresh(sectors: u32) -> (Arc<RamDisk>, FileSystem) {
    let disk = RamDisk::new(sectors as usize);
    let fs = format(&disk, sectors, Config::default());
    (disk, fs)
}

pub fn open_file(fs: &FileSystem, path: &str) -> File {
    match fs.open(None, path) {
        Ok(Handle::File(file)) => file,
        Ok(Handle::Dir(_)) => panic!("{path} is a directory"),
        Err(err) => panic!("open {path}: {err}"),
    }
}

/// 有规律但不重复的字节序列
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 251) as u8).collect()
}
