#![cfg_attr(not(test), no_std)]

extern crate alloc;

/* filesys 的整体架构，自上而下 */

// 文件系统门面：路径拆分、创建/打开/删除、格式化与关机
mod fs;

// 打开的文件：读写游标与禁写守卫
mod file;

// 目录层：以普通文件内容存储的名字到 inode 的映射，路径解析
mod dir;

// 索引节点层：打开实例共享、增长与回收
mod inode;

// 卷：缓存、空闲扇区分配器与打开 inode 表的归属者
mod volume;

// 空闲扇区位图
mod free_map;

// 磁盘数据结构层：表示磁盘文件系统的数据结构
pub mod layout;

// 块缓存层：内存上的扇区缓存，二次机会淘汰
mod cache;
mod clock;

mod sector;

pub use self::{
    cache::{BufferCache, CacheStats},
    clock::{Clock, Referenced},
    dir::{Dir, split_path},
    file::{File, Handle},
    free_map::{FreeMap, SectorAllocator},
    fs::FileSystem,
    inode::Inode,
    sector::SectorId,
};
pub use vfs::{Error, Result};

pub const MAGIC: u32 = 0x3b80_0002;
pub const SECTOR_SIZE: usize = 512;
pub const SECTOR_BITS: usize = SECTOR_SIZE * 8;

/// 根目录 inode 的固定扇区
pub const ROOT_DIR_SECTOR: SectorId = SectorId::new(1);
/// 空闲位图的起始扇区
pub const FREE_MAP_START: SectorId = SectorId::new(2);

type DataBlock = [u8; SECTOR_SIZE];

/// 运行期参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// 块缓存的槽位数，构造后不再变化
    pub cache_capacity: usize,
    /// 格式化时根目录预留的目录项个数
    pub root_entries: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_capacity: 64,
            root_entries: 16,
        }
    }
}
