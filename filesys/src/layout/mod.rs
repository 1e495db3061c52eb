//! # 磁盘数据结构层
//!
//! filesys 的磁盘布局：
//! 超级块 | 根目录 inode | 空闲扇区位图 | 按需分配的 inode、索引块与数据块

mod super_block;
pub use super_block::SuperBlock;

mod inode;
pub use inode::{DiskInode, DiskInodeKind, INDIRECT_COUNT, IndirectBlock, MAX_FILE_SIZE};

/// 目录项，也属于磁盘文件系统数据结构
mod dir_entry;
pub use dir_entry::{DirEntry, NAME_MAX};

/// 位图区域内扇区的结构
pub type BitmapBlock = [u64; crate::SECTOR_BITS / 64];

/// 可以直接由扇区字节解释而来的类型
///
/// # Safety
///
/// 实现者必须是 `#[repr(C)]` 或整数数组，任意字节序列都是它的合法值。
pub unsafe trait Pod: Sized {}

unsafe impl Pod for crate::DataBlock {}
unsafe impl Pod for BitmapBlock {}
unsafe impl Pod for IndirectBlock {}
