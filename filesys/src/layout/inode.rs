//! 两级间接索引
//! - 二级索引块：整个块连续存储**扇区号**，每个编号都指向一个一级索引块
//! - 一级索引块：整个块连续存储**扇区号**，每个编号都指向一个**数据块**
//!
//! inode 只持有一个二级索引块的编号，索引块按需分配。
//! 目录的空间用于存放子项的目录项；文件的空间用于存放它的数据。
//!
//! ## 块索引编码
//!
//! 逻辑块索引除以 [`INDIRECT_COUNT`] 得到二级索引块内的位置，
//! 取模得到一级索引块内的位置。

use alloc::vec::Vec;

use super::Pod;
use crate::BufferCache;
use crate::{SECTOR_SIZE, SectorId};

/// 标识 inode 的魔数
const INODE_MAGIC: u32 = 0x494e_4f44;

/// 间接索引块的编号容量
pub const INDIRECT_COUNT: usize = SECTOR_SIZE / 4;
/// 间接索引块
pub type IndirectBlock = [u32; INDIRECT_COUNT];

/// 两级索引可编号的数据块数量
const MAX_DATA_SECTORS: usize = INDIRECT_COUNT * INDIRECT_COUNT;
/// 单个文件的最大字节数，8 MiB
pub const MAX_FILE_SIZE: usize = MAX_DATA_SECTORS * SECTOR_SIZE;

/// 磁盘上的 inode，恰好占一个扇区；所在扇区号即 inumber
#[derive(Clone)]
#[repr(C)]
pub struct DiskInode {
    /// 指向二级索引块，0 表示尚未分配
    double_indirect: u32,
    /// 类型，见 [`DiskInodeKind`]
    kind: u32,
    // 不用usize是为了严控布局
    pub length: u32,
    magic: u32,
    /// 目录的父目录所在扇区；文件恒为 0
    parent: u32,
    unused: [u32; 123],
}

unsafe impl Pod for DiskInode {}

#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
#[repr(u32)]
pub enum DiskInodeKind {
    #[default]
    File = 0,
    Directory = 1,
}

impl DiskInode {
    pub const fn new(kind: DiskInodeKind, parent: SectorId) -> Self {
        Self {
            double_indirect: 0,
            kind: kind as u32,
            length: 0,
            magic: INODE_MAGIC,
            parent: parent.raw(),
            unused: [0; 123],
        }
    }

    #[inline]
    pub fn kind(&self) -> DiskInodeKind {
        if self.kind == DiskInodeKind::Directory as u32 {
            DiskInodeKind::Directory
        } else {
            DiskInodeKind::File
        }
    }

    #[inline]
    pub fn is_dir(&self) -> bool {
        self.kind() == DiskInodeKind::Directory
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.magic == INODE_MAGIC
    }

    #[inline]
    pub fn parent(&self) -> SectorId {
        SectorId::new(self.parent)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.length as usize
    }

    /// 逻辑上 inode 指向一系列数据块，此处传入的是这些数据块的索引（逻辑索引），
    /// 然后返回给**块缓存层**使用的扇区号
    pub fn sector_of(&self, block_index: usize, cache: &BufferCache) -> SectorId {
        debug_assert!(block_index < Self::count_data_sectors(self.length));

        let single = cache.map(
            SectorId::new(self.double_indirect),
            |double: &IndirectBlock| double[block_index / INDIRECT_COUNT],
        );
        cache.map(SectorId::new(single), |single: &IndirectBlock| {
            SectorId::new(single[block_index % INDIRECT_COUNT])
        })
    }

    /// 增长到 `larger_size`，`new_sectors` 是一批刚分配的扇区，
    /// 个数恰为 [`count_total_sectors`](Self::count_total_sectors) 之差。
    ///
    /// 已有的编号不会被改动，只补齐缺失的后缀；新扇区全部清零。
    pub fn expand_to(&mut self, larger_size: u32, new_sectors: Vec<SectorId>, cache: &BufferCache) {
        debug_assert!(larger_size >= self.length);

        let mut block_index = Self::count_data_sectors(self.length);
        let new_total = Self::count_data_sectors(larger_size);
        self.length = larger_size;

        let mut new_sectors = new_sectors.into_iter().inspect(|&sector| cache.zero(sector));
        let mut take = || new_sectors.next().expect("too few sectors for expansion");

        if block_index == new_total {
            return;
        }

        // 第一块数据出现，创建二级索引
        if self.double_indirect == 0 {
            self.double_indirect = take().raw();
        }
        let double = SectorId::new(self.double_indirect);

        let mut single = SectorId::NONE;
        while block_index < new_total {
            let index2 = block_index / INDIRECT_COUNT;
            let index1 = block_index % INDIRECT_COUNT;

            if index1 == 0 {
                // 子块索引为0表示进入新的一级索引块
                single = take();
                cache.map_mut(double, |double: &mut IndirectBlock| {
                    double[index2] = single.raw()
                });
            } else if single.is_none() {
                // 接着上次未填满的一级索引块继续
                single = cache.map(double, |double: &IndirectBlock| {
                    SectorId::new(double[index2])
                });
            }

            let data = take();
            cache.map_mut(single, |single: &mut IndirectBlock| {
                single[index1] = data.raw()
            });

            block_index += 1;
        }

        drop(take);
        debug_assert!(new_sectors.next().is_none(), "too many sectors for expansion");
    }

    /// 清空 inode 的数据，返回所有数据块与索引块的扇区号
    pub fn clear(&mut self, cache: &BufferCache) -> Vec<SectorId> {
        let data_sectors = Self::count_data_sectors(self.length);
        let mut dropped = Vec::with_capacity(Self::count_total_sectors(self.length));
        self.length = 0;

        if data_sectors == 0 {
            return dropped;
        }

        let double = SectorId::new(self.double_indirect);
        let singles: IndirectBlock = cache.map(double, |double: &IndirectBlock| *double);

        for (index2, &single) in singles
            .iter()
            .take(data_sectors.div_ceil(INDIRECT_COUNT))
            .enumerate()
        {
            let used = (data_sectors - index2 * INDIRECT_COUNT).min(INDIRECT_COUNT);
            let single = SectorId::new(single);
            cache.map(single, |single: &IndirectBlock| {
                dropped.extend(single[..used].iter().map(|&raw| SectorId::new(raw)))
            });
            dropped.push(single);
        }

        dropped.push(double);
        self.double_indirect = 0;

        dropped
    }

    /// 从指定位置(字节偏移)读出数据填充`buf`
    pub fn read_at(&self, offset: usize, buf: &mut [u8], cache: &BufferCache) -> usize {
        let mut start = offset;
        let end = start.saturating_add(buf.len()).min(self.len());

        if start >= end {
            return 0;
        }

        // 已读取多少字节
        let mut read_size = 0;
        loop {
            // 当前块的逻辑索引，见 `DiskInode::sector_of`
            let block_index = start / SECTOR_SIZE;
            // 当前块的末地址(字节)
            let current_block_end = ((block_index + 1) * SECTOR_SIZE).min(end);
            let block_read_size = current_block_end - start;

            // 绝对地址 % 块大小 = 块内偏移
            cache.read(
                self.sector_of(block_index, cache),
                start % SECTOR_SIZE,
                &mut buf[read_size..read_size + block_read_size],
            );
            read_size += block_read_size;

            if current_block_end == end {
                break;
            }
            start = current_block_end;
        }

        read_size
    }

    /// 写入已分配的范围，调用者负责先增长
    pub fn write_at(&self, offset: usize, buf: &[u8], cache: &BufferCache) -> usize {
        let mut start = offset;
        let end = start.saturating_add(buf.len()).min(self.len());

        if start >= end {
            return 0;
        }

        let mut written_size = 0;
        loop {
            let block_index = start / SECTOR_SIZE;
            let current_block_end = ((block_index + 1) * SECTOR_SIZE).min(end);
            let block_write_size = current_block_end - start;

            cache.write(
                self.sector_of(block_index, cache),
                start % SECTOR_SIZE,
                &buf[written_size..written_size + block_write_size],
            );
            written_size += block_write_size;

            if current_block_end == end {
                break;
            }
            start = current_block_end;
        }

        written_size
    }

    /// 计算容纳指定数据量需要多少个**数据块**
    #[inline]
    pub fn count_data_sectors(size: u32) -> usize {
        (size as usize).div_ceil(SECTOR_SIZE)
    }

    /// 计算容纳指定数据量需要多少个 **数据块** 和 **索引块**(`IndirectBlock`)
    pub fn count_total_sectors(size: u32) -> usize {
        let data_sectors = Self::count_data_sectors(size);
        if data_sectors == 0 {
            return 0;
        }

        // 一个二级索引块，加上若干一级索引块
        data_sectors + 1 + data_sectors.div_ceil(INDIRECT_COUNT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_fills_one_sector() {
        assert_eq!(core::mem::size_of::<DiskInode>(), SECTOR_SIZE);
        assert_eq!(MAX_FILE_SIZE, 8 * 1024 * 1024);
    }

    #[test]
    fn total_sectors_include_index_blocks() {
        assert_eq!(DiskInode::count_total_sectors(0), 0);
        assert_eq!(DiskInode::count_total_sectors(1), 3);
        assert_eq!(DiskInode::count_total_sectors(600), 4);
        assert_eq!(DiskInode::count_total_sectors(128 * 512), 130);
        assert_eq!(DiskInode::count_total_sectors(128 * 512 + 1), 132);
        assert_eq!(
            DiskInode::count_total_sectors(MAX_FILE_SIZE as u32),
            MAX_DATA_SECTORS + 1 + INDIRECT_COUNT
        );
    }
}
