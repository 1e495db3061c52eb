//! # 卷
//!
//! 把块缓存、空闲扇区分配器与打开 inode 表收拢为一个服务对象，
//! 启动时构造一次，由所有 inode 句柄共享。
//!
//! 加锁顺序：打开 inode 表 → inode 状态 → 分配器 → 块缓存。

use alloc::boxed::Box;
use alloc::vec::Vec;

use spin::Mutex;

use crate::inode::InodeTable;
use crate::layout::DiskInode;
use crate::{BufferCache, Error, Result, SectorAllocator, SectorId};

pub(crate) struct Volume {
    pub cache: BufferCache,
    pub free_map: Mutex<Box<dyn SectorAllocator>>,
    pub inodes: InodeTable,
}

impl Volume {
    pub fn new(cache: BufferCache, free_map: Box<dyn SectorAllocator>) -> Self {
        Self {
            cache,
            free_map: Mutex::new(free_map),
            inodes: InodeTable::new(),
        }
    }

    /// 分配单个扇区，例如新 inode 的落脚处
    pub fn alloc_sector(&self) -> Result<SectorId> {
        self.free_map.lock().alloc(1).ok_or_else(|| {
            log::warn!("free map exhausted");
            Error::NoSpace
        })
    }

    /// 逐个分配 `count` 个扇区；中途耗尽则归还已分配的部分，不留半成品
    pub fn alloc_sectors(&self, count: usize) -> Result<Vec<SectorId>> {
        let mut free_map = self.free_map.lock();
        let mut sectors = Vec::with_capacity(count);

        for _ in 0..count {
            match free_map.alloc(1) {
                Some(sector) => sectors.push(sector),
                None => {
                    log::warn!(
                        "free map exhausted after {} of {count} sectors, rolling back",
                        sectors.len()
                    );
                    for sector in sectors {
                        free_map.release(sector, 1);
                    }
                    return Err(Error::NoSpace);
                }
            }
        }

        Ok(sectors)
    }

    pub fn release_sectors(&self, sectors: impl IntoIterator<Item = SectorId>) {
        let mut free_map = self.free_map.lock();
        for sector in sectors {
            free_map.release(sector, 1);
        }
    }

    /// 把 `disk_inode` 增长到 `larger_size` 字节，全部所需扇区预先分配
    pub fn grow(&self, disk_inode: &mut DiskInode, larger_size: u32) -> Result<()> {
        let needed = DiskInode::count_total_sectors(larger_size)
            - DiskInode::count_total_sectors(disk_inode.length);
        let new_sectors = self.alloc_sectors(needed)?;

        // 传进去的是一批未初始化扇区的编号
        disk_inode.expand_to(larger_size, new_sectors, &self.cache);
        Ok(())
    }

    #[inline]
    pub fn free_count(&self) -> usize {
        self.free_map.lock().free_count()
    }

    /// 位图与所有脏槽位落盘
    pub fn flush(&self) {
        self.free_map.lock().flush(&self.cache);
        self.cache.flush_all();
    }
}

impl Drop for Volume {
    fn drop(&mut self) {
        self.flush();
    }
}
