//! # 索引节点层
//!
//! 同一扇区上的 inode 在内存中只有一个 [`OpenInode`]，由所有打开者共享：
//! 任何一个句柄的写入、增长与删除标记，其它句柄立即可见。
//!
//! 删除是延迟的：[`Inode::remove`] 只做标记，已打开的句柄照常读写，
//! 最后一个句柄关闭时才把数据块、索引块与 inode 扇区归还给分配器。

use alloc::collections::BTreeMap;
use alloc::sync::Arc;

use spin::Mutex;
use vfs::{Stat, StatKind};

use crate::layout::{DiskInode, DiskInodeKind, MAX_FILE_SIZE};
use crate::volume::Volume;
use crate::{Error, Result, SECTOR_SIZE, SectorId};

/// 打开 inode 表，以扇区号为键
pub(crate) struct InodeTable {
    open: Mutex<BTreeMap<SectorId, Arc<OpenInode>>>,
}

/// 内存中的 inode
pub(crate) struct OpenInode {
    sector: SectorId,
    state: Mutex<InodeState>,
}

struct InodeState {
    open_count: usize,
    removed: bool,
    /// 0：可写；大于0：禁止写入
    deny_write_count: usize,
    /// 磁盘 inode 的副本
    disk: DiskInode,
}

/// 打开的 inode 句柄
///
/// 句柄不可复制，[`reopen`](Self::reopen) 得到的是新的打开实例；
/// 句柄析构即关闭，因此不会出现重复关闭。
pub struct Inode {
    volume: Arc<Volume>,
    node: Arc<OpenInode>,
}

impl InodeTable {
    pub fn new() -> Self {
        Self {
            open: Mutex::new(BTreeMap::new()),
        }
    }

    /// 当前驻留的 inode 个数
    pub fn len(&self) -> usize {
        self.open.lock().len()
    }
}

impl Inode {
    /// 在扇区 `sector` 上初始化一个长度为 `length` 的 inode 并打开它，
    /// 数据块与索引块一次性分配；空间不足时不留下任何已分配扇区。
    pub(crate) fn create(
        volume: &Arc<Volume>,
        sector: SectorId,
        length: usize,
        kind: DiskInodeKind,
        parent: SectorId,
    ) -> Result<Self> {
        if length > MAX_FILE_SIZE {
            return Err(Error::FileTooLarge);
        }

        let mut disk_inode = DiskInode::new(kind, parent);
        volume.grow(&mut disk_inode, length as u32)?;
        let record = disk_inode.clone();
        volume
            .cache
            .map_mut(sector, |on_disk: &mut DiskInode| *on_disk = record);
        log::debug!("inode {sector} created: {kind:?}, {length} bytes");

        let mut open = volume.inodes.open.lock();
        debug_assert!(!open.contains_key(&sector));
        Ok(Self::register(volume, &mut open, sector, disk_inode))
    }

    /// 打开扇区 `sector` 上的 inode；已驻留则共享同一份内存状态
    pub(crate) fn open(volume: &Arc<Volume>, sector: SectorId) -> Result<Self> {
        let mut open = volume.inodes.open.lock();

        if let Some(node) = open.get(&sector) {
            node.state.lock().open_count += 1;
            return Ok(Self {
                volume: volume.clone(),
                node: node.clone(),
            });
        }

        let disk = volume.cache.map(sector, |disk_inode: &DiskInode| disk_inode.clone());
        if !disk.is_valid() {
            log::error!("sector {sector} does not hold an inode");
            return Err(Error::BadMagic);
        }

        Ok(Self::register(volume, &mut open, sector, disk))
    }

    /// 登记新驻留的 inode，打开计数为 1
    fn register(
        volume: &Arc<Volume>,
        open: &mut BTreeMap<SectorId, Arc<OpenInode>>,
        sector: SectorId,
        disk: DiskInode,
    ) -> Self {
        let node = Arc::new(OpenInode {
            sector,
            state: Mutex::new(InodeState {
                open_count: 1,
                removed: false,
                deny_write_count: 0,
                disk,
            }),
        });
        open.insert(sector, node.clone());
        log::debug!("inode {sector} opened");

        Self {
            volume: volume.clone(),
            node,
        }
    }

    /// 再打开一次，返回指向同一 inode 的新句柄
    pub fn reopen(&self) -> Self {
        self.node.state.lock().open_count += 1;
        Self {
            volume: self.volume.clone(),
            node: self.node.clone(),
        }
    }

    /// 关闭句柄，等同于析构
    #[inline]
    pub fn close(self) {}

    /// 标记删除，空间在最后一次关闭时回收
    pub fn remove(&self) {
        self.node.state.lock().removed = true;
        log::debug!("inode {} marked removed", self.node.sector);
    }

    pub fn read_at(&self, offset: usize, buf: &mut [u8]) -> usize {
        let state = self.node.state.lock();
        state.disk.read_at(offset, buf, &self.volume.cache)
    }

    /// 写入前按需增长：只分配缺失的后缀，已有块编号保持不变
    pub fn write_at(&self, offset: usize, buf: &[u8]) -> Result<usize> {
        let mut state = self.node.state.lock();

        if state.deny_write_count > 0 {
            log::warn!("write to inode {} denied", self.node.sector);
            return Err(Error::WriteDenied);
        }
        if buf.is_empty() {
            return Ok(0);
        }

        let end = offset
            .checked_add(buf.len())
            .filter(|&end| end <= MAX_FILE_SIZE)
            .ok_or(Error::FileTooLarge)?;

        // Expand
        if end > state.disk.len() {
            self.volume.grow(&mut state.disk, end as u32)?;
            let disk = state.disk.clone();
            self.volume
                .cache
                .map_mut(self.node.sector, |on_disk: &mut DiskInode| *on_disk = disk);
            log::trace!("inode {} grown to {end} bytes", self.node.sector);
        }

        Ok(state.disk.write_at(offset, buf, &self.volume.cache))
    }

    /// 禁止写入，每个打开者至多调用一次
    pub fn deny_write(&self) {
        let mut state = self.node.state.lock();
        state.deny_write_count += 1;
        assert!(state.deny_write_count <= state.open_count);
    }

    /// 解除 [`deny_write`](Self::deny_write)，须在关闭之前调用
    pub fn allow_write(&self) {
        let mut state = self.node.state.lock();
        assert!(state.deny_write_count > 0);
        assert!(state.deny_write_count <= state.open_count);
        state.deny_write_count -= 1;
    }

    /// inode 所在扇区号
    #[inline]
    pub fn inumber(&self) -> SectorId {
        self.node.sector
    }

    #[inline]
    pub fn length(&self) -> usize {
        self.node.state.lock().disk.len()
    }

    #[inline]
    pub fn is_dir(&self) -> bool {
        self.node.state.lock().disk.is_dir()
    }

    #[inline]
    pub fn is_removed(&self) -> bool {
        self.node.state.lock().removed
    }

    /// 共享此 inode 的打开者个数
    #[inline]
    pub fn open_count(&self) -> usize {
        self.node.state.lock().open_count
    }

    /// 目录的父目录扇区，根目录为其自身
    #[inline]
    pub(crate) fn parent(&self) -> SectorId {
        self.node.state.lock().disk.parent()
    }

    #[inline]
    pub(crate) fn volume(&self) -> &Arc<Volume> {
        &self.volume
    }

    pub fn stat(&self) -> Stat {
        let state = self.node.state.lock();
        Stat {
            inode: self.node.sector.raw() as u64,
            mode: match state.disk.kind() {
                DiskInodeKind::Directory => StatKind::DIR,
                DiskInodeKind::File => StatKind::FILE,
            },
            block_size: SECTOR_SIZE as u64,
            blocks: DiskInode::count_total_sectors(state.disk.length) as u64,
            size: state.disk.length as u64,
        }
    }
}

impl Drop for Inode {
    fn drop(&mut self) {
        let sector = self.node.sector;

        let reclaim = {
            let mut open = self.volume.inodes.open.lock();
            let mut state = self.node.state.lock();
            state.open_count -= 1;
            if state.open_count > 0 {
                return;
            }

            open.remove(&sector);
            if state.removed {
                Some(state.disk.clear(&self.volume.cache))
            } else {
                None
            }
        };
        log::debug!("inode {sector} closed");

        if let Some(sectors) = reclaim {
            log::debug!("inode {sector} reclaimed, {} data sectors", sectors.len());
            self.volume
                .release_sectors(sectors.into_iter().chain(Some(sector)));
        }
    }
}
