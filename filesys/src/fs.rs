//! # 文件系统门面
//!
//! 构建出卷的布局并使用：完整路径先拆成（目录路径，末段名字），
//! 目录路径交给目录层解析，末段名字在解析出的目录里创建、打开或删除。
//!
//! 参数 `cwd` 代表调用线程的当前目录，为空时相对路径也从根目录出发。

use alloc::boxed::Box;
use alloc::sync::Arc;

use block_dev::BlockDevice;

use crate::layout::{DiskInodeKind, SuperBlock};
use crate::volume::Volume;
use crate::{BufferCache, CacheStats, Config, Dir, File, FreeMap, Handle, Inode, split_path};
use crate::{Error, FREE_MAP_START, ROOT_DIR_SECTOR, Result, SectorId};

pub struct FileSystem {
    volume: Arc<Volume>,
}

impl FileSystem {
    /// 在 `device` 的前 `total_sectors` 个扇区上建立空卷，只含一个根目录
    pub fn format(device: Arc<dyn BlockDevice>, total_sectors: u32, config: Config) -> Result<Self> {
        let free_map_sectors = FreeMap::sectors_for(total_sectors);
        if total_sectors <= FREE_MAP_START.raw() + free_map_sectors {
            log::error!("{total_sectors} sectors cannot hold a volume");
            return Err(Error::NoSpace);
        }

        let cache = BufferCache::new(device, config.cache_capacity);
        cache.zero(SectorId::NONE);
        cache.map_mut(SectorId::NONE, |super_block: &mut SuperBlock| {
            super_block.init(total_sectors, FREE_MAP_START.raw(), free_map_sectors)
        });

        let free_map = FreeMap::create(FREE_MAP_START, total_sectors);
        let volume = Arc::new(Volume::new(cache, Box::new(free_map)));

        Dir::create(&volume, ROOT_DIR_SECTOR, config.root_entries, ROOT_DIR_SECTOR)?.close();
        volume.flush();

        log::info!(
            "formatted {total_sectors} sectors, {} free",
            volume.free_count()
        );
        Ok(Self { volume })
    }

    /// 挂载已格式化的卷
    pub fn mount(device: Arc<dyn BlockDevice>, config: Config) -> Result<Self> {
        let cache = BufferCache::new(device, config.cache_capacity);

        let (valid, total, start, sectors) = cache.map(SectorId::NONE, |super_block: &SuperBlock| {
            (
                super_block.is_valid(),
                super_block.total_sectors,
                super_block.free_map_start,
                super_block.free_map_sectors,
            )
        });
        if !valid {
            log::error!("super block magic mismatch");
            return Err(Error::BadMagic);
        }

        let free_map = FreeMap::open(&cache, SectorId::new(start), sectors, total);
        let fs = Self {
            volume: Arc::new(Volume::new(cache, Box::new(free_map))),
        };
        // 根目录 inode 也要过一遍魔数检查
        fs.root()?;

        log::info!("mounted {total} sectors, {} free", fs.free_sectors());
        Ok(fs)
    }

    /// 创建长度为 `size` 的普通文件，内容全零
    pub fn create(&self, cwd: Option<&Dir>, path: &str, size: usize) -> Result<()> {
        self.create_node(cwd, path, |volume, sector, _| {
            Inode::create(volume, sector, size, DiskInodeKind::File, SectorId::NONE)
        })
    }

    /// 创建空目录，其父目录记录为路径中的上一级
    pub fn mkdir(&self, cwd: Option<&Dir>, path: &str) -> Result<()> {
        self.create_node(cwd, path, |volume, sector, parent| {
            Dir::create(volume, sector, 0, parent)
        })
    }

    /// 打开文件或目录；`"/"` 即根目录
    pub fn open(&self, cwd: Option<&Dir>, path: &str) -> Result<Handle> {
        if path.is_empty() {
            return Err(Error::NotFound);
        }
        let (dir_path, name) = split_path(path);
        let dir = Dir::resolve(&self.volume, cwd, dir_path)?;

        let inode = if name.is_empty() {
            // 形如 "/" 或 "a/" 的路径指向目录自身
            dir.inode().reopen()
        } else {
            dir.lookup(name).ok_or(Error::NotFound)?
        };
        if inode.is_removed() {
            return Err(Error::NotFound);
        }

        if inode.is_dir() {
            Dir::open(None, inode).map(Handle::Dir)
        } else {
            Ok(Handle::File(File::new(inode)))
        }
    }

    /// 删除文件或空目录；已打开的句柄在关闭前照常可用
    pub fn remove(&self, cwd: Option<&Dir>, path: &str) -> Result<()> {
        let (dir_path, name) = split_path(path);
        if name.is_empty() {
            return Err(Error::InvalidName);
        }

        let dir = Dir::resolve(&self.volume, cwd, dir_path)?;
        dir.remove(name)
    }

    /// 解析出新的当前目录
    pub fn chdir(&self, cwd: Option<&Dir>, path: &str) -> Result<Dir> {
        Dir::resolve(&self.volume, cwd, path)
    }

    pub fn root(&self) -> Result<Dir> {
        Dir::open_root(&self.volume)
    }

    #[inline]
    pub fn free_sectors(&self) -> usize {
        self.volume.free_count()
    }

    #[inline]
    pub fn cache_stats(&self) -> CacheStats {
        self.volume.cache.stats()
    }

    /// 当前驻留的 inode 个数
    #[inline]
    pub fn open_inodes(&self) -> usize {
        self.volume.inodes.len()
    }

    /// 把位图与所有脏扇区写回设备；此后不应再有并发操作
    pub fn shutdown(&self) {
        self.volume.flush();
        log::info!("shutdown, {} free sectors", self.free_sectors());
    }
}

impl FileSystem {
    /// 分配 inode 扇区、初始化、登记到目录，任何一步失败都归还已占用的空间
    ///
    /// `init` 返回新 inode 的句柄，登记失败时经由它标记删除，关闭即回收。
    fn create_node(
        &self,
        cwd: Option<&Dir>,
        path: &str,
        init: impl FnOnce(&Arc<Volume>, SectorId, SectorId) -> Result<Inode>,
    ) -> Result<()> {
        let (dir_path, name) = split_path(path);
        if name.is_empty() {
            return Err(Error::InvalidName);
        }
        let dir = Dir::resolve(&self.volume, cwd, dir_path)?;
        if dir.lookup(name).is_some() {
            return Err(Error::AlreadyExists);
        }

        let sector = self.volume.alloc_sector()?;
        let inode = match init(&self.volume, sector, dir.inumber()) {
            Ok(inode) => inode,
            Err(err) => {
                self.volume.release_sectors([sector]);
                return Err(err);
            }
        };

        // 返回时 inode 关闭，已标记删除的连同数据一起回收
        dir.add(name, sector).inspect_err(|err| {
            log::debug!("{path:?}: add failed ({err:?}), reclaiming inode {sector}");
            inode.remove();
        })
    }
}
