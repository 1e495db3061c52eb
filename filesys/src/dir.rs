//! # 目录层
//!
//! 目录就是内容为一串 [`DirEntry`] 记录的 inode。
//! `.` 与 `..` 不落盘：前者指向自身，后者经由目录 inode 中记录的父目录扇区解析，
//! 因此同一目录的所有句柄对父目录的看法一致。
//!
//! 目录句柄一直打开着父目录，父目录的扇区在句柄关闭前不会被回收；
//! 父目录已被删除时 `..` 无法解析。

use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;

use vfs::{DirEntry as VfsDirEntry, DirEntryType};

use crate::Inode;
use crate::layout::{DirEntry, DiskInodeKind, NAME_MAX};
use crate::volume::Volume;
use crate::{Error, ROOT_DIR_SECTOR, Result, SectorId};

/// 打开的目录：inode、`readdir` 游标以及打开着的父目录
pub struct Dir {
    inode: Inode,
    pos: usize,
    /// 根目录为空，它的父目录就是自己
    parent: Option<Inode>,
}

impl Dir {
    /// 在扇区 `sector` 上创建能容纳 `capacity` 个目录项的目录
    pub(crate) fn create(
        volume: &Arc<Volume>,
        sector: SectorId,
        capacity: usize,
        parent: SectorId,
    ) -> Result<Inode> {
        Inode::create(
            volume,
            sector,
            capacity * DirEntry::SIZE,
            DiskInodeKind::Directory,
            parent,
        )
    }

    /// 把 `inode` 包装为目录句柄
    ///
    /// 由遍历得来时 `parent` 为上一级目录；为空时按 inode 中记录的父目录扇区打开。
    /// 已删除的目录只能经由遍历打开，它记录的父目录可能早已回收。
    pub fn open(parent: Option<&Dir>, inode: Inode) -> Result<Self> {
        if !inode.is_dir() {
            return Err(Error::NotADirectory);
        }

        let parent = if inode.inumber() == ROOT_DIR_SECTOR {
            None
        } else if let Some(dir) = parent {
            Some(dir.inode.reopen())
        } else if inode.is_removed() {
            return Err(Error::Removed);
        } else {
            Some(Inode::open(inode.volume(), inode.parent())?)
        };
        Ok(Self {
            inode,
            pos: 0,
            parent,
        })
    }

    pub(crate) fn open_root(volume: &Arc<Volume>) -> Result<Self> {
        Self::open(None, Inode::open(volume, ROOT_DIR_SECTOR)?)
    }

    /// 同一目录的新句柄，游标归零
    pub fn reopen(&self) -> Self {
        Self {
            inode: self.inode.reopen(),
            pos: 0,
            parent: self.parent.as_ref().map(Inode::reopen),
        }
    }

    /// 关闭句柄，等同于析构
    #[inline]
    pub fn close(self) {}

    #[inline]
    pub fn inode(&self) -> &Inode {
        &self.inode
    }

    #[inline]
    pub fn inumber(&self) -> SectorId {
        self.inode.inumber()
    }

    /// 父目录的扇区号
    #[inline]
    pub fn parent(&self) -> SectorId {
        self.parent
            .as_ref()
            .map_or_else(|| self.inumber(), Inode::inumber)
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.inumber() == ROOT_DIR_SECTOR
    }

    /// 根据名字查找子项；`.` 为自身，`..` 为父目录（根目录为自身），
    /// 父目录已被删除时找不到
    pub fn lookup(&self, name: &str) -> Option<Inode> {
        match name {
            "." => Some(self.inode.reopen()),
            ".." => match &self.parent {
                None => Some(self.inode.reopen()),
                Some(parent) if parent.is_removed() => None,
                Some(parent) => Some(parent.reopen()),
            },
            _ => {
                let (dir_entry, _) = self.find(name)?;
                Inode::open(
                    self.inode.volume(),
                    SectorId::new(dir_entry.inode_sector()),
                )
                .ok()
            }
        }
    }

    /// 添加名为 `name`、指向扇区 `inode_sector` 的目录项
    pub fn add(&self, name: &str, inode_sector: SectorId) -> Result<()> {
        validate_name(name)?;
        if self.inode.is_removed() {
            return Err(Error::Removed);
        }
        if self.find(name).is_some() {
            return Err(Error::AlreadyExists);
        }

        // 优先复用空槽位，找不到就追加到末尾
        let slot = self
            .records()
            .find_map(|(dir_entry, offset)| (!dir_entry.is_in_use()).then_some(offset))
            .unwrap_or_else(|| self.inode.length());

        let dir_entry = DirEntry::new(name, inode_sector.raw());
        let written = self.inode.write_at(slot, dir_entry.as_bytes())?;
        assert_eq!(written, DirEntry::SIZE);

        log::debug!("dir {}: add {name:?} -> {inode_sector}", self.inumber());
        Ok(())
    }

    /// 删除名为 `name` 的目录项并标记其 inode 删除；非空目录拒绝删除
    pub fn remove(&self, name: &str) -> Result<()> {
        let (mut dir_entry, offset) = self.find(name).ok_or(Error::NotFound)?;
        let inode = Inode::open(
            self.inode.volume(),
            SectorId::new(dir_entry.inode_sector()),
        )?;

        if inode.is_dir() && !Dir::open(Some(self), inode.reopen())?.is_empty() {
            log::warn!("dir {}: {name:?} is not empty", self.inumber());
            return Err(Error::DirectoryNotEmpty);
        }

        dir_entry.set_unused();
        let written = self.inode.write_at(offset, dir_entry.as_bytes())?;
        assert_eq!(written, DirEntry::SIZE);
        inode.remove();

        log::debug!("dir {}: remove {name:?}", self.inumber());
        Ok(())
    }

    /// 读取游标之后的下一个名字，跳过空槽位
    pub fn readdir(&mut self) -> Option<String> {
        let mut dir_entry = DirEntry::default();

        while self.inode.read_at(self.pos, dir_entry.as_bytes_mut()) == DirEntry::SIZE {
            self.pos += DirEntry::SIZE;
            if dir_entry.is_in_use() {
                return Some(dir_entry.name().to_string());
            }
        }

        None
    }

    /// 目录中没有任何在用的目录项
    pub fn is_empty(&self) -> bool {
        self.records().all(|(dir_entry, _)| !dir_entry.is_in_use())
    }

    /// 列出所有在用的子项，不影响 `readdir` 游标
    pub fn entries(&self) -> Vec<VfsDirEntry> {
        self.records()
            .filter(|(dir_entry, _)| dir_entry.is_in_use())
            .map(|(dir_entry, _)| {
                let inode = dir_entry.inode_sector();
                let is_dir = Inode::open(self.inode.volume(), SectorId::new(inode))
                    .map(|inode| inode.is_dir())
                    .unwrap_or(false);
                VfsDirEntry {
                    inode,
                    ty: if is_dir {
                        DirEntryType::Directory
                    } else {
                        DirEntryType::Regular
                    },
                    name: dir_entry.name().to_string(),
                }
            })
            .collect()
    }

    /// 解析目录路径：绝对路径或没有当前目录时从根目录出发，否则从 `cwd` 出发
    pub(crate) fn resolve(volume: &Arc<Volume>, cwd: Option<&Dir>, path: &str) -> Result<Self> {
        let mut dir = match cwd {
            Some(cwd) if !path.starts_with('/') => cwd.reopen(),
            _ => Self::open_root(volume)?,
        };

        for cmp in path.split('/').filter(|cmp| !cmp.is_empty()) {
            dir = match cmp {
                "." => continue,
                ".." => dir.open_parent()?,
                _ => {
                    let inode = dir.lookup(cmp).ok_or(Error::NotFound)?;
                    if !inode.is_dir() {
                        log::debug!("middle segment {cmp:?} isn't directory");
                        return Err(Error::NotADirectory);
                    }
                    Self::open(Some(&dir), inode)?
                }
            };
        }

        // 沿途打开的目录已被删除
        if dir.inode.is_removed() {
            return Err(Error::Removed);
        }

        Ok(dir)
    }
}

impl Dir {
    /// `..` 对应的目录句柄
    fn open_parent(&self) -> Result<Self> {
        match &self.parent {
            None => Ok(self.reopen()),
            Some(parent) if parent.is_removed() => {
                log::debug!("dir {}: parent {} removed", self.inumber(), parent.inumber());
                Err(Error::Removed)
            }
            Some(parent) => Self::open(None, parent.reopen()),
        }
    }

    /// 线性扫描，返回第一个名字匹配的在用目录项及其偏移
    fn find(&self, name: &str) -> Option<(DirEntry, usize)> {
        self.records()
            .find(|(dir_entry, _)| dir_entry.is_in_use() && dir_entry.name() == name)
    }

    /// 按存储顺序遍历所有目录项记录
    fn records(&self) -> impl Iterator<Item = (DirEntry, usize)> + '_ {
        (0..)
            .step_by(DirEntry::SIZE)
            .map_while(|offset| {
                let mut dir_entry = DirEntry::default();
                (self.inode.read_at(offset, dir_entry.as_bytes_mut()) == DirEntry::SIZE)
                    .then_some((dir_entry, offset))
            })
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > NAME_MAX || name.contains(['/', '\0']) {
        return Err(Error::InvalidName);
    }
    if name == "." || name == ".." {
        return Err(Error::AlreadyExists);
    }
    Ok(())
}

/// 把路径拆成（目录路径，末段名字）；末尾的 `/` 被忽略
///
/// `"/a/b"` → `("/a", "b")`，`"b"` → `("", "b")`，`"/"` → `("/", "")`
pub fn split_path(path: &str) -> (&str, &str) {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return (if path.starts_with('/') { "/" } else { "" }, "");
    }

    match trimmed.rsplit_once('/') {
        Some(("", leaf)) => ("/", leaf),
        Some((dir, leaf)) => (dir, leaf),
        None => ("", trimmed),
    }
}
