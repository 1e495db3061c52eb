//! # 打开的文件
//!
//! [`File`] 在 inode 之上加一个**文件**内的偏移量；
//! [`Handle`] 是门面 `open` 的返回值，文件或目录二者之一。

use alloc::string::String;

use vfs::Stat;

use crate::{Dir, Error, Inode, Result, SectorId};

/// 表示打开的普通文件
pub struct File {
    inode: Inode,
    /// **文件**内的偏移量
    pos: usize,
    /// 此句柄是否持有一次禁写
    deny_write: bool,
}

impl File {
    #[inline]
    pub fn new(inode: Inode) -> Self {
        Self {
            inode,
            pos: 0,
            deny_write: false,
        }
    }

    /// 同一 inode 的新句柄，偏移量归零，不继承禁写
    pub fn reopen(&self) -> Self {
        Self::new(self.inode.reopen())
    }

    /// 关闭句柄，等同于析构
    #[inline]
    pub fn close(self) {}

    /// 从当前位置读，返回实际读到的字节数，到达文件尾时为 0
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        let len = self.inode.read_at(self.pos, buf);
        self.pos += len;
        len
    }

    /// 从当前位置写，必要时增长文件
    pub fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let len = self.inode.write_at(self.pos, buf)?;
        self.pos += len;
        Ok(len)
    }

    #[inline]
    pub fn read_at(&self, offset: usize, buf: &mut [u8]) -> usize {
        self.inode.read_at(offset, buf)
    }

    #[inline]
    pub fn write_at(&self, offset: usize, buf: &[u8]) -> Result<usize> {
        self.inode.write_at(offset, buf)
    }

    /// 允许越过文件尾，之后的写入会增长文件
    #[inline]
    pub fn seek(&mut self, pos: usize) {
        self.pos = pos;
    }

    #[inline]
    pub fn tell(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn length(&self) -> usize {
        self.inode.length()
    }

    /// 禁止所有打开者写入此文件，同一句柄重复调用无效果
    pub fn deny_write(&mut self) {
        if !self.deny_write {
            self.deny_write = true;
            self.inode.deny_write();
        }
    }

    pub fn allow_write(&mut self) {
        if self.deny_write {
            self.deny_write = false;
            self.inode.allow_write();
        }
    }

    #[inline]
    pub fn inumber(&self) -> SectorId {
        self.inode.inumber()
    }

    #[inline]
    pub fn stat(&self) -> Stat {
        self.inode.stat()
    }

    #[inline]
    pub fn inode(&self) -> &Inode {
        &self.inode
    }
}

impl Drop for File {
    fn drop(&mut self) {
        // 禁写必须在关闭 inode 之前解除
        self.allow_write();
    }
}

/// 打开的文件或目录
pub enum Handle {
    File(File),
    Dir(Dir),
}

impl Handle {
    #[inline]
    pub fn is_dir(&self) -> bool {
        matches!(self, Self::Dir(_))
    }

    pub fn inumber(&self) -> SectorId {
        match self {
            Self::File(file) => file.inumber(),
            Self::Dir(dir) => dir.inumber(),
        }
    }

    pub fn stat(&self) -> Stat {
        match self {
            Self::File(file) => file.stat(),
            Self::Dir(dir) => dir.inode().stat(),
        }
    }

    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self {
            Self::File(file) => Ok(file.read(buf)),
            Self::Dir(_) => Err(Error::IsADirectory),
        }
    }

    pub fn write(&mut self, buf: &[u8]) -> Result<usize> {
        match self {
            Self::File(file) => file.write(buf),
            Self::Dir(_) => Err(Error::IsADirectory),
        }
    }

    pub fn seek(&mut self, pos: usize) -> Result<()> {
        self.as_file_mut().map(|file| file.seek(pos))
    }

    pub fn tell(&self) -> Result<usize> {
        match self {
            Self::File(file) => Ok(file.tell()),
            Self::Dir(_) => Err(Error::IsADirectory),
        }
    }

    /// 目录的下一个名字；读完后为 `Ok(None)`
    pub fn readdir(&mut self) -> Result<Option<String>> {
        self.as_dir_mut().map(Dir::readdir)
    }

    pub fn as_file_mut(&mut self) -> Result<&mut File> {
        match self {
            Self::File(file) => Ok(file),
            Self::Dir(_) => Err(Error::IsADirectory),
        }
    }

    pub fn as_dir_mut(&mut self) -> Result<&mut Dir> {
        match self {
            Self::File(_) => Err(Error::NotADirectory),
            Self::Dir(dir) => Ok(dir),
        }
    }

    #[inline]
    pub fn close(self) {}
}
