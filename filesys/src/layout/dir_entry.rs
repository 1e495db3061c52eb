use core::{ptr, slice};

/// 名字的最大字节数
pub const NAME_MAX: usize = 14;

/// 目录内容中的一条记录，顺序存放在目录自身的数据里
#[derive(Debug, Default, Clone)]
#[repr(C)]
pub struct DirEntry {
    /// 子项 inode 所在扇区
    inode_sector: u32,
    // 最后一字节留给 \0
    name: [u8; NAME_MAX + 1],
    in_use: u8,
}

impl DirEntry {
    /// 记录大小恒为20字节
    pub const SIZE: usize = 20;

    #[inline]
    pub fn new(name: &str, inode_sector: u32) -> Self {
        let bytes = name.as_bytes();
        debug_assert!(bytes.len() <= NAME_MAX);
        let mut name = [0; NAME_MAX + 1];
        name[..bytes.len()].copy_from_slice(bytes);

        Self {
            inode_sector,
            name,
            in_use: 1,
        }
    }

    pub fn name(&self) -> &str {
        let len = self
            .name
            .iter()
            .position(|&c| c == 0)
            .unwrap_or(NAME_MAX);
        core::str::from_utf8(&self.name[..len]).unwrap_or_default()
    }

    #[inline]
    pub fn inode_sector(&self) -> u32 {
        self.inode_sector
    }

    #[inline]
    pub fn is_in_use(&self) -> bool {
        self.in_use != 0
    }

    #[inline]
    pub fn set_unused(&mut self) {
        self.in_use = 0;
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        unsafe { slice::from_raw_parts(ptr::from_ref(self).cast(), Self::SIZE) }
    }

    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        unsafe { slice::from_raw_parts_mut(ptr::from_mut(self).cast(), Self::SIZE) }
    }
}
