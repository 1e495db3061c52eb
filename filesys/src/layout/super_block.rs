use super::Pod;
use crate::MAGIC;

/// 超级块：
/// - 提供文件系统合法性校验；
/// - 定位空闲位图区域
#[derive(Debug)]
#[repr(C)]
pub struct SuperBlock {
    /// 魔数：用于校验文件系统合法性
    magic: u32,
    /// 文件系统占据扇区数
    pub total_sectors: u32,
    pub free_map_start: u32,
    pub free_map_sectors: u32,
}

unsafe impl Pod for SuperBlock {}

impl SuperBlock {
    #[inline]
    pub fn init(&mut self, total_sectors: u32, free_map_start: u32, free_map_sectors: u32) {
        *self = Self {
            magic: MAGIC,
            total_sectors,
            free_map_start,
            free_map_sectors,
        };
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.magic == MAGIC
    }
}
