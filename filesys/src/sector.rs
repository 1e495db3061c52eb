//! 扇区号

use derive_more::{Add, Display, From, Into};

/// 扇区号，同时也是 inode 的永久标识（inumber）
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Add, From, Into, Display,
)]
#[repr(transparent)]
pub struct SectorId(u32);

impl core::ops::Add<u32> for SectorId {
    type Output = Self;

    fn add(self, rhs: u32) -> Self::Output {
        self + Self(rhs)
    }
}

impl SectorId {
    /// 索引块里的 0 表示“尚未分配”：0 号扇区是超级块，永远不会被分配给文件
    pub const NONE: Self = Self(0);

    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// 交给块设备驱动的块ID
    #[inline]
    pub const fn block(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}
