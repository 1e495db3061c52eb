//! # 块设备接口层
//!
//! 块设备是以**扇区**为单位存储数据的设备，[`BlockDevice`] 就是对读写块设备的抽象，
//! 实现了此特质的类型称为**块设备驱动**。
//!
//! 驱动不返回错误：扇区读写失败对文件系统而言是致命的，由驱动自行中止。

#![no_std]

use core::any::Any;

/// 块设备驱动特质
pub trait BlockDevice: Send + Sync + Any {
    /// 读取编号为 `block_id` 的扇区，`buf` 的长度恰为一个扇区
    fn read_block(&self, block_id: usize, buf: &mut [u8]);
    /// 写入编号为 `block_id` 的扇区，`buf` 的长度恰为一个扇区
    fn write_block(&self, block_id: usize, buf: &[u8]);
}
