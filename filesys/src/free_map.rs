//! # 空闲扇区位图
//!
//! 每个扇区对应一位，置位表示已分配。位图常驻内存，
//! 以 64 位为一组；关机时经由块缓存写回位图区域。

use alloc::vec;
use alloc::vec::Vec;

use crate::layout::BitmapBlock;
use crate::{BufferCache, SECTOR_BITS, SectorId};

/// 空闲扇区分配器的契约
pub trait SectorAllocator: Send {
    /// 分配连续的 `count` 个扇区并返回首个扇区号，空间不足时返回空
    fn alloc(&mut self, count: usize) -> Option<SectorId>;
    /// 归还从 `start` 起连续的 `count` 个扇区
    fn release(&mut self, start: SectorId, count: usize);
    /// 剩余空闲扇区数
    fn free_count(&self) -> usize;
    /// 持久化
    fn flush(&self, cache: &BufferCache);
}

/// 位图区域，记录整个卷的扇区分配情况
#[derive(Debug)]
pub struct FreeMap {
    /// 位图的起始扇区
    start: SectorId,
    /// 位图占用扇区数
    sectors: u32,
    /// 卷的总扇区数
    total: u32,
    groups: Vec<u64>,
    free: usize,
}

/// 位编号
struct BitId(usize);

impl FreeMap {
    /// 记录 `total` 个扇区需要多少个位图扇区
    #[inline]
    pub fn sectors_for(total: u32) -> u32 {
        total.div_ceil(SECTOR_BITS as u32)
    }

    /// 新卷的位图：`[0, start + sectors)` 已被超级块、根目录与位图自身占用
    pub fn create(start: SectorId, total: u32) -> Self {
        let sectors = Self::sectors_for(total);
        let mut map = Self::blank(start, sectors, total);

        let reserved = (start.raw() + sectors).min(total) as usize;
        for bit in 0..reserved {
            map.set(bit);
        }
        map.free = total as usize - reserved;

        map
    }

    /// 从磁盘载入位图
    pub fn open(cache: &BufferCache, start: SectorId, sectors: u32, total: u32) -> Self {
        let mut map = Self::blank(start, sectors, total);

        let per_sector = SECTOR_BITS / 64;
        for (index, chunk) in map.groups.chunks_mut(per_sector).enumerate() {
            cache.map(start + index as u32, |bitmap_block: &BitmapBlock| {
                chunk.copy_from_slice(&bitmap_block[..chunk.len()])
            });
        }

        map.free = (0..total as usize).filter(|&bit| !map.test(bit)).count();
        map
    }

    fn blank(start: SectorId, sectors: u32, total: u32) -> Self {
        let per_sector = SECTOR_BITS / 64;
        let mut groups = vec![0u64; sectors as usize * per_sector];

        // 超出卷尾的位视作已占用，永远不会被分配
        for bit in total as usize..groups.len() * 64 {
            let (group_index, ingroup_index) = BitId(bit).decode();
            groups[group_index] |= 1 << ingroup_index;
        }

        Self {
            start,
            sectors,
            total,
            groups,
            free: 0,
        }
    }

    #[inline]
    fn test(&self, bit: usize) -> bool {
        let (group_index, ingroup_index) = BitId(bit).decode();
        self.groups[group_index] & (1 << ingroup_index) != 0
    }

    #[inline]
    fn set(&mut self, bit: usize) {
        let (group_index, ingroup_index) = BitId(bit).decode();
        self.groups[group_index] |= 1 << ingroup_index;
    }

    /// 首次适配：寻找第一段长度为 `count` 的连续空闲位
    fn find_run(&self, count: usize) -> Option<usize> {
        let total = self.total as usize;
        let mut run_start = 0;
        let mut run_len = 0;
        let mut bit = 0;

        while bit < total {
            let (group_index, ingroup_index) = BitId(bit).decode();
            let group = self.groups[group_index];

            // 整组已满，直接跳过
            if ingroup_index == 0 && group == u64::MAX {
                run_len = 0;
                bit += 64;
                continue;
            }

            if group & (1 << ingroup_index) == 0 {
                if run_len == 0 {
                    run_start = bit;
                }
                run_len += 1;
                if run_len == count {
                    return Some(run_start);
                }
            } else {
                run_len = 0;
            }
            bit += 1;
        }

        None
    }
}

impl SectorAllocator for FreeMap {
    fn alloc(&mut self, count: usize) -> Option<SectorId> {
        if count == 0 || count > self.free {
            return None;
        }

        let start = self.find_run(count)?;
        for bit in start..start + count {
            self.set(bit);
        }
        self.free -= count;

        Some(SectorId::new(start as u32))
    }

    fn release(&mut self, start: SectorId, count: usize) {
        for bit in start.raw() as usize..start.raw() as usize + count {
            let (group_index, ingroup_index) = BitId(bit).decode();

            // 编号一定得有对应的位
            assert_ne!(
                self.groups[group_index] & (1 << ingroup_index),
                0,
                "release of free sector {bit}"
            );
            self.groups[group_index] &= !(1 << ingroup_index);
        }
        self.free += count;
    }

    #[inline]
    fn free_count(&self) -> usize {
        self.free
    }

    fn flush(&self, cache: &BufferCache) {
        let per_sector = SECTOR_BITS / 64;
        for (index, chunk) in self.groups.chunks(per_sector).enumerate() {
            cache.map_mut(self.start + index as u32, |bitmap_block: &mut BitmapBlock| {
                bitmap_block[..chunk.len()].copy_from_slice(chunk)
            });
        }
        log::debug!(
            "free map flushed: {} sectors, {} free",
            self.sectors,
            self.free
        );
    }
}

impl BitId {
    /// 线性映射解码得到组索引与组内索引
    #[inline]
    fn decode(self) -> (usize, usize) {
        (self.0 / 64, self.0 % 64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_prefix_is_never_handed_out() {
        let mut map = FreeMap::create(SectorId::new(2), 100);
        assert_eq!(map.free_count(), 97);
        assert_eq!(map.alloc(1), Some(SectorId::new(3)));
        assert_eq!(map.free_count(), 96);
    }

    #[test]
    fn first_fit_run_skips_holes() {
        let mut map = FreeMap::create(SectorId::new(2), 200);
        let a = map.alloc(1).unwrap();
        let b = map.alloc(1).unwrap();
        let _c = map.alloc(1).unwrap();
        map.release(a, 1);

        // 单个空洞放不下两个
        let run = map.alloc(2).unwrap();
        assert!(run > b);
        // 但单个扇区会回填空洞
        assert_eq!(map.alloc(1), Some(a));
    }

    #[test]
    fn exhaustion_returns_none() {
        let mut map = FreeMap::create(SectorId::new(2), 10);
        assert_eq!(map.free_count(), 7);
        assert!(map.alloc(8).is_none());
        assert!(map.alloc(7).is_some());
        assert!(map.alloc(1).is_none());
        assert_eq!(map.free_count(), 0);
    }

    #[test]
    #[should_panic(expected = "release of free sector")]
    fn double_release_is_fatal() {
        let mut map = FreeMap::create(SectorId::new(2), 64);
        let sector = map.alloc(1).unwrap();
        map.release(sector, 1);
        map.release(sector, 1);
    }
}
