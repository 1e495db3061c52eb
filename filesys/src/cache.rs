//! # 块缓存层
//!
//! 块设备读写速度一般慢于内存读写速度，因此我们在内存中开辟固定个数的槽位，
//! 把即将操作的扇区复制到内存中。使用者对块设备的操作都经过块缓存层，
//! 且**操作扇区时一定在槽位当中**。
//!
//! 所有槽位与淘汰游标由一把锁保护，每次读写都完整地持有它一次。
//! 槽位满时按二次机会策略（见 [`Clock`]）淘汰，脏的牺牲者先写回。

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::mem;

use block_dev::BlockDevice;
use spin::Mutex;

use crate::clock::{Clock, Referenced};
use crate::layout::Pod;
use crate::{SECTOR_SIZE, SectorId};

pub struct BufferCache {
    /// 底层块设备的引用
    device: Arc<dyn BlockDevice>,
    inner: Mutex<CacheInner>,
}

/// 命中、缺失、淘汰与写回的计数
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub evictions: usize,
    pub write_backs: usize,
}

struct CacheInner {
    slots: Vec<CacheSlot>,
    clock: Clock,
    stats: CacheStats,
}

/// 内存中的扇区
struct CacheSlot {
    /// 对应的扇区号
    sector: SectorId,
    valid: bool,
    referenced: bool,
    /// 是否为脏块
    dirty: bool,
    /// 缓存的数据
    data: Box<SectorBuf>,
}

/// 对齐到 8 字节，以便整扇区地解释为磁盘上的数据结构
#[repr(C, align(8))]
struct SectorBuf([u8; SECTOR_SIZE]);

impl BufferCache {
    pub fn new(device: Arc<dyn BlockDevice>, capacity: usize) -> Self {
        assert!(capacity > 0, "block cache needs at least one slot");

        let slots = (0..capacity).map(|_| CacheSlot::empty()).collect();
        Self {
            device,
            inner: Mutex::new(CacheInner {
                slots,
                clock: Clock::new(),
                stats: CacheStats::default(),
            }),
        }
    }

    /// 从扇区 `sector` 的 `offset` 处读出 `buf.len()` 字节
    pub fn read(&self, sector: SectorId, offset: usize, buf: &mut [u8]) {
        assert!(offset + buf.len() <= SECTOR_SIZE);

        let mut inner = self.inner.lock();
        let slot = inner.fetch(&*self.device, sector, true);
        slot.referenced = true;
        buf.copy_from_slice(&slot.data.0[offset..offset + buf.len()]);
    }

    /// 把 `buf` 写入扇区 `sector` 的 `offset` 处
    pub fn write(&self, sector: SectorId, offset: usize, buf: &[u8]) {
        assert!(offset + buf.len() <= SECTOR_SIZE);

        let mut inner = self.inner.lock();
        let slot = inner.fetch(&*self.device, sector, true);
        slot.referenced = true;
        slot.dirty = true;
        slot.data.0[offset..offset + buf.len()].copy_from_slice(buf);
    }

    /// 把整个扇区解释为 `T` 并读取
    pub fn map<T: Pod, V>(&self, sector: SectorId, f: impl FnOnce(&T) -> V) -> V {
        let mut inner = self.inner.lock();
        let slot = inner.fetch(&*self.device, sector, true);
        slot.referenced = true;
        f(slot.data.get())
    }

    /// 把整个扇区解释为 `T` 并修改
    pub fn map_mut<T: Pod, V>(&self, sector: SectorId, f: impl FnOnce(&mut T) -> V) -> V {
        let mut inner = self.inner.lock();
        let slot = inner.fetch(&*self.device, sector, true);
        slot.referenced = true;
        slot.dirty = true;
        f(slot.data.get_mut())
    }

    /// 新分配的扇区：直接占用槽位并清零，不读设备
    pub fn zero(&self, sector: SectorId) {
        let mut inner = self.inner.lock();
        let slot = inner.fetch(&*self.device, sector, false);
        slot.data.0.fill(0);
        slot.referenced = true;
        slot.dirty = true;
    }

    /// 写回所有有效的脏槽位
    pub fn flush_all(&self) {
        let mut inner = self.inner.lock();
        let CacheInner { slots, stats, .. } = &mut *inner;

        for slot in slots.iter_mut().filter(|slot| slot.valid && slot.dirty) {
            slot.flush(&*self.device);
            stats.write_backs += 1;
        }
    }

    #[inline]
    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats
    }

    /// 扇区当前是否驻留在缓存中
    pub fn contains(&self, sector: SectorId) -> bool {
        self.inner.lock().lookup(sector).is_some()
    }
}

impl Drop for BufferCache {
    fn drop(&mut self) {
        self.flush_all();
    }
}

impl CacheInner {
    fn lookup(&self, sector: SectorId) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.valid && slot.sector == sector)
    }

    /// 定位或装入扇区：已驻留 → 首个空槽位 → 二次机会淘汰
    fn fetch(&mut self, device: &dyn BlockDevice, sector: SectorId, load: bool) -> &mut CacheSlot {
        if let Some(index) = self.lookup(sector) {
            self.stats.hits += 1;
            return &mut self.slots[index];
        }
        self.stats.misses += 1;

        let index = match self.slots.iter().position(|slot| !slot.valid) {
            Some(index) => index,
            None => {
                let index = self.clock.select_victim(&mut self.slots);
                let victim = &mut self.slots[index];
                log::debug!("evict sector {} from slot {index}", victim.sector);
                if victim.dirty {
                    victim.flush(device);
                    self.stats.write_backs += 1;
                }
                self.stats.evictions += 1;
                index
            }
        };

        let slot = &mut self.slots[index];
        slot.sector = sector;
        slot.valid = true;
        slot.referenced = true;
        slot.dirty = false;
        if load {
            log::trace!("load sector {sector} into slot {index}");
            device.read_block(sector.block(), &mut slot.data.0);
        }

        slot
    }
}

impl CacheSlot {
    fn empty() -> Self {
        Self {
            sector: SectorId::NONE,
            valid: false,
            referenced: false,
            dirty: false,
            data: Box::new(SectorBuf([0; SECTOR_SIZE])),
        }
    }

    fn flush(&mut self, device: &dyn BlockDevice) {
        if self.dirty {
            self.dirty = false;
            device.write_block(self.sector.block(), &self.data.0);
        }
    }
}

impl Referenced for CacheSlot {
    #[inline]
    fn referenced(&self) -> bool {
        self.referenced
    }

    #[inline]
    fn set_referenced(&mut self, referenced: bool) {
        self.referenced = referenced;
    }
}

impl SectorBuf {
    fn get<T: Pod>(&self) -> &T {
        assert!(mem::size_of::<T>() <= SECTOR_SIZE);
        assert!(mem::align_of::<T>() <= mem::align_of::<Self>());
        // SAFETY: 大小与对齐已检查，`Pod` 保证任意字节都是合法的 `T`
        unsafe { &*self.0.as_ptr().cast() }
    }

    fn get_mut<T: Pod>(&mut self) -> &mut T {
        assert!(mem::size_of::<T>() <= SECTOR_SIZE);
        assert!(mem::align_of::<T>() <= mem::align_of::<Self>());
        // SAFETY: 同上
        unsafe { &mut *self.0.as_mut_ptr().cast() }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    /// 记录每个扇区被写入设备的次数
    struct CountingDisk {
        sectors: Mutex<Vec<[u8; SECTOR_SIZE]>>,
        writes: Mutex<Vec<usize>>,
    }

    impl CountingDisk {
        fn new(sectors: usize) -> Arc<Self> {
            Arc::new(Self {
                sectors: Mutex::new(vec![[0; SECTOR_SIZE]; sectors]),
                writes: Mutex::new(vec![0; sectors]),
            })
        }

        fn writes(&self, block_id: usize) -> usize {
            self.writes.lock().unwrap()[block_id]
        }

        fn byte(&self, block_id: usize, offset: usize) -> u8 {
            self.sectors.lock().unwrap()[block_id][offset]
        }
    }

    impl BlockDevice for CountingDisk {
        fn read_block(&self, block_id: usize, buf: &mut [u8]) {
            buf.copy_from_slice(&self.sectors.lock().unwrap()[block_id]);
        }

        fn write_block(&self, block_id: usize, buf: &[u8]) {
            self.sectors.lock().unwrap()[block_id].copy_from_slice(buf);
            self.writes.lock().unwrap()[block_id] += 1;
        }
    }

    fn sid(raw: u32) -> SectorId {
        SectorId::new(raw)
    }

    #[test]
    fn partial_write_then_read() {
        let disk = CountingDisk::new(8);
        let cache = BufferCache::new(disk.clone(), 4);

        cache.write(sid(3), 100, b"hello");
        let mut buf = [0u8; 7];
        cache.read(sid(3), 99, &mut buf);
        assert_eq!(&buf, b"\0hello\0");
        // 仍在缓存中，尚未落盘
        assert_eq!(disk.writes(3), 0);

        cache.flush_all();
        assert_eq!(disk.writes(3), 1);
        assert_eq!(disk.byte(3, 100), b'h');

        // 干净的槽位不再写回
        cache.flush_all();
        assert_eq!(disk.writes(3), 1);
    }

    #[test]
    fn one_eviction_per_excess_sector() {
        const N: usize = 4;
        let disk = CountingDisk::new(16);
        let cache = BufferCache::new(disk.clone(), N);

        for raw in 0..N as u32 {
            cache.write(sid(raw), 0, &[raw as u8 + 1]);
        }
        assert_eq!(cache.stats().evictions, 0);

        for (excess, raw) in (N as u32..N as u32 + 3).enumerate() {
            cache.read(sid(raw), 0, &mut [0]);
            assert_eq!(cache.stats().evictions, excess + 1);
        }

        // 被淘汰的脏扇区恰好写回一次，内容正确
        let written: usize = (0..N).map(|id| disk.writes(id)).sum();
        assert_eq!(written, 3);
        for id in 0..N {
            assert!(disk.writes(id) <= 1);
            if disk.writes(id) == 1 {
                assert_eq!(disk.byte(id, 0), id as u8 + 1);
            }
        }

        cache.flush_all();
        for id in 0..N {
            assert_eq!(disk.writes(id), 1);
        }
    }

    #[test]
    fn recently_touched_slot_survives_next_sweep() {
        let disk = CountingDisk::new(16);
        let cache = BufferCache::new(disk, 3);

        for raw in 0..3 {
            cache.read(sid(raw), 0, &mut [0]);
        }
        // 第一次淘汰：清空所有引用位，0 号被替换为 3，游标停在 1
        cache.read(sid(3), 0, &mut [0]);
        assert!(!cache.contains(sid(0)));

        // 在两次扫描之间访问 1 号
        cache.read(sid(1), 0, &mut [0]);
        cache.read(sid(4), 0, &mut [0]);

        assert!(cache.contains(sid(1)));
        assert!(!cache.contains(sid(2)));
        assert!(cache.contains(sid(3)));
        assert!(cache.contains(sid(4)));
    }

    #[test]
    fn zeroed_sector_is_not_read_from_device() {
        let disk = CountingDisk::new(4);
        disk.write_block(2, &[0xff; SECTOR_SIZE]);
        let cache = BufferCache::new(disk.clone(), 2);

        cache.zero(sid(2));
        let mut buf = [0xaa; 4];
        cache.read(sid(2), 508, &mut buf);
        assert_eq!(buf, [0; 4]);

        drop(cache);
        assert_eq!(disk.byte(2, 0), 0);
    }
}
