use std::cell::{RefCell, RefMut};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};

use block_dev::BlockDevice;
use filesys::SECTOR_SIZE;
use send_wrapper::SendWrapper;

/// 把宿主机上的镜像文件当作扇区设备
///
/// 镜像只能在打开它的线程上读写，跨线程访问会直接 panic。
#[derive(Debug)]
pub struct BlockFile {
    image: SendWrapper<RefCell<File>>,
}

impl BlockFile {
    pub fn new(image: File) -> Self {
        Self {
            image: SendWrapper::new(RefCell::new(image)),
        }
    }

    /// 镜像中完整扇区的个数，末尾不足一个扇区的部分不计
    pub fn sectors(&self) -> io::Result<u32> {
        let len = self.image.borrow().metadata()?.len();
        Ok((len / SECTOR_SIZE as u64) as u32)
    }

    fn seek_sector(&self, block_id: usize) -> RefMut<'_, File> {
        let mut image = self.image.borrow_mut();
        let pos = (block_id * SECTOR_SIZE) as u64;
        if let Err(err) = image.seek(SeekFrom::Start(pos)) {
            panic!("image: cannot seek to sector {block_id}: {err}");
        }
        image
    }
}

// 扇区读写失败时镜像已不可信，直接中止
impl BlockDevice for BlockFile {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) {
        debug_assert_eq!(buf.len(), SECTOR_SIZE);
        self.seek_sector(block_id)
            .read_exact(buf)
            .unwrap_or_else(|err| panic!("image: short read at sector {block_id}: {err}"));
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) {
        debug_assert_eq!(buf.len(), SECTOR_SIZE);
        self.seek_sector(block_id)
            .write_all(buf)
            .unwrap_or_else(|err| panic!("image: write failed at sector {block_id}: {err}"));
    }
}
