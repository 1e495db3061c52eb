mod common;

use filesys::layout::MAX_FILE_SIZE;
use filesys::{Config, Error};

use common::{RamDisk, format, fresh, open_file, pattern};

#[test]
fn write_then_read_round_trip() {
    let (_disk, fs) = fresh(1024);
    fs.create(None, "/a", 0).unwrap();
    let file = open_file(&fs, "/a");

    // 跨越多个扇区且不对齐
    let data = pattern(3000);
    assert_eq!(file.write_at(123, &data).unwrap(), data.len());
    assert_eq!(file.length(), 123 + data.len());

    let mut back = vec![0; data.len()];
    assert_eq!(file.read_at(123, &mut back), data.len());
    assert_eq!(back, data);
}

#[test]
fn read_is_clipped_at_end_of_file() {
    let (_disk, fs) = fresh(256);
    fs.create(None, "/a", 0).unwrap();
    let file = open_file(&fs, "/a");
    file.write_at(0, b"abcdef").unwrap();

    let mut buf = [0u8; 16];
    assert_eq!(file.read_at(4, &mut buf), 2);
    assert_eq!(&buf[..2], b"ef");
    assert_eq!(file.read_at(6, &mut buf), 0);
    assert_eq!(file.read_at(100, &mut buf), 0);
}

#[test]
fn extension_reads_back_zero_interior() {
    // 盘上原有的垃圾不能透过新分配的扇区泄露出来
    let disk = RamDisk::filled(1024, 0xAA);
    let fs = format(&disk, 1024, Config::default());
    fs.create(None, "/sparse", 0).unwrap();
    let file = open_file(&fs, "/sparse");

    assert_eq!(file.write_at(5000, b"tail").unwrap(), 4);
    assert_eq!(file.length(), 5004);

    let mut interior = vec![0xFF; 5000];
    assert_eq!(file.read_at(0, &mut interior), 5000);
    assert!(interior.iter().all(|&byte| byte == 0));
}

#[test]
fn initial_size_is_zero_filled() {
    let disk = RamDisk::filled(256, 0x5A);
    let fs = format(&disk, 256, Config::default());
    fs.create(None, "/z", 1500).unwrap();

    let file = open_file(&fs, "/z");
    assert_eq!(file.length(), 1500);
    let mut buf = vec![0xFF; 1500];
    assert_eq!(file.read_at(0, &mut buf), 1500);
    assert!(buf.iter().all(|&byte| byte == 0));
}

#[test]
fn openers_share_state() {
    let (_disk, fs) = fresh(256);
    fs.create(None, "/shared", 0).unwrap();

    let mut a = open_file(&fs, "/shared");
    let mut b = open_file(&fs, "/shared");
    assert_eq!(a.inode().open_count(), 2);

    a.write(b"hello").unwrap();
    assert_eq!(b.length(), 5);
    let mut buf = [0u8; 5];
    assert_eq!(b.read(&mut buf), 5);
    assert_eq!(&buf, b"hello");
    assert_eq!(b.tell(), 5);
    assert_eq!(a.tell(), 5);

    drop(a);
    assert_eq!(b.inode().open_count(), 1);
    drop(b);
    assert_eq!(fs.open_inodes(), 0);
}

#[test]
fn seek_past_end_then_write_grows() {
    let (_disk, fs) = fresh(256);
    fs.create(None, "/f", 0).unwrap();
    let mut file = open_file(&fs, "/f");

    file.seek(700);
    assert_eq!(file.write(b"xy").unwrap(), 2);
    assert_eq!(file.tell(), 702);
    assert_eq!(file.length(), 702);

    file.seek(0);
    let mut buf = vec![0u8; 800];
    assert_eq!(file.read(&mut buf), 702);
    assert_eq!(&buf[700..702], b"xy");
}

#[test]
fn offsets_near_usize_max_do_not_overflow() {
    let (_disk, fs) = fresh(256);
    fs.create(None, "/f", 0).unwrap();
    let mut file = open_file(&fs, "/f");
    file.write(b"abc").unwrap();

    file.seek(usize::MAX);
    let mut buf = [0u8; 16];
    assert_eq!(file.read(&mut buf), 0);
    assert_eq!(file.tell(), usize::MAX);
    assert_eq!(file.write(b"x"), Err(Error::FileTooLarge));
    assert_eq!(file.read_at(usize::MAX - 1, &mut buf), 0);
    assert_eq!(file.write_at(usize::MAX - 1, b"xy"), Err(Error::FileTooLarge));
    assert_eq!(file.length(), 3);
}

#[test]
fn removed_file_lives_until_last_close() {
    let (_disk, fs) = fresh(512);
    let free_before = fs.free_sectors();

    fs.create(None, "/doomed", 0).unwrap();
    let file = open_file(&fs, "/doomed");
    let data = pattern(2000);
    file.write_at(0, &data).unwrap();
    // inode 扇区 + 4 个数据块 + 两个索引块
    assert_eq!(fs.free_sectors(), free_before - 7);

    fs.remove(None, "/doomed").unwrap();
    assert!(file.inode().is_removed());
    assert!(matches!(fs.open(None, "/doomed"), Err(Error::NotFound)));

    // 仍可读写
    let mut back = vec![0; 2000];
    assert_eq!(file.read_at(0, &mut back), 2000);
    assert_eq!(back, data);
    assert_eq!(file.write_at(2000, b"more").unwrap(), 4);

    drop(file);
    assert_eq!(fs.free_sectors(), free_before);
    assert_eq!(fs.open_inodes(), 0);
}

#[test]
fn deny_write_blocks_every_opener() {
    let (_disk, fs) = fresh(256);
    fs.create(None, "/exe", 0).unwrap();
    let mut image = open_file(&fs, "/exe");
    let mut other = open_file(&fs, "/exe");

    image.deny_write();
    // 同一句柄重复禁写不叠加
    image.deny_write();
    assert_eq!(other.write(b"x"), Err(Error::WriteDenied));
    assert_eq!(image.write_at(0, b"x"), Err(Error::WriteDenied));

    image.allow_write();
    assert_eq!(other.write(b"x"), Ok(1));

    // 关闭句柄即解除禁写
    image.deny_write();
    drop(image);
    assert_eq!(other.write(b"y"), Ok(1));
}

#[test]
fn failed_growth_leaves_nothing_behind() {
    let (_disk, fs) = fresh(64);
    fs.create(None, "/f", 0).unwrap();
    let free = fs.free_sectors();
    let file = open_file(&fs, "/f");

    let big = vec![1u8; (free + 1) * 512];
    assert_eq!(file.write_at(0, &big), Err(Error::NoSpace));
    assert_eq!(fs.free_sectors(), free);
    assert_eq!(file.length(), 0);

    // 空间足够时照常增长
    assert_eq!(file.write_at(0, &big[..4 * 512]), Ok(4 * 512));
    assert_eq!(fs.free_sectors(), free - 6);
}

#[test]
fn growth_is_bounded_by_two_level_index() {
    let (_disk, fs) = fresh(64);
    fs.create(None, "/f", 0).unwrap();
    let file = open_file(&fs, "/f");

    assert_eq!(file.write_at(MAX_FILE_SIZE, b"x"), Err(Error::FileTooLarge));
    assert_eq!(file.write_at(0, b""), Ok(0));
    assert_eq!(file.length(), 0);
}

#[test]
fn small_cache_survives_eviction_churn() {
    let disk = RamDisk::new(2048);
    let config = Config {
        cache_capacity: 4,
        ..Config::default()
    };
    let fs = format(&disk, 2048, config);
    fs.create(None, "/big", 0).unwrap();
    let file = open_file(&fs, "/big");

    // 超过一个一级索引块所能覆盖的范围
    let data = pattern(130 * 512 + 17);
    assert_eq!(file.write_at(0, &data).unwrap(), data.len());

    let mut back = vec![0; data.len()];
    assert_eq!(file.read_at(0, &mut back), data.len());
    assert_eq!(back, data);
    assert!(fs.cache_stats().evictions > 0);
}
