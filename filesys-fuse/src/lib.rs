//! 宿主机上的工具：以文件为块设备，把宿主目录树打包进镜像


mod block_file;

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use filesys::{Dir, FileSystem};
use vfs::DirEntryType;

pub use self::block_file::BlockFile;

/// 把宿主目录 `source` 递归复制到镜像中的 `dir` 下，返回复制的文件个数
///
/// 同一目录下按名字排序，镜像内容因此与宿主的遍历顺序无关。
pub fn pack(fs: &FileSystem, dir: &Dir, source: &Path) -> io::Result<usize> {
    let mut entries = fs::read_dir(source)?.collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|entry| entry.file_name());

    let mut files = 0;
    for entry in entries {
        let file_name = entry.file_name();
        let name = file_name.to_str().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, format!("{file_name:?} isn't UTF-8"))
        })?;
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            fs.mkdir(Some(dir), name).map_err(io::Error::other)?;
            let sub_dir = fs.chdir(Some(dir), name).map_err(io::Error::other)?;
            files += pack(fs, &sub_dir, &entry.path())?;
        } else if file_type.is_file() {
            let data = fs::read(entry.path())?;
            fs.create(Some(dir), name, 0).map_err(io::Error::other)?;
            let mut handle = fs.open(Some(dir), name).map_err(io::Error::other)?;
            handle.write(&data).map_err(io::Error::other)?;

            log::info!("packed {:?}: {} bytes", entry.path(), data.len());
            files += 1;
        } else {
            log::warn!("skip {:?}: neither file nor directory", entry.path());
        }
    }

    Ok(files)
}

/// 以缩进的形式列出 `dir` 之下的整棵树，目录名后缀 `/`
pub fn tree(fs: &FileSystem, dir: &Dir, depth: usize, out: &mut impl Write) -> io::Result<()> {
    for entry in dir.entries() {
        let is_dir = entry.ty == DirEntryType::Directory;
        writeln!(
            out,
            "{:indent$}{}{}",
            "",
            entry.name,
            if is_dir { "/" } else { "" },
            indent = depth * 2
        )?;

        if is_dir {
            let sub_dir = fs.chdir(Some(dir), &entry.name).map_err(io::Error::other)?;
            tree(fs, &sub_dir, depth + 1, out)?;
        }
    }

    Ok(())
}
