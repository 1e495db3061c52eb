use core::fmt;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    AlreadyExists,
    NotFound,
    IsADirectory,
    NotADirectory,
    DirectoryNotEmpty,
    /// 名字为空或超出长度上限
    InvalidName,
    /// 空闲扇区耗尽
    NoSpace,
    /// 超出两级索引所能寻址的范围
    FileTooLarge,
    /// 文件正作为可执行映像使用
    WriteDenied,
    /// 目标已被删除，仅在最后一次关闭前仍可访问
    Removed,
    /// 超级块魔数不符
    BadMagic,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::AlreadyExists => "entry already exists",
            Self::NotFound => "no such file or directory",
            Self::IsADirectory => "is a directory",
            Self::NotADirectory => "not a directory",
            Self::DirectoryNotEmpty => "directory not empty",
            Self::InvalidName => "invalid file name",
            Self::NoSpace => "no space left on device",
            Self::FileTooLarge => "file too large",
            Self::WriteDenied => "write denied on executing image",
            Self::Removed => "target has been removed",
            Self::BadMagic => "not a filesys volume",
        };
        f.write_str(msg)
    }
}

impl core::error::Error for Error {}
