//! 文件扫描模块
//!
//! 负责扫描目录中的 `.ncm` 文件（不递归子目录，扩展名不区分大小写）。

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::utils;
use crate::error::{NcmError, NcmResult};

/// 扫描目录中的 NCM 文件（严格版本）
///
/// 目录不存在或不可读时返回错误，结果按路径排序。
pub fn try_scan_files(dir_path: &Path) -> NcmResult<Vec<PathBuf>> {
    if !dir_path.exists() {
        return Err(NcmError::FileNotFound(format!(
            "目录不存在: {}",
            dir_path.display()
        )));
    }

    if !dir_path.is_dir() {
        return Err(NcmError::IoError(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("路径不是目录: {}", dir_path.display()),
        )));
    }

    let mut ncm_files = Vec::new();

    for entry in WalkDir::new(dir_path).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| {
            NcmError::IoError(
                e.into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("目录遍历失败")),
            )
        })?;

        // 只处理文件（跟随符号链接），跳过目录
        if !entry.path().is_file() {
            continue;
        }

        if utils::has_ncm_extension(entry.path()) {
            ncm_files.push(entry.into_path());
        }
    }

    // 按文件名排序
    ncm_files.sort();

    Ok(ncm_files)
}

/// 扫描目录中的 NCM 文件（宽松版本）
///
/// 扫描失败或目录不存在时返回空列表，不视为硬错误。
pub fn scan_files(dir_path: impl AsRef<Path>) -> Vec<PathBuf> {
    let dir_path = dir_path.as_ref();
    try_scan_files(dir_path).unwrap_or_else(|e| {
        log::warn!("扫描目录失败 {}: {e}", dir_path.display());
        Vec::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_scan_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.ncm", "a.NCM", "c.mp3", "d.ncm.bak", "e.Ncm"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        // 子目录中的文件不参与扫描
        fs::create_dir(dir.path().join("nested.ncm")).unwrap();
        fs::write(dir.path().join("nested.ncm").join("f.ncm"), b"x").unwrap();

        let files = scan_files(dir.path());
        let names: Vec<String> = files
            .iter()
            .map(|p| utils::extract_filename_lossy(p))
            .collect();

        assert_eq!(names, vec!["a.NCM", "b.ncm", "e.Ncm"]);
    }

    #[test]
    fn test_missing_directory_is_soft_failure() {
        let missing = Path::new("/definitely/not/a/real/dir");
        assert!(scan_files(missing).is_empty());
        assert!(matches!(
            try_scan_files(missing),
            Err(NcmError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_file_path_is_not_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("single.ncm");
        fs::write(&file, b"x").unwrap();

        assert!(scan_files(&file).is_empty());
        assert!(matches!(try_scan_files(&file), Err(NcmError::IoError(_))));
    }
}
