//! 工具函数模块
//!
//! 提供文件路径处理、并发度计算等通用工具函数。

/// 文件路径处理工具函数
pub mod path {
    use std::path::Path;

    use crate::tools::constants::NCM_EXTENSION;

    /// 提取文件名（返回String，用于日志显示）
    #[inline]
    pub fn extract_filename_lossy(path: &Path) -> String {
        path.file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string()
    }

    /// 获取父目录（没有父目录或为空时返回当前目录）
    #[inline]
    pub fn get_parent_dir(path: &Path) -> &Path {
        path.parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    }

    /// 是否为 `.ncm` 文件名（不区分大小写）
    #[inline]
    pub fn has_ncm_extension(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(NCM_EXTENSION))
    }

    /// 去掉末尾的 `.ncm`（不区分大小写），其他后缀原样保留
    pub fn strip_ncm_extension(file_name: &str) -> &str {
        let suffix_len = NCM_EXTENSION.len() + 1;
        let split = match file_name.len().checked_sub(suffix_len) {
            Some(split) if split > 0 => split,
            _ => return file_name,
        };

        match file_name.get(split..) {
            Some(suffix)
                if suffix.starts_with('.') && suffix[1..].eq_ignore_ascii_case(NCM_EXTENSION) =>
            {
                &file_name[..split]
            }
            _ => file_name,
        }
    }
}

/// 并发度工具函数
pub mod parallel {
    use crate::tools::constants::parallel_limits::{MAX_PARALLEL_DEGREE, MIN_PARALLEL_DEGREE};

    /// 夹紧并发度到 1..=32
    #[inline]
    pub fn clamp_parallel_degree(degree: usize) -> usize {
        degree.clamp(MIN_PARALLEL_DEGREE, MAX_PARALLEL_DEGREE)
    }

    /// 默认并发度：硬件并行度（无法获取时为1）
    pub fn default_parallel_degree() -> usize {
        let hardware = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(MIN_PARALLEL_DEGREE);
        clamp_parallel_degree(hardware)
    }
}

// 重新导出为平级函数
pub use parallel::{clamp_parallel_degree, default_parallel_degree};
pub use path::{extract_filename_lossy, get_parent_dir, has_ncm_extension, strip_ncm_extension};
