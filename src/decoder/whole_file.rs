//! 整文件模式：内存占用随文件大小线性增长，实现最简单

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use super::output_path_for;
use crate::container::{NcmKeySet, parse_container};
use crate::error::NcmResult;

pub(super) fn decode(keys: &NcmKeySet, input: &Path, output_dir: &Path) -> NcmResult<PathBuf> {
    let mut data = fs::read(input)?;

    let layout = {
        let mut cursor = Cursor::new(data.as_slice());
        parse_container(&mut cursor, keys)?
    };

    let mut payload = data.split_off(layout.payload_offset as usize);
    drop(data);
    layout.key_box().apply(&mut payload, 0);

    // 全部解密完成后才创建输出文件
    let output_path = output_path_for(input, output_dir, &layout.format);
    fs::create_dir_all(output_dir)?;
    fs::write(&output_path, &payload)?;

    Ok(output_path)
}
