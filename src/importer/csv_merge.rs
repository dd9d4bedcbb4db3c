// ==========================================
// 实体导入系统 - CSV 多文件合并
// ==========================================
// 职责: 将多个上传的 CSV 文件按行合并为一个临时工作文件
// 规则:
// - has_header=true 时，第一个文件的表头作为标准表头，只写入一次
// - 后续文件表头逐字段比较，不一致则跳过该文件（不删除、不写分隔行）
// - 已合并的源文件删除，并在其内容后写入一个空行分隔
// ==========================================

use crate::config::ImportSettings;
use crate::importer::error::{ImportError, ImportResult};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// 合并结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvMergeReport {
    pub path: PathBuf,                  // 合并后的临时文件
    pub header: Option<Vec<String>>,    // 标准表头（has_header=false 时为 None）
    pub merged_files: Vec<PathBuf>,     // 已合并（并已删除）的源文件
    pub skipped_files: Vec<PathBuf>,    // 表头不一致被跳过的源文件
}

// ==========================================
// CsvMerger
// ==========================================
#[derive(Debug, Clone)]
pub struct CsvMerger {
    directory: PathBuf,
    prefix: String,
}

impl CsvMerger {
    pub fn new(directory: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            prefix: prefix.into(),
        }
    }

    pub fn from_settings(settings: &ImportSettings) -> Self {
        Self::new(&settings.merge_directory, &settings.merge_file_prefix)
    }

    /// 生成唯一的合并文件路径: {directory}/{prefix}{uuid}
    fn merge_file_path(&self) -> PathBuf {
        self.directory
            .join(format!("{}{}", self.prefix, Uuid::new_v4().simple()))
    }

    /// 合并 CSV 文件
    ///
    /// # 错误
    /// - FileUnwritable: 合并目标无法创建/写入，或源文件无法删除
    /// - FileUnreadable: 源文件无法打开/读取
    ///
    /// 出错时已写入的合并文件会被清理
    #[instrument(skip(self, files), fields(file_count = files.len()))]
    pub fn merge(&self, files: &[PathBuf], has_header: bool) -> ImportResult<CsvMergeReport> {
        let target = self.merge_file_path();
        let handle = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
            .map_err(|e| ImportError::unwritable(&target, e))?;

        match merge_into(handle, &target, files, has_header) {
            Ok(report) => {
                info!(
                    merged_path = %report.path.display(),
                    merged = report.merged_files.len(),
                    skipped = report.skipped_files.len(),
                    "CSV 文件合并完成"
                );
                Ok(report)
            }
            Err(err) => {
                if let Err(cleanup) = fs::remove_file(&target) {
                    warn!(path = %target.display(), error = %cleanup, "合并文件清理失败");
                }
                Err(err)
            }
        }
    }
}

fn merge_into(
    handle: File,
    target: &Path,
    files: &[PathBuf],
    has_header: bool,
) -> ImportResult<CsvMergeReport> {
    let mut writer = BufWriter::new(handle);
    let mut report = CsvMergeReport {
        path: target.to_path_buf(),
        header: None,
        merged_files: Vec::new(),
        skipped_files: Vec::new(),
    };

    for source in files {
        let included = copy_file(&mut writer, target, source, has_header, &mut report.header)?;
        if !included {
            warn!(file = %source.display(), "CSV 表头与首个文件不一致，跳过该文件");
            report.skipped_files.push(source.clone());
            continue;
        }

        fs::remove_file(source).map_err(|e| ImportError::unwritable(source, e))?;
        writer
            .write_all(b"\n")
            .map_err(|e| ImportError::unwritable(target, e))?;
        debug!(file = %source.display(), "CSV 文件已合并");
        report.merged_files.push(source.clone());
    }

    writer.flush().map_err(|e| ImportError::unwritable(target, e))?;
    Ok(report)
}

const UTF8_BOM: &[u8] = b"\xef\xbb\xbf";

/// 逐行复制单个源文件（按字节复制，不要求 UTF-8）
///
/// # 返回
/// - Ok(false): 表头不一致，未写入任何内容
fn copy_file(
    writer: &mut BufWriter<File>,
    target: &Path,
    source: &Path,
    has_header: bool,
    header: &mut Option<Vec<String>>,
) -> ImportResult<bool> {
    let file = File::open(source).map_err(|e| ImportError::unreadable(source, e))?;
    let mut reader = BufReader::new(file);
    let mut line: Vec<u8> = Vec::new();
    let mut line_no: u64 = 0;

    loop {
        line.clear();
        let read = reader
            .read_until(b'\n', &mut line)
            .map_err(|e| ImportError::unreadable(source, e))?;
        if read == 0 {
            break;
        }
        line_no += 1;

        let mut bytes = line.as_slice();
        if line_no == 1 {
            bytes = strip_bom(bytes);
        }

        if has_header && line_no == 1 {
            let fields = parse_csv_line(bytes)?;
            if let Some(canonical) = header.as_ref() {
                if *canonical != fields {
                    return Ok(false);
                }
                continue;
            }
            *header = Some(fields);
        }

        writer
            .write_all(bytes)
            .map_err(|e| ImportError::unwritable(target, e))?;
    }

    Ok(true)
}

/// 去除行首 UTF-8 BOM
pub fn strip_bom(line: &[u8]) -> &[u8] {
    line.strip_prefix(UTF8_BOM).unwrap_or(line)
}

/// 解析单行 CSV（字段按 UTF-8 宽松解码并去除首尾空白）
pub fn parse_csv_line(line: &[u8]) -> ImportResult<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(line);

    let mut record = csv::ByteRecord::new();
    if !reader.read_byte_record(&mut record)? {
        return Ok(Vec::new());
    }
    Ok(record
        .iter()
        .map(|f| String::from_utf8_lossy(f).trim().to_string())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_csv_line_trims_and_unquotes() {
        let fields = parse_csv_line(b"a ,\"b, c\", d\r\n").unwrap();
        assert_eq!(fields, vec!["a", "b, c", "d"]);
    }

    #[test]
    fn test_parse_blank_line() {
        assert!(parse_csv_line(b"\n").unwrap().is_empty());
    }

    #[test]
    fn test_merge_file_name_uses_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let merger = CsvMerger::new(dir.path(), "ENTITY_IMPORTER_");
        let report = merger.merge(&[], true).unwrap();

        let name = report.path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("ENTITY_IMPORTER_"));
        assert!(report.path.exists());
        assert_eq!(report.header, None);
    }

    #[test]
    fn test_missing_source_is_unreadable_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let merger = CsvMerger::new(dir.path(), "ENTITY_IMPORTER_");
        let missing = dir.path().join("missing.csv");

        let err = merger.merge(&[missing], true).unwrap_err();
        assert_eq!(err.kind(), "file_unreadable");
        // 合并临时文件已清理
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_parse_csv_line_strips_bom_and_decodes_lossy() {
        let fields = parse_csv_line(strip_bom(b"\xef\xbb\xbfname,Z\xfcrich\n")).unwrap();
        assert_eq!(fields, vec!["name".to_string(), "Z\u{fffd}rich".to_string()]);
    }

    #[test]
    fn test_merge_copies_latin1_bytes_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.csv");
        fs::write(&source, b"name,city\nJos\xe9,Z\xfcrich\n").unwrap();
        let merger = CsvMerger::new(dir.path(), "ENTITY_IMPORTER_");

        let report = merger.merge(&[source.clone()], true).unwrap();

        assert_eq!(report.header, Some(vec!["name".to_string(), "city".to_string()]));
        assert_eq!(report.merged_files, vec![source]);
        assert_eq!(
            fs::read(&report.path).unwrap(),
            b"name,city\nJos\xe9,Z\xfcrich\n\n".to_vec()
        );
    }

    #[test]
    fn test_bom_on_first_file_does_not_reject_later_files() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("a.csv");
        let second = dir.path().join("b.csv");
        fs::write(&first, b"\xef\xbb\xbfname,city\nAda,London\n").unwrap();
        fs::write(&second, b"name,city\nGrace,New York\n").unwrap();
        let merger = CsvMerger::new(dir.path(), "ENTITY_IMPORTER_");

        let report = merger.merge(&[first, second], true).unwrap();

        assert_eq!(report.header, Some(vec!["name".to_string(), "city".to_string()]));
        assert_eq!(report.merged_files.len(), 2);
        assert!(report.skipped_files.is_empty());
        assert_eq!(
            fs::read_to_string(&report.path).unwrap(),
            "name,city\nAda,London\n\nGrace,New York\n\n"
        );
    }
}
