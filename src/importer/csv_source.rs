// ==========================================
// 实体导入系统 - CSV 记录流
// ==========================================
// 职责: 逐行读取合并后的 CSV 工作文件，产出标准化记录
// 规则:
// - has_header=true: 首行作为表头（去空白），其后每行与表头按最短长度配对
// - has_header=false: 记录无列名，仅支持按位置访问
// - 空行不产生记录
// - 非 UTF-8 字节按 U+FFFD 宽松解码，表头行首 BOM 去除
// 迭代器只进不退，需要重读时重新打开文件
// ==========================================

use crate::importer::csv_merge::{strip_bom, CsvMergeReport, CsvMerger};
use crate::importer::error::{ImportError, ImportResult};
use csv::ByteRecord;
use serde_json::{Map, Value};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

// ==========================================
// SourceRecord - 单条源记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRecord {
    /// 列名 → 值（保持列顺序）
    Keyed(Vec<(String, String)>),
    /// 无表头，按位置访问
    Positional(Vec<String>),
}

impl SourceRecord {
    pub fn get(&self, column: &str) -> Option<&str> {
        match self {
            SourceRecord::Keyed(pairs) => pairs
                .iter()
                .find(|(key, _)| key == column)
                .map(|(_, value)| value.as_str()),
            SourceRecord::Positional(_) => None,
        }
    }

    pub fn get_index(&self, index: usize) -> Option<&str> {
        match self {
            SourceRecord::Keyed(pairs) => pairs.get(index).map(|(_, v)| v.as_str()),
            SourceRecord::Positional(values) => values.get(index).map(String::as_str),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            SourceRecord::Keyed(pairs) => pairs.len(),
            SourceRecord::Positional(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 转为 JSON（Keyed → 对象，Positional → 数组）
    pub fn to_json(&self) -> Value {
        match self {
            SourceRecord::Keyed(pairs) => Value::Object(
                pairs
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect::<Map<String, Value>>(),
            ),
            SourceRecord::Positional(values) => {
                Value::Array(values.iter().cloned().map(Value::String).collect())
            }
        }
    }
}

// ==========================================
// CsvRecordReader - 单文件记录迭代器
// ==========================================
pub struct CsvRecordReader {
    path: PathBuf,
    reader: csv::Reader<File>,
    has_header: bool,
    headers: Option<Vec<String>>,
    header_consumed: bool,
    record: ByteRecord,
    line: u64, // 最近读取记录所在行（1 起）
}

impl CsvRecordReader {
    /// 打开 CSV 文件
    ///
    /// # 错误
    /// - FileUnreadable: 文件无法打开
    pub fn open(path: impl AsRef<Path>, has_header: bool) -> ImportResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| ImportError::unreadable(&path, e))?;
        let reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true) // 允许行长度与表头不一致
            .from_reader(file);

        Ok(Self {
            path,
            reader,
            has_header,
            headers: None,
            header_consumed: !has_header,
            record: ByteRecord::new(),
            line: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn has_header(&self) -> bool {
        self.has_header
    }

    /// 当前行位置
    pub fn line(&self) -> u64 {
        self.line
    }

    /// 表头（去空白）；has_header=false 或文件为空时为 None
    pub fn headers(&mut self) -> ImportResult<Option<&[String]>> {
        self.consume_header()?;
        Ok(self.headers.as_deref())
    }

    fn consume_header(&mut self) -> ImportResult<()> {
        if self.header_consumed {
            return Ok(());
        }
        self.header_consumed = true;

        if self.read_next()? {
            let headers = self
                .record
                .iter()
                .enumerate()
                .map(|(i, h)| {
                    let h = if i == 0 { strip_bom(h) } else { h };
                    decode_field(h).trim().to_string()
                })
                .collect();
            self.headers = Some(headers);
        }
        Ok(())
    }

    fn read_next(&mut self) -> ImportResult<bool> {
        let found = self.reader.read_byte_record(&mut self.record)?;
        if found {
            if let Some(position) = self.record.position() {
                self.line = position.line();
            }
        }
        Ok(found)
    }

    fn next_record(&mut self) -> ImportResult<Option<SourceRecord>> {
        self.consume_header()?;
        if !self.read_next()? {
            return Ok(None);
        }

        let record = match &self.headers {
            Some(headers) => SourceRecord::Keyed(
                headers
                    .iter()
                    .zip(self.record.iter())
                    .map(|(key, value)| (key.clone(), decode_field(value)))
                    .collect(),
            ),
            None => SourceRecord::Positional(self.record.iter().map(decode_field).collect()),
        };
        Ok(Some(record))
    }
}

fn decode_field(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

impl Iterator for CsvRecordReader {
    type Item = ImportResult<SourceRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

// ==========================================
// CsvRecordSource - 合并 + 迭代
// ==========================================
// 合并在 open 时一次性完成，之后才开始产出记录；
// 合并文件由调用方在管道执行（及回滚）结束后显式释放
pub struct CsvRecordSource {
    report: CsvMergeReport,
    reader: CsvRecordReader,
}

impl CsvRecordSource {
    /// 合并文件并打开记录流
    pub fn open(merger: &CsvMerger, files: &[PathBuf], has_header: bool) -> ImportResult<Self> {
        let report = merger.merge(files, has_header)?;
        let reader = CsvRecordReader::open(&report.path, has_header)?;

        debug!(merged_path = %report.path.display(), has_header, "CSV 记录流已打开");
        Ok(Self { report, reader })
    }

    pub fn merged_path(&self) -> &Path {
        &self.report.path
    }

    pub fn report(&self) -> &CsvMergeReport {
        &self.report
    }

    pub fn headers(&mut self) -> ImportResult<Option<&[String]>> {
        self.reader.headers()
    }

    pub fn line(&self) -> u64 {
        self.reader.line()
    }

    /// 重新打开合并文件，从头读取
    pub fn rewind(&mut self) -> ImportResult<()> {
        self.reader = CsvRecordReader::open(&self.report.path, self.reader.has_header())?;
        Ok(())
    }

    /// 删除合并文件（已不存在时忽略）
    pub fn release(self) -> ImportResult<()> {
        release_merged_file(&self.report.path)
    }
}

impl Iterator for CsvRecordSource {
    type Item = ImportResult<SourceRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader.next()
    }
}

/// 删除合并文件（已不存在时忽略）
pub fn release_merged_file(path: &Path) -> ImportResult<()> {
    match fs::remove_file(path) {
        Ok(()) => {
            info!(path = %path.display(), "合并文件已删除");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ImportError::unwritable(path, e)),
    }
}
