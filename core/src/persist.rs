use crate::config::IndexerConfig;
use crate::{Bucket, BucketTerms, DocId, Postings};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::{create_dir_all, File};
use std::io::{BufRead, BufReader, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: u32,
    pub num_terms: usize,
    pub documents_seen: usize,
    pub near_duplicates: usize,
    pub created_at: String,
    pub version: u32,
    pub config: IndexerConfig,
}

#[derive(Debug, Clone)]
pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn index(&self) -> PathBuf { self.root.join("index.txt") }
    pub fn offsets(&self) -> PathBuf { self.root.join("byte_offset.json") }
    pub fn lookup(&self) -> PathBuf { self.root.join("lookup.json") }
    pub fn meta(&self) -> PathBuf { self.root.join("meta.json") }
    pub fn partial_dir(&self) -> PathBuf { self.root.join("partial") }
    pub fn bucket(&self, bucket: Bucket) -> PathBuf {
        self.partial_dir().join(format!("partial_index_{}.json", bucket.symbol()))
    }
}

fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(dir) = path.parent() {
        create_dir_all(dir)?;
    }
    let f = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut w = BufWriter::new(f);
    serde_json::to_writer(&mut w, value)?;
    w.flush()?;
    Ok(())
}

fn load_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let f = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let value = serde_json::from_reader(BufReader::new(f))
        .with_context(|| format!("parsing {}", path.display()))?;
    Ok(value)
}

pub fn save_lookup(paths: &IndexPaths, lookup: &BTreeMap<DocId, String>) -> Result<()> {
    save_json(&paths.lookup(), lookup)
}

pub fn load_lookup(paths: &IndexPaths) -> Result<HashMap<DocId, String>> {
    load_json(&paths.lookup())
}

pub fn save_offsets(paths: &IndexPaths, offsets: &BTreeMap<String, u64>) -> Result<()> {
    save_json(&paths.offsets(), offsets)
}

pub fn load_offsets(paths: &IndexPaths) -> Result<HashMap<String, u64>> {
    load_json(&paths.offsets())
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.meta())?;
    let json = serde_json::to_string_pretty(meta)?;
    f.write_all(json.as_bytes())?;
    Ok(())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    load_json(&paths.meta())
}

/// Whole contents of a partial bucket file.
pub fn load_bucket(path: &Path) -> Result<BucketTerms> {
    load_json(path)
}

pub fn save_bucket(path: &Path, terms: &BucketTerms) -> Result<()> {
    save_json(path, terms)
}

/// Append one `{term: {doc_id: weight}}` line. Returns the number of bytes written.
pub fn write_record<W: Write>(w: &mut W, term: &str, postings: &Postings) -> Result<u64> {
    let mut record = BTreeMap::new();
    record.insert(term, postings);
    let mut line = serde_json::to_vec(&record)?;
    line.push(b'\n');
    w.write_all(&line)?;
    Ok(line.len() as u64)
}

/// Read the single record starting at `offset`.
pub fn read_record<R: BufRead + Seek>(r: &mut R, offset: u64) -> Result<(String, Postings)> {
    r.seek(SeekFrom::Start(offset))?;
    let mut line = String::new();
    if r.read_line(&mut line)? == 0 {
        bail!("no index record at offset {offset}");
    }
    let record: BTreeMap<String, Postings> =
        serde_json::from_str(&line).with_context(|| format!("malformed index record at offset {offset}"))?;
    let mut entries = record.into_iter();
    match (entries.next(), entries.next()) {
        (Some(entry), None) => Ok(entry),
        _ => bail!("index record at offset {offset} must hold exactly one term"),
    }
}
