//! FastQ I/O
//!
//! Lockstep reading of one record per input file, and the filtered and
//! annotated writers driven by cluster results.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use noodles::fastq;
use roaring::RoaringBitmap;

use crate::cluster::Cluster;
use crate::errors::{HumidError, Result};
use crate::index::{ClusterId, LeafId, SequenceIndex};
use crate::word::{Word, WordLayout, extract_umi, make_word};

pub type FastqReader = fastq::io::Reader<Box<dyn BufRead>>;
pub type FastqWriter = fastq::io::Writer<Sink>;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Suffix of the deduplicated output files
pub const FILTERED_SUFFIX: &str = "dedup";

/// Suffix of the annotated output files
pub const ANNOTATED_SUFFIX: &str = "annotated";

/// Output stream of a FastQ writer, gzip-compressed or plain.
pub enum Sink {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
}

impl Sink {
    /// Terminate the gzip stream, if any, and flush the file buffer.
    fn finish(&mut self) -> io::Result<()> {
        match self {
            Sink::Plain(w) => w.flush(),
            Sink::Gzip(w) => {
                w.try_finish()?;
                w.get_mut().flush()
            }
        }
    }
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Sink::Plain(w) => w.write(buf),
            Sink::Gzip(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Sink::Plain(w) => w.flush(),
            Sink::Gzip(w) => w.flush(),
        }
    }
}

/// Open a FastQ file, decompressing it when it starts with the gzip magic
/// bytes.
pub fn open_reader(path: &Path) -> Result<FastqReader> {
    let file = File::open(path).map_err(|e| HumidError::io(path, e))?;
    let mut buf = BufReader::with_capacity(1 << 18, file);
    let gzipped = buf.fill_buf().map_err(|e| HumidError::io(path, e))?.starts_with(&GZIP_MAGIC);
    let inner: Box<dyn BufRead> = if gzipped {
        // bgzip and other multi-member files are concatenated gzip streams
        Box::new(BufReader::with_capacity(1 << 18, MultiGzDecoder::new(buf)))
    } else {
        Box::new(buf)
    };
    Ok(fastq::io::Reader::new(inner))
}

/// Create a FastQ file, gzip-compressed when its name ends in `.gz`.
pub fn create_writer(path: &Path) -> Result<FastqWriter> {
    let file = File::create(path).map_err(|e| HumidError::io(path, e))?;
    let buf = BufWriter::with_capacity(1 << 20, file);
    let sink = if is_gzip_name(path) {
        Sink::Gzip(GzEncoder::new(buf, Compression::default()))
    } else {
        Sink::Plain(buf)
    };
    Ok(fastq::io::Writer::new(sink))
}

fn is_gzip_name(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("gz"))
}

/// Reads one record from every file at a time.
///
/// Iteration stops as soon as any file is exhausted.
pub struct ReadSets {
    readers: Vec<(PathBuf, FastqReader)>,
    done: bool,
}

impl ReadSets {
    pub fn open(paths: &[PathBuf]) -> Result<Self> {
        let readers = paths
            .iter()
            .map(|p| open_reader(p).map(|r| (p.clone(), r)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { readers, done: false })
    }

    fn read_set(&mut self) -> Result<Option<Vec<fastq::Record>>> {
        let mut records = Vec::with_capacity(self.readers.len());
        for (path, reader) in &mut self.readers {
            let mut record = fastq::Record::default();
            let n = reader.read_record(&mut record).map_err(|e| HumidError::io(path.as_path(), e))?;
            if n == 0 {
                return Ok(None);
            }
            records.push(record);
        }
        Ok(Some(records))
    }
}

impl Iterator for ReadSets {
    type Item = Result<Vec<fastq::Record>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.readers.is_empty() {
            return None;
        }
        match self.read_set() {
            Ok(Some(records)) => Some(Ok(records)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Length of the UMI in the header of the first record of `path`, 0 if
/// there is none or the file is empty.
pub fn peek_umi(path: &Path) -> Result<usize> {
    let mut reader = open_reader(path)?;
    let mut record = fastq::Record::default();
    let n = reader.read_record(&mut record).map_err(|e| HumidError::io(path, e))?;
    if n == 0 {
        return Ok(0);
    }
    let name: &[u8] = record.name().as_ref();
    Ok(extract_umi(name).len())
}

/// Word for a read set: UMI from the first read's name, then every sequence.
pub fn read_set_word(records: &[fastq::Record], layout: &WordLayout) -> Word {
    let header: &[u8] = match records.first() {
        Some(first) => first.name().as_ref(),
        None => b"",
    };
    let sequences: Vec<&[u8]> = records.iter().map(|r| r.sequence()).collect();
    make_word(header, &sequences, layout)
}

/// `<dir>/<stem>_<suffix><rest>`, splitting the input basename at its
/// first `.`.
///
/// Basenames that are missing or not valid UTF-8 are rejected rather than
/// rewritten.
pub fn output_name(input: &Path, dir: &Path, suffix: &str) -> Result<PathBuf> {
    let base = input.file_name().and_then(|n| n.to_str()).ok_or_else(|| {
        HumidError::invalid_parameter(
            "files",
            format!("'{}' has no UTF-8 file name to derive outputs from", input.display()),
        )
    })?;
    let name = match base.find('.') {
        Some(pos) => format!("{}_{}{}", &base[..pos], suffix, &base[pos..]),
        None => format!("{base}_{suffix}"),
    };
    Ok(dir.join(name))
}

/// Append `:<cluster id>` to the header line of `record`.
pub fn annotate(record: &mut fastq::Record, cluster: ClusterId) {
    let tag = format!(":{cluster}");
    if record.description().is_empty() {
        record.name_mut().extend_from_slice(tag.as_bytes());
    } else {
        record.description_mut().extend_from_slice(tag.as_bytes());
    }
}

/// Re-read `inputs` and call `f` for every read set with a usable word,
/// together with the leaf and cluster that word ended up in.
fn for_each_clustered<I, F>(
    inputs: &[PathBuf],
    layout: &WordLayout,
    index: &I,
    mut f: F,
) -> Result<()>
where
    I: SequenceIndex,
    F: FnMut(&mut [fastq::Record], LeafId, ClusterId) -> Result<()>,
{
    for result in ReadSets::open(inputs)? {
        let mut records = result?;
        let word = read_set_word(&records, layout);
        if word.filtered {
            continue;
        }
        let leaf = index.find(&word.data).ok_or_else(|| {
            HumidError::InvariantViolation("read set word missing from the index".to_string())
        })?;
        let cluster = index.leaves()[leaf].cluster.ok_or_else(|| {
            HumidError::InvariantViolation(format!("leaf {leaf} has no cluster"))
        })?;
        f(&mut records, leaf, cluster)?;
    }
    Ok(())
}

fn write_set(writers: &mut [(PathBuf, FastqWriter)], records: &[fastq::Record]) -> Result<()> {
    for ((path, writer), record) in writers.iter_mut().zip(records) {
        writer.write_record(record).map_err(|e| HumidError::io(path.as_path(), e))?;
    }
    Ok(())
}

fn open_writers(inputs: &[PathBuf], dir: &Path, suffix: &str) -> Result<Vec<(PathBuf, FastqWriter)>> {
    inputs
        .iter()
        .map(|input| {
            let path = output_name(input, dir, suffix)?;
            create_writer(&path).map(|w| (path, w))
        })
        .collect()
}

fn finish_writers(writers: &mut [(PathBuf, FastqWriter)]) -> Result<()> {
    for (path, writer) in writers {
        writer.get_mut().finish().map_err(|e| HumidError::io(path.as_path(), e))?;
    }
    Ok(())
}

/// Write one read set per cluster: the first one whose word is the
/// cluster's representative.
///
/// Returns the number of read sets written.
pub fn write_filtered<I: SequenceIndex>(
    inputs: &[PathBuf],
    dir: &Path,
    layout: &WordLayout,
    index: &I,
    clusters: &[Cluster],
) -> Result<usize> {
    let mut writers = open_writers(inputs, dir, FILTERED_SUFFIX)?;
    let mut emitted = RoaringBitmap::new();

    for_each_clustered(inputs, layout, index, |records, leaf, cluster| {
        let key = u32::try_from(cluster).map_err(|_| {
            HumidError::InvariantViolation(format!("cluster id {cluster} does not fit in 32 bits"))
        })?;
        if clusters[cluster].max_leaf == Some(leaf) && !emitted.contains(key) {
            write_set(&mut writers, records)?;
            emitted.insert(key);
        }
        Ok(())
    })?;

    finish_writers(&mut writers)?;
    Ok(emitted.len() as usize)
}

/// Write every usable read set with its cluster id appended to each header.
///
/// Returns the number of read sets written.
pub fn write_annotated<I: SequenceIndex>(
    inputs: &[PathBuf],
    dir: &Path,
    layout: &WordLayout,
    index: &I,
) -> Result<usize> {
    let mut writers = open_writers(inputs, dir, ANNOTATED_SUFFIX)?;
    let mut written = 0;

    for_each_clustered(inputs, layout, index, |records, _, cluster| {
        for record in records.iter_mut() {
            annotate(record, cluster);
        }
        write_set(&mut writers, records)?;
        written += 1;
        Ok(())
    })?;

    finish_writers(&mut writers)?;
    Ok(written)
}
