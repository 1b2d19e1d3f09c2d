//! word2vec vector files.
//!
//! Text: a `<count> <dim>` header line, then `<key> <v1> ... <vdim>` per entry.
//! Binary: the same header line, then per entry the key, a space, `dim` little-endian
//! `f32`s and a newline (the layout of the original word2vec tool).
//! Files without a header line (GloVe) are read as text with the dimension of the first row.

use crate::config::files_handling::{self, write_atomically};
use crate::errors::{Error, Result};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::info;
use ndarray::{Array2, ArrayBase, ArrayView1, Data, Ix1};
use std::fs::File;
use std::io::{self, BufRead, BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

fn malformed(file_path: &Path, line: usize, reason: String) -> Error {
    Error::MalformedVectors { path: file_path.to_path_buf(), line, reason }
}

fn parse_header(line: &str) -> Option<(usize, usize)> {
    let mut fields = line.split_whitespace();
    match (fields.next(), fields.next(), fields.next()) {
        (Some(n), Some(dim), None) => Some((n.parse().ok()?, dim.parse().ok()?)),
        _ => None,
    }
}

pub fn read_text(file_path: &Path) -> Result<(Vec<String>, Array2<f32>)> {

    let mut keys: Vec<String> = Vec::new();
    let mut data: Vec<f32> = Vec::new();
    let mut dimension: Option<usize> = None;
    let mut expected: Option<usize> = None;

    for (n, line) in files_handling::read_lines(file_path)?.enumerate() {
        let line = line?;
        let line = line.trim_end();
        if n == 0 {
            if let Some((count, dim)) = parse_header(line) {
                expected = Some(count);
                dimension = Some(dim);
                continue;
            }
        }
        if line.is_empty() {
            continue;
        }

        // the key is everything before the last `dim` fields
        let fields: Vec<&str> = line.split(' ').collect();
        let dim = *dimension.get_or_insert(fields.len().saturating_sub(1));
        if dim == 0 || fields.len() < dim + 1 {
            return Err(malformed(file_path, n + 1, format!("expected a key and {} components", dim)));
        }
        let split = fields.len() - dim;
        for field in &fields[split..] {
            let value = field.parse::<f32>()
                .map_err(|e| malformed(file_path, n + 1, format!("{}: {}", field, e)))?;
            data.push(value);
        }
        keys.push(fields[..split].join(" "));
    }

    if let Some(count) = expected {
        if count != keys.len() {
            return Err(malformed(file_path, 1, format!("header announces {} entries, found {}", count, keys.len())));
        }
    }

    let dim = dimension.unwrap_or(0);
    let vectors = Array2::from_shape_vec((keys.len(), dim), data)
        .map_err(|e| malformed(file_path, 1, e.to_string()))?;
    Ok((keys, vectors))
}

pub fn read_binary(file_path: &Path) -> Result<(Vec<String>, Array2<f32>)> {

    let mut reader = files_handling::open_reader(file_path)?;
    let mut header = String::new();
    reader.read_line(&mut header)?;
    let (count, dim) = parse_header(&header)
        .ok_or_else(|| malformed(file_path, 1, format!("bad header {:?}", header.trim_end())))?;

    let mut keys: Vec<String> = Vec::with_capacity(count);
    let mut vectors: Array2<f32> = Array2::zeros((count, dim));
    let mut buf: Vec<u8> = Vec::new();
    let mut row: Vec<f32> = vec![0.0; dim];

    for i in 0..count {
        buf.clear();
        if reader.read_until(b' ', &mut buf)? == 0 {
            return Err(malformed(file_path, i + 2, format!("header announces {} entries, found {}", count, i)));
        }
        // the newline closing the previous vector is optional
        let start = buf.iter().position(|b| *b != b'\n' && *b != b'\r').unwrap_or(buf.len());
        let end = if buf.last() == Some(&b' ') { buf.len() - 1 } else { buf.len() };
        let key = std::str::from_utf8(&buf[start..end.max(start)])
            .map_err(|e| malformed(file_path, i + 2, e.to_string()))?;
        reader.read_f32_into::<LittleEndian>(&mut row)
            .map_err(|e| malformed(file_path, i + 2, format!("truncated vector for {}: {}", key, e)))?;
        vectors.row_mut(i).assign(&ArrayView1::from(&row[..]));
        keys.push(key.to_string());
    }

    Ok((keys, vectors))
}

/// Writes `entries` as a word2vec text file and returns the number of entries written.
///
/// The body is spilled to a temporary file first, the header is written once the count is known.
pub fn write_text<I, S>(file_path: &Path, dimension: usize, entries: I) -> Result<usize>
where
    I: IntoIterator<Item = (String, ArrayBase<S, Ix1>)>,
    S: Data<Elem = f32>,
{
    let parent_dir = match file_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent_dir)?;

    let mut body: File = tempfile::tempfile_in(parent_dir)?;
    let mut count = 0;
    {
        let mut writer = BufWriter::new(&mut body);
        for (key, vector) in entries {
            if vector.len() != dimension {
                return Err(Error::DimensionMismatch { key, expected: dimension, found: vector.len() });
            }
            writer.write_all(key.as_bytes())?;
            for v in vector.iter() {
                write!(writer, " {}", v)?;
            }
            writer.write_all(b"\n")?;
            count += 1;
        }
        writer.flush()?;
    }
    body.seek(SeekFrom::Start(0))?;

    write_atomically(file_path, |out| {
        writeln!(out, "{} {}", count, dimension)?;
        io::copy(&mut body, out)?;
        Ok(())
    })?;

    info!("wrote {} vectors of dimension {} to {}", count, dimension, file_path.display());
    Ok(count)
}

pub fn write_binary(file_path: &Path, keys: &[String], vectors: &Array2<f32>) -> Result<usize> {
    let (count, dim) = vectors.dim();
    if count != keys.len() {
        return Err(Error::DimensionMismatch { key: "<rows>".to_string(), expected: keys.len(), found: count });
    }
    write_atomically(file_path, |out| {
        writeln!(out, "{} {}", count, dim)?;
        for (key, row) in keys.iter().zip(vectors.rows()) {
            out.write_all(key.as_bytes())?;
            out.write_all(b" ")?;
            for v in row.iter() {
                out.write_f32::<LittleEndian>(*v)?;
            }
            out.write_all(b"\n")?;
        }
        Ok(())
    })?;
    Ok(count)
}

/// Reformats a text vector file into the packed binary layout, keeping the entry order.
pub fn text_to_binary(txt_path: &Path, bin_path: &Path) -> Result<usize> {
    let (keys, vectors) = read_text(txt_path)?;
    let count = write_binary(bin_path, &keys, &vectors)?;
    info!("new embeddings are available at {}", bin_path.display());
    Ok(count)
}
