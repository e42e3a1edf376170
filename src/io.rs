//! Loading graphs and seed labels from delimited text, and streaming labels back out.  Any path
//! ending in `.gz` is transparently (de)compressed.
use std::borrow::Borrow;
use std::fs::File;
use std::io::{Write,BufWriter,Result as IOResult,BufReader,BufRead};

use fast_float::parse;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use hashbrown::HashMap;
use itertools::Itertools;
use rayon::prelude::*;
use ryu::Buffer;

use crate::alphabet::Alphabet;
use crate::error::{Error, Result};
use crate::graph::{Edge, NodeID, WeightedGraph};
use crate::labels::{LabelFactory, LabelVector, NormType};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EdgeType {
    Directed,
    Undirected
}

/// Parses lines in parallel chunks while handing the parsed records to `drain` in file order.
pub struct RecordReader {
    chunk_size: usize,
    skip: usize
}

impl RecordReader {
    pub fn new(chunk_size: usize, skip: usize) -> Self {
        RecordReader { chunk_size, skip }
    }

    /// `mapper` and `drain` both see 1-based line numbers, counting skipped rows.  Records the
    /// mapper returns `None` for are dropped.
    pub fn read<F,D,A,E>(
        &self,
        mut it: impl Iterator<Item=IOResult<String>>,
        mapper: F,
        mut drain: D
    ) -> std::result::Result<(),E>
        where F: Fn(usize, String) -> Option<A> + Sync,
              A: Send,
              D: FnMut(usize, A) -> std::result::Result<(),E>,
              E: From<std::io::Error>
    {
        // Skip records, such as headers of tsvs
        for line in (&mut it).take(self.skip) {
            line?;
        }

        let mut i = self.skip + 1;
        if self.chunk_size <= 1 {
            for line in it {
                if let Some(record) = mapper(i, line?) {
                    drain(i, record)?
                }
                i += 1;
            }
        } else {
            let mut buffer = Vec::with_capacity(self.chunk_size);
            let mut p_buffer = Vec::with_capacity(self.chunk_size);
            for chunk in &it.chunks(self.chunk_size) {
                buffer.clear();

                // Read lines into a buffer for parallelizing
                for line in chunk {
                    buffer.push(line?);
                }

                buffer.par_drain(..).enumerate().map(|(idx, line)| {
                    mapper(i+idx, line)
                }).collect_into_vec(&mut p_buffer);

                for r in p_buffer.drain(..) {
                    if let Some(record) = r {
                        drain(i, record)?;
                    }
                    i += 1;
                }
            }
        }
        Ok(())
    }
}

pub fn open_file_for_reading(path: &str) -> IOResult<Box<dyn BufRead>> {
    let f = File::open(path)?;

    let f = BufReader::new(f);
    let result: Box<dyn BufRead> = if path.ends_with(".gz") {
        let decoder = BufReader::new(GzDecoder::new(f));
        Box::new(decoder)
    } else {
        Box::new(f)
    };
    Ok(result)
}

pub fn open_file_for_writing(path: &str, compression: Option<u32>) -> IOResult<Box<dyn Write>> {
    let comp_level = compression.map(|l| Compression::new(l));
    let f = File::create(path)?;
    let bw = BufWriter::new(f);
    let encoder: Box<dyn Write> = if path.ends_with(".gz") {
        let e = GzEncoder::new(bw, comp_level.unwrap_or(Compression::fast()));
        Box::new(e)
    } else {
        Box::new(bw)
    };
    Ok(encoder)
}

fn split_fields(line: &str) -> Option<Vec<&str>> {
    let line = line.trim_end_matches(|c| c == '\r' || c == '\n');
    if line.trim().is_empty() {
        None
    } else {
        Some(line.split('\t').collect())
    }
}

fn parse_node(line: usize, field: &str) -> Result<NodeID> {
    field.trim().parse::<NodeID>()
        .map_err(|e| Error::Malformed { line, reason: format!("bad node id {:?}: {}", field, e) })
}

fn parse_weight(line: usize, field: &str) -> Result<f64> {
    let w: f64 = parse(field.trim())
        .map_err(|_| Error::Malformed { line, reason: format!("bad weight {:?}", field) })?;
    if w > 0. && w.is_finite() {
        Ok(w)
    } else {
        Err(Error::Malformed { line, reason: format!("weight must be positive, got {}", w) })
    }
}

pub struct GraphReader;

impl GraphReader {

    /// Reads `source\ttarget[\tweight]` lines; missing weights default to 1.  Undirected files
    /// add every edge in both directions.  Parallel edges are kept.
    pub fn load(
        path: &str,
        edge_type: EdgeType,
        chunk_size: usize,
        skip_rows: usize
    ) -> Result<WeightedGraph> {
        let reader = open_file_for_reading(path)?.lines();

        let mut edges = Vec::new();
        let rr = RecordReader::new(chunk_size, skip_rows);
        rr.read(reader,
            |i, line| {
                let pieces = split_fields(&line)?;
                if pieces.len() != 2 && pieces.len() != 3 {
                    return Some(Err(Error::Malformed {
                        line: i,
                        reason: format!("expected 2 or 3 fields, found {}", pieces.len())
                    }))
                }
                let parsed = parse_node(i, pieces[0]).and_then(|from_node| {
                    let to_node = parse_node(i, pieces[1])?;
                    let w = match pieces.get(2) {
                        Some(w) => parse_weight(i, w)?,
                        None => 1.
                    };
                    Ok(Edge::new(from_node, to_node, w))
                });
                Some(parsed)
            },
            |_i, record| {
                let edge = record?;
                edges.push(edge);
                if edge_type == EdgeType::Undirected && edge.source != edge.target {
                    edges.push(Edge::new(edge.target, edge.source, edge.weight));
                }
                Ok::<(), Error>(())
            })?;

        WeightedGraph::construct_from_edges(edges)
    }
}

pub struct SeedReader;

impl SeedReader {

    /// Reads `node\tclass[\tweight]` lines.  Class tokens are resolved through `alphabet`, which
    /// is sealed once the file is read and backs the returned factory.  A node may be listed
    /// several times; its weights are summed per class and normalized to unit mass.
    pub fn load(
        path: &str,
        alphabet: &mut Alphabet,
        chunk_size: usize,
        skip_rows: usize
    ) -> Result<(LabelFactory, Vec<(NodeID, LabelVector)>)> {
        let reader = open_file_for_reading(path)?.lines();

        let mut index: HashMap<NodeID, usize> = HashMap::new();
        let mut masses: Vec<(NodeID, Vec<(i64, f64)>)> = Vec::new();
        let rr = RecordReader::new(chunk_size, skip_rows);
        rr.read(reader,
            |i, line| {
                let pieces = split_fields(&line)?;
                if pieces.len() != 2 && pieces.len() != 3 {
                    return Some(Err(Error::Malformed {
                        line: i,
                        reason: format!("expected 2 or 3 fields, found {}", pieces.len())
                    }))
                }
                let parsed = parse_node(i, pieces[0]).and_then(|node| {
                    let w = match pieces.get(2) {
                        Some(w) => parse_weight(i, w)?,
                        None => 1.
                    };
                    Ok((node, pieces[1].trim().to_string(), w))
                });
                Some(parsed)
            },
            |_i, record| {
                let (node, token, w) = record?;
                let class = alphabet.get(&token)?;
                let idx = *index.entry(node).or_insert_with(|| {
                    masses.push((node, Vec::new()));
                    masses.len() - 1
                });
                masses[idx].1.push((class, w));
                Ok::<(), Error>(())
            })?;

        alphabet.seal();
        let factory = LabelFactory::from_alphabet(alphabet.clone())?;

        let mut seeds = Vec::with_capacity(masses.len());
        for (node, entries) in masses.into_iter() {
            let mut classes = vec![0.; factory.num_classes()];
            for (class, w) in entries.into_iter() {
                let slot = classes.get_mut(class as usize).ok_or_else(|| {
                    Error::InvalidParameter(format!("class id {} outside of the alphabet", class))
                })?;
                *slot += w;
            }
            let label = factory.create(classes)?
                .normalize(NormType::Manhattan)
                .ok_or_else(|| Error::InvalidParameter(format!("seed {} has no label mass", node)))?;
            seeds.push((node, label));
        }

        Ok((factory, seeds))
    }
}

/// Streaming writer for labels: `node\t[v0,v1,...]\tclass`, where class is the token of the
/// heaviest class (its index without an alphabet) or `null` when there is no mass.
pub struct LabelWriter<'a> {
    alphabet: Option<&'a Alphabet>,
    output: Box<dyn Write>,
    buffer: String
}

impl <'a> LabelWriter<'a> {

    pub fn new(path: &str, alphabet: Option<&'a Alphabet>, comp_level: Option<u32>) -> Result<Self> {
        let encoder = open_file_for_writing(path, comp_level)?;
        Ok(LabelWriter {
            alphabet,
            output: encoder,
            buffer: String::new()
        })
    }

    pub fn stream<L: Borrow<LabelVector>>(
        &mut self,
        it: impl Iterator<Item=(NodeID, L)>
    ) -> Result<()> {

        let mut formatter = Buffer::new();

        for (node_id, label) in it {
            let label = label.borrow();
            self.buffer.clear();
            LabelWriter::format_label(&mut formatter, &mut self.buffer, label.as_slice());

            let class = match (label.argmax(), self.alphabet) {
                (Some(idx), Some(alphabet)) => alphabet.get_token(idx as i64)
                    .unwrap_or("null")
                    .to_string(),
                (Some(idx), None) => idx.to_string(),
                (None, _) => "null".to_string()
            };

            writeln!(&mut self.output, "{}\t[{}]\t{}", node_id, self.buffer, class)?
        }

        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        self.output.flush()?;
        Ok(())
    }

    fn format_label(buff: &mut Buffer, output: &mut String, label: &[f64]) {
        for (idx, wi) in label.iter().enumerate() {
            if idx > 0 {
                output.push_str(",");
            }
            output.push_str(buff.format(*wi));
        }
    }
}

#[cfg(test)]
mod io_tests {
    use super::*;
    use std::fs;
    use std::io::Read;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("adsorption-io-{}-{}", std::process::id(), name))
    }

    fn write_file(name: &str, contents: &str) -> String {
        let path = temp_path(name);
        let p = path.to_str().unwrap().to_string();
        let mut out = open_file_for_writing(&p, None).unwrap();
        out.write_all(contents.as_bytes()).unwrap();
        out.flush().unwrap();
        p
    }

    #[test]
    fn test_record_reader_order() {
        let lines = (0..103).map(|i| Ok::<String, std::io::Error>(format!("{}", i)));
        for chunk_size in [1, 4, 50] {
            let rr = RecordReader::new(chunk_size, 3);
            let mut seen = Vec::new();
            rr.read(lines.clone(),
                |i, line| if i % 2 == 0 { Some((i, line)) } else { None },
                |i, record| {
                    seen.push((i, record));
                    Ok::<(), Error>(())
                }).unwrap();

            // Line 4 is the first unskipped line and holds "3"
            assert_eq!(seen[0], (4, (4, "3".to_string())));
            assert_eq!(seen.len(), 50);
            assert!(seen.windows(2).all(|w| w[0].0 < w[1].0));
        }
    }

    #[test]
    fn test_load_graph() {
        let path = write_file("graph.tsv", "src\tdst\tw\n1\t2\t0.5\n2\t3\n\n1\t2\t1e-1\n");
        let graph = GraphReader::load(&path, EdgeType::Directed, 2, 1).unwrap();
        assert_eq!(graph.edges(), 3);
        assert_eq!(graph.get_edges(1), (&[2, 2][..], &[0.5, 0.1][..]));
        assert_eq!(graph.get_edges(2), (&[3][..], &[1.][..]));

        let graph = GraphReader::load(&path, EdgeType::Undirected, 1, 1).unwrap();
        assert_eq!(graph.edges(), 6);
        assert_eq!(graph.get_edges(3), (&[2][..], &[1.][..]));
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_load_gzip_graph() {
        let path = temp_path("graph.tsv.gz").to_str().unwrap().to_string();
        {
            let mut out = open_file_for_writing(&path, Some(6)).unwrap();
            out.write_all(b"4\t1\t2\n5\t2\n").unwrap();
        }
        let graph = GraphReader::load(&path, EdgeType::Directed, 10, 0).unwrap();
        assert_eq!(graph.edges(), 2);
        assert_eq!(graph.get_edges(4), (&[1][..], &[2.][..]));
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_malformed_graph() {
        let path = write_file("bad_graph.tsv", "1\t2\n2\t3\t-1\n");
        let res = GraphReader::load(&path, EdgeType::Directed, 1, 0);
        assert!(matches!(res, Err(Error::Malformed { line: 2, .. })));

        let path2 = write_file("bad_graph2.tsv", "1\t2\n2\tthree\n");
        let res = GraphReader::load(&path2, EdgeType::Directed, 8, 0);
        assert!(matches!(res, Err(Error::Malformed { line: 2, .. })));

        let path3 = write_file("bad_graph3.tsv", "1\n");
        let res = GraphReader::load(&path3, EdgeType::Directed, 8, 0);
        assert!(matches!(res, Err(Error::Malformed { line: 1, .. })));

        assert!(matches!(GraphReader::load("/does/not/exist", EdgeType::Directed, 1, 0), Err(Error::Io(_))));
        for p in [path, path2, path3] {
            fs::remove_file(p).unwrap();
        }
    }

    #[test]
    fn test_load_seeds() {
        let path = write_file("seeds.tsv", "1\tpos\n2\tneg\t3\n2\tpos\n1\tpos\t2\n");
        let mut alphabet = Alphabet::new();
        let (factory, seeds) = SeedReader::load(&path, &mut alphabet, 1, 0).unwrap();

        assert!(alphabet.is_sealed());
        assert_eq!(factory.num_classes(), 2);
        assert_eq!(alphabet.get_id("pos"), Some(0));
        assert_eq!(seeds, vec![
            (1, LabelVector::new(vec![1., 0.])),
            (2, LabelVector::new(vec![0.25, 0.75])),
        ]);
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_seeds_sealed_alphabet() {
        let path = write_file("seeds_sealed.tsv", "1\tpos\n2\tmaybe\n");
        let mut alphabet = Alphabet::from_tokens(&["neg", "pos"]).unwrap();
        let res = SeedReader::load(&path, &mut alphabet, 1, 0);
        assert!(matches!(res, Err(Error::AlphabetSealed(_))));
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_label_writer() {
        let alphabet = Alphabet::from_tokens(&["neg", "pos"]).unwrap();
        let path = temp_path("labels.tsv").to_str().unwrap().to_string();
        let labels = vec![
            (3, LabelVector::new(vec![0.25, 0.75])),
            (7, LabelVector::zeros(2)),
        ];

        let mut writer = LabelWriter::new(&path, Some(&alphabet), None).unwrap();
        writer.stream(labels.iter().map(|(n, l)| (*n, l))).unwrap();
        writer.finish().unwrap();

        let mut contents = String::new();
        open_file_for_reading(&path).unwrap().read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "3\t[0.25,0.75]\tpos\n7\t[0.0,0.0]\tnull\n");

        let mut writer = LabelWriter::new(&path, None, None).unwrap();
        writer.stream(labels.into_iter().take(1)).unwrap();
        writer.finish().unwrap();

        let mut contents = String::new();
        open_file_for_reading(&path).unwrap().read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "3\t[0.25,0.75]\t1\n");
        fs::remove_file(path).unwrap();
    }
}
