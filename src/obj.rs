//! Reading and writing LC-4 object files.
//!
//! An object file is a stream of blocks, each beginning with a 16-bit tag.
//! All words are big-endian.
//!
//! | Tag     | Block                | Payload                                   |
//! |---------|----------------------|-------------------------------------------|
//! | `xCADE` | [`Block::Code`]      | address, word count, words                |
//! | `xDADA` | [`Block::Data`]      | address, word count, words                |
//! | `xC3B7` | [`Block::Symbol`]    | address, name length, name (bytes)        |
//! | `xF17E` | [`Block::FileName`]  | name length, name (bytes)                 |
//! | `x715E` | [`Block::Line`]      | address, line, file index                 |
//!
//! The stream ends at EOF, which must fall on a block boundary.
//!
//! [`BlockReader`] reads blocks one at a time (this is what the simulator loads from,
//! so that a corrupt block leaves everything before it loaded).
//! [`ObjectFile`] holds a whole file in memory and can serialize it back into bytes.
use std::borrow::Cow;
use std::path::PathBuf;

/// Tag of a code block.
pub const CODE_TAG: u16 = 0xCADE;
/// Tag of a data block.
pub const DATA_TAG: u16 = 0xDADA;
/// Tag of a symbol block.
pub const SYMBOL_TAG: u16 = 0xC3B7;
/// Tag of a file name block.
pub const FILE_TAG: u16 = 0xF17E;
/// Tag of a line number block.
pub const LINE_TAG: u16 = 0x715E;

/// One block of an object file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// Instruction words to place in memory starting at `addr`.
    Code {
        /// Address of the first word.
        addr: u16,
        /// The words.
        words: Vec<u16>
    },
    /// Data words to place in memory starting at `addr`.
    ///
    /// These are loaded the same way as [`Block::Code`].
    Data {
        /// Address of the first word.
        addr: u16,
        /// The words.
        words: Vec<u16>
    },
    /// A label bound to an address.
    Symbol {
        /// The labelled address.
        addr: u16,
        /// The label.
        name: String
    },
    /// The name of a source file.
    FileName(String),
    /// A source line associated with an address.
    Line {
        /// The address.
        addr: u16,
        /// The line number in the source file.
        line: u16,
        /// Index of the source file (in the order of [`Block::FileName`] blocks).
        file_index: u16
    },
}
impl Block {
    /// The kind of this block.
    pub fn kind(&self) -> BlockKind {
        match self {
            Block::Code { .. }   => BlockKind::Code,
            Block::Data { .. }   => BlockKind::Data,
            Block::Symbol { .. } => BlockKind::Symbol,
            Block::FileName(_)   => BlockKind::FileName,
            Block::Line { .. }   => BlockKind::Line,
        }
    }

    fn write_bytes(&self, bytes: &mut Vec<u8>) {
        fn push_word(bytes: &mut Vec<u8>, word: u16) {
            bytes.extend(u16::to_be_bytes(word));
        }
        fn push_str(bytes: &mut Vec<u8>, s: &str) {
            let s = &s.as_bytes()[..s.len().min(usize::from(u16::MAX))];
            push_word(bytes, s.len() as u16);
            bytes.extend_from_slice(s);
        }

        push_word(bytes, self.kind().tag());
        match self {
            Block::Code { addr, words } | Block::Data { addr, words } => {
                let words = &words[..words.len().min(usize::from(u16::MAX))];
                push_word(bytes, *addr);
                push_word(bytes, words.len() as u16);
                for &w in words {
                    push_word(bytes, w);
                }
            },
            Block::Symbol { addr, name } => {
                push_word(bytes, *addr);
                push_str(bytes, name);
            },
            Block::FileName(name) => push_str(bytes, name),
            Block::Line { addr, line, file_index } => {
                push_word(bytes, *addr);
                push_word(bytes, *line);
                push_word(bytes, *file_index);
            },
        }
    }
}

/// The kinds of blocks.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum BlockKind {
    #[allow(missing_docs)]
    Code,
    #[allow(missing_docs)]
    Data,
    #[allow(missing_docs)]
    Symbol,
    #[allow(missing_docs)]
    FileName,
    #[allow(missing_docs)]
    Line,
}
impl BlockKind {
    /// The tag word that starts blocks of this kind.
    pub fn tag(self) -> u16 {
        match self {
            BlockKind::Code     => CODE_TAG,
            BlockKind::Data     => DATA_TAG,
            BlockKind::Symbol   => SYMBOL_TAG,
            BlockKind::FileName => FILE_TAG,
            BlockKind::Line     => LINE_TAG,
        }
    }

    /// Gets the kind of block a tag word starts, if it is a known tag.
    pub fn from_tag(tag: u16) -> Option<Self> {
        match tag {
            CODE_TAG   => Some(BlockKind::Code),
            DATA_TAG   => Some(BlockKind::Data),
            SYMBOL_TAG => Some(BlockKind::Symbol),
            FILE_TAG   => Some(BlockKind::FileName),
            LINE_TAG   => Some(BlockKind::Line),
            _ => None
        }
    }
}
impl std::fmt::Display for BlockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BlockKind::Code     => "code",
            BlockKind::Data     => "data",
            BlockKind::Symbol   => "symbol",
            BlockKind::FileName => "file name",
            BlockKind::Line     => "line number",
        };
        f.write_str(name)
    }
}

/// Errors that can occur while loading an object file.
#[derive(Debug, thiserror::Error)]
pub enum LoadErr {
    /// A block started with a tag that is not a known block tag.
    #[error("invalid file format: unknown block tag x{tag:04X} at byte {offset}")]
    UnknownTag {
        /// The tag.
        tag: u16,
        /// Byte offset of the tag in the file.
        offset: usize
    },
    /// The file ended in the middle of a block.
    #[error("{kind} block at byte {offset} is truncated")]
    Truncated {
        /// The kind of the truncated block.
        kind: BlockKind,
        /// Byte offset of the block's tag in the file.
        offset: usize,
        /// The complete words of a truncated code or data block,
        /// read before the file ended.
        partial: Option<Block>
    },
    /// The file ended in the middle of a tag word.
    #[error("file ends with a partial word at byte {offset}")]
    TrailingByte {
        /// Byte offset of the trailing byte.
        offset: usize
    },
    /// The file could not be read.
    #[error("could not read {}: {source}", .path.display())]
    Io {
        /// The path that was being read.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error
    },
}
impl crate::err::Error for LoadErr {
    fn help(&self) -> Option<Cow<str>> {
        match self {
            LoadErr::UnknownTag { .. } => Some(Cow::from("valid tags are xCADE, xDADA, xC3B7, xF17E, and x715E; is this an LC-4 object file?")),
            LoadErr::Truncated { .. } | LoadErr::TrailingByte { .. } => Some(Cow::from("everything read before this point was loaded; the file may be incomplete")),
            LoadErr::Io { .. } => None,
        }
    }
}

/// Reads blocks out of object file bytes, one at a time.
///
/// After the first error, the reader yields nothing.
///
/// ```
/// use lc4_sim::obj::{Block, BlockReader};
///
/// let bytes = [0xCA, 0xDE, 0x00, 0x10, 0x00, 0x01, 0x92, 0x05];
/// let blocks: Vec<_> = BlockReader::new(&bytes).collect::<Result<_, _>>().unwrap();
/// assert_eq!(blocks, [Block::Code { addr: 0x0010, words: vec![0x9205] }]);
/// ```
#[derive(Debug, Clone)]
pub struct BlockReader<'a> {
    data: &'a [u8],
    offset: usize,
    failed: bool,
}
impl<'a> BlockReader<'a> {
    /// Creates a reader over the given bytes.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0, failed: false }
    }

    fn read_block(&mut self) -> Result<Option<Block>, LoadErr> {
        let start = self.offset;
        let mut rest = self.data;

        if rest.is_empty() { return Ok(None) };
        let tag = take_word(&mut rest).ok_or(LoadErr::TrailingByte { offset: start })?;
        let kind = BlockKind::from_tag(tag).ok_or(LoadErr::UnknownTag { tag, offset: start })?;

        let block = read_payload(kind, &mut rest)
            .map_err(|partial| LoadErr::Truncated { kind, offset: start, partial })?;

        self.offset += self.data.len() - rest.len();
        self.data = rest;
        Ok(Some(block))
    }
}
impl Iterator for BlockReader<'_> {
    type Item = Result<Block, LoadErr>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed { return None };

        let result = self.read_block();
        self.failed = result.is_err();
        result.transpose()
    }
}

/// Reads the payload of a block.
///
/// On truncation, this returns the part of a code or data block
/// whose words were read in full (if its header was complete).
fn read_payload(kind: BlockKind, rest: &mut &[u8]) -> Result<Block, Option<Block>> {
    let block = match kind {
        BlockKind::Code | BlockKind::Data => {
            let addr  = take_word(rest).ok_or(None)?;
            let count = take_word(rest).ok_or(None)?;
            let memory_block = |words: Vec<u16>| match kind {
                BlockKind::Code => Block::Code { addr, words },
                _ => Block::Data { addr, words },
            };

            match take_slice(rest, 2 * usize::from(count)) {
                Some(bytes) => memory_block(words_of(bytes)),
                None => return Err(Some(memory_block(words_of(*rest)))),
            }
        },
        BlockKind::Symbol => {
            let addr = take_word(rest).ok_or(None)?;
            let name = take_str(rest).ok_or(None)?;
            Block::Symbol { addr, name }
        },
        BlockKind::FileName => Block::FileName(take_str(rest).ok_or(None)?),
        BlockKind::Line => {
            let addr       = take_word(rest).ok_or(None)?;
            let line       = take_word(rest).ok_or(None)?;
            let file_index = take_word(rest).ok_or(None)?;
            Block::Line { addr, line, file_index }
        },
    };

    Ok(block)
}

/// Big-endian words of `bytes`, ignoring a trailing odd byte.
fn words_of(bytes: &[u8]) -> Vec<u16> {
    bytes.chunks_exact(2)
        .map(|c| u16::from_be_bytes([c[0], c[1]]))
        .collect()
}

fn take_word(data: &mut &[u8]) -> Option<u16> {
    take::<2>(data).map(u16::from_be_bytes)
}
fn take_str(data: &mut &[u8]) -> Option<String> {
    let len = take_word(data)?;
    let bytes = take_slice(data, usize::from(len))?;
    Some(String::from_utf8_lossy(bytes).into_owned())
}
fn take<const N: usize>(data: &mut &[u8]) -> Option<[u8; N]> {
    take_slice(data, N)
        .and_then(|slice| <[_; N]>::try_from(slice).ok())
}
fn take_slice<'a>(data: &mut &'a [u8], n: usize) -> Option<&'a [u8]> {
    let (left, right) = try_split_at(data, n)?;
    *data = right;
    Some(left)
}
fn try_split_at(data: &[u8], n: usize) -> Option<(&[u8], &[u8])> {
    if n > data.len() { return None; }
    Some(data.split_at(n))
}

/// A parsed object file.
///
/// Blocks are kept in file order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ObjectFile {
    blocks: Vec<Block>
}
impl ObjectFile {
    /// Creates an empty object file.
    pub fn new() -> Self {
        Self { blocks: vec![] }
    }

    /// Appends a block.
    pub fn push(&mut self, block: Block) {
        self.blocks.push(block);
    }

    /// Parses an entire object file.
    ///
    /// Unlike loading into the simulator, this does not keep a partial result on error.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LoadErr> {
        let blocks = BlockReader::new(bytes).collect::<Result<_, _>>()?;
        Ok(Self { blocks })
    }

    /// Reads and parses the object file at `path`.
    pub fn read(path: impl Into<PathBuf>) -> Result<Self, LoadErr> {
        let path = path.into();
        let bytes = std::fs::read(&path).map_err(|source| LoadErr::Io { path, source })?;
        Self::from_bytes(&bytes)
    }

    /// Serializes this object file.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![];
        for block in &self.blocks {
            block.write_bytes(&mut bytes);
        }
        bytes
    }

    /// All blocks, in file order.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// The labels defined by symbol blocks.
    pub fn symbols(&self) -> impl Iterator<Item = (&str, u16)> + '_ {
        self.blocks.iter().filter_map(|b| match b {
            Block::Symbol { addr, name } => Some((name.as_str(), *addr)),
            _ => None
        })
    }

    /// The source file names, in order (a line block's `file_index` points into this).
    pub fn files(&self) -> Vec<&str> {
        self.blocks.iter()
            .filter_map(|b| match b {
                Block::FileName(name) => Some(name.as_str()),
                _ => None
            })
            .collect()
    }

    /// The line number entries as `(addr, line, file_index)`.
    pub fn lines(&self) -> Vec<(u16, u16, u16)> {
        self.blocks.iter()
            .filter_map(|b| match *b {
                Block::Line { addr, line, file_index } => Some((addr, line, file_index)),
                _ => None
            })
            .collect()
    }
}
impl FromIterator<Block> for ObjectFile {
    fn from_iter<T: IntoIterator<Item = Block>>(iter: T) -> Self {
        Self { blocks: iter.into_iter().collect() }
    }
}

#[cfg(test)]
mod tests {
    use super::{Block, BlockKind, BlockReader, LoadErr, ObjectFile};

    fn sample() -> ObjectFile {
        ObjectFile::from_iter([
            Block::FileName("mult.asm".to_string()),
            Block::Code { addr: 0x0000, words: vec![0x9400, 0x2300, 0x0C03] },
            Block::Symbol { addr: 0x0000, name: "MAIN".to_string() },
            Block::Line { addr: 0x0000, line: 4, file_index: 0 },
            Block::Data { addr: 0x4000, words: vec![0x0001, 0xFFFF] },
        ])
    }

    #[test]
    fn parse_code_block_bytes() {
        let bytes = [
            0xCA, 0xDE, // code
            0x00, 0x00, // addr
            0x00, 0x03, // count
            0x94, 0x00, 0x23, 0x00, 0x0C, 0x03,
        ];
        let obj = ObjectFile::from_bytes(&bytes).unwrap();
        assert_eq!(obj.blocks(), [Block::Code { addr: 0x0000, words: vec![0x9400, 0x2300, 0x0C03] }]);
        assert_eq!(obj.to_bytes(), bytes);
    }

    #[test]
    fn metadata_accessors() {
        let obj = ObjectFile::from_bytes(&sample().to_bytes()).unwrap();
        assert_eq!(obj, sample());
        assert_eq!(obj.files(), ["mult.asm"]);
        assert_eq!(obj.lines(), [(0x0000, 4, 0)]);
        assert_eq!(obj.symbols().collect::<Vec<_>>(), [("MAIN", 0x0000)]);
    }

    #[test]
    fn empty_file() {
        assert_eq!(ObjectFile::from_bytes(&[]).unwrap(), ObjectFile::new());
    }

    #[test]
    fn unknown_tag() {
        let mut bytes = sample().to_bytes();
        let offset = bytes.len();
        bytes.extend([0xBE, 0xEF, 0x00, 0x00]);

        let mut reader = BlockReader::new(&bytes);
        assert_eq!(reader.by_ref().take(5).filter(Result::is_ok).count(), 5);
        match reader.next() {
            Some(Err(LoadErr::UnknownTag { tag: 0xBEEF, offset: o })) => assert_eq!(o, offset),
            r => panic!("expected unknown tag, got {r:?}"),
        }
        assert!(reader.next().is_none());
    }

    #[test]
    fn truncated_block() {
        let bytes = sample().to_bytes();
        // cut the last data word in half
        let cut = &bytes[..bytes.len() - 1];

        let results: Vec<_> = BlockReader::new(cut).collect();
        assert_eq!(results.len(), 5);
        assert!(results[..4].iter().all(Result::is_ok));
        assert!(matches!(results[4], Err(LoadErr::Truncated { kind: BlockKind::Data, .. })));

        assert!(ObjectFile::from_bytes(cut).is_err());
    }

    #[test]
    fn truncated_block_keeps_whole_words() {
        let bytes = [0xCA, 0xDE, 0x00, 0x00, 0x00, 0x03, 0x94, 0x00, 0x23, 0x00, 0x0C];
        match BlockReader::new(&bytes).next() {
            Some(Err(LoadErr::Truncated { kind: BlockKind::Code, offset: 0, partial })) => {
                assert_eq!(partial, Some(Block::Code { addr: 0x0000, words: vec![0x9400, 0x2300] }));
            },
            r => panic!("expected truncated block, got {r:?}"),
        }

        // header cut short: nothing to keep
        let bytes = [0xDA, 0xDA, 0x20, 0x00, 0x00];
        assert!(matches!(
            BlockReader::new(&bytes).next(),
            Some(Err(LoadErr::Truncated { kind: BlockKind::Data, partial: None, .. }))
        ));
    }

    #[test]
    fn trailing_byte() {
        let bytes = [0xF1, 0x7E, 0x00, 0x00, 0xCA];
        let results: Vec<_> = BlockReader::new(&bytes).collect();
        assert!(matches!(results[..], [Ok(Block::FileName(_)), Err(LoadErr::TrailingByte { offset: 4 })]));
    }

    #[test]
    fn lossy_symbol_names() {
        let bytes = [0xC3, 0xB7, 0x20, 0x00, 0x00, 0x02, b'A', 0xFF];
        let obj = ObjectFile::from_bytes(&bytes).unwrap();
        assert_eq!(obj.symbols().collect::<Vec<_>>(), [("A\u{FFFD}", 0x2000)]);
    }
}
