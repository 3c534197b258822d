//! The outer container tree: a recursive, 24-byte-header-tagged structure
//! that wraps every project/scene/clip/thumbnail node. Tree-building never
//! reads payload bytes into memory — data leaves only record a byte range.

use crate::error::FormatError;

const HEADER_LEN: usize = 24;
const SIGNATURE_V1: [u8; 6] = [0x00, 0x0F, 0x1F, 0x02, 0x19, 0x1B];
const SIGNATURE_V2: [u8; 6] = [0x00, 0x10, 0x5A, 0xAF, 0xAA, 0xAB];

/// The closed set of node kinds drawn from the magic tag table, plus
/// [`Kind::Unknown`] for a tag absent from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Kind {
    Project,
    ProjectInfo,
    Thumbnail,
    ThumbnailInfo,
    ThumbnailData,
    SoundInfo,
    LabelInfo,
    Zeros,
    ObjectContainer,
    Object,
    ObjectInfo,
    Scene,
    SceneInfo,
    Clip,
    ClipInfo,
    ClipData,
    /// An unrecognized magic tag. Only ever produced at the root — an
    /// unrecognized child is skipped and never becomes a node at all (§4.4).
    Unknown,
}

impl Kind {
    /// Looks up `tag` in the fixed magic table, returning the kind and
    /// whether it is a container (has children) or a data leaf.
    fn from_tag(tag: [u8; 4]) -> Option<(Kind, bool)> {
        Some(match tag {
            [0x33, 0x84, 0x78, 0x0E] => (Kind::Project, true),
            [0x33, 0x85, 0x55, 0x3A] => (Kind::ProjectInfo, false),
            [0x33, 0x8C, 0x4E, 0xE4] => (Kind::Thumbnail, true),
            [0x33, 0x8A, 0x96, 0x08] => (Kind::ThumbnailInfo, false),
            [0x33, 0x8B, 0x71, 0x54] => (Kind::ThumbnailData, false),
            [0x04, 0x56, 0x69, 0x28] => (Kind::SoundInfo, false),
            [0x33, 0x8E, 0x0A, 0xEA] => (Kind::LabelInfo, false),
            [0x33, 0xFB, 0x9B, 0xE6] => (Kind::Zeros, false),
            [0xE5, 0xC8, 0xE0, 0x7A] => (Kind::ObjectContainer, true),
            [0xE5, 0xCA, 0xDE, 0xAC] => (Kind::Object, false),
            [0xE5, 0xCB, 0x5E, 0x68] => (Kind::ObjectInfo, false),
            [0x33, 0x86, 0x31, 0xB2] => (Kind::Scene, true),
            [0x33, 0x88, 0xDA, 0x98] => (Kind::SceneInfo, false),
            [0x33, 0x89, 0xB8, 0x46] => (Kind::Clip, true),
            [0x33, 0x87, 0xE3, 0x4A] => (Kind::ClipInfo, false),
            [0x33, 0x87, 0x11, 0x54] => (Kind::ClipData, false),
            _ => return None,
        })
    }
}

/// Either a container with decoded children, or a data leaf whose payload
/// is a byte range into the backing buffer (never copied at tree-build
/// time).
pub(crate) enum Payload {
    Children(Vec<Node>),
    Data { offset: usize, len: usize },
}

pub(crate) struct Node {
    pub(crate) kind: Kind,
    pub(crate) payload: Payload,
}

impl Node {
    pub(crate) fn children(&self) -> &[Node] {
        match &self.payload {
            Payload::Children(children) => children,
            Payload::Data { .. } => &[],
        }
    }

    pub(crate) fn data<'a>(&self, bytes: &'a [u8]) -> Option<&'a [u8]> {
        match self.payload {
            Payload::Data { offset, len } => Some(&bytes[offset..offset + len]),
            Payload::Children(_) => None,
        }
    }

    pub(crate) fn find(&self, kind: Kind) -> Option<&Node> {
        self.children().iter().find(|child| child.kind == kind)
    }

    pub(crate) fn find_all(&self, kind: Kind) -> impl Iterator<Item = &Node> {
        self.children().iter().filter(move |child| child.kind == kind)
    }
}

/// A node header, decoded but not yet classified.
struct Header {
    tag: [u8; 4],
    size: usize,
    body_start: usize,
}

fn read_header(bytes: &[u8], offset: usize) -> Result<Header, FormatError> {
    let header = bytes.get(offset..offset + HEADER_LEN).ok_or(FormatError::TruncatedChunk {
        needed: HEADER_LEN,
        available: bytes.len().saturating_sub(offset),
    })?;

    let signature = &header[10..16];
    if signature != SIGNATURE_V1 && signature != SIGNATURE_V2 {
        return Err(FormatError::InvalidSignature);
    }

    let mut tag = [0u8; 4];
    tag.copy_from_slice(&header[0..4]);
    let size = u64::from_be_bytes(header[16..24].try_into().unwrap()) as usize;
    let body_start = offset + HEADER_LEN;

    if bytes.len() < body_start + size {
        return Err(FormatError::TruncatedChunk {
            needed: size,
            available: bytes.len().saturating_sub(body_start),
        });
    }

    Ok(Header { tag, size, body_start })
}

/// Parses the root node of a `.tvpp` byte buffer, recursively walking its
/// container children. Unknown magic tags are tolerated, at the root the
/// same as anywhere else: the tag is logged and the node becomes an opaque
/// [`Kind::Unknown`] leaf rather than failing the whole parse (§4.4, §7).
pub(crate) fn parse_root(bytes: &[u8]) -> Result<Node, FormatError> {
    let (node, _consumed) = parse_node(bytes, 0)?;
    Ok(node)
}

/// Parses one node starting at `offset`, returning it and the number of
/// bytes consumed (header + payload/children), per the 24-byte-header +
/// `size`-byte-body framing in §4.4.
fn parse_node(bytes: &[u8], offset: usize) -> Result<(Node, usize), FormatError> {
    let header = read_header(bytes, offset)?;

    let node = match Kind::from_tag(header.tag) {
        Some((kind, is_container)) => {
            let payload = if is_container {
                Payload::Children(parse_children(bytes, header.body_start, header.size)?)
            } else {
                Payload::Data { offset: header.body_start, len: header.size }
            };
            Node { kind, payload }
        }
        None => {
            #[cfg(feature = "log")]
            log::warn!("unknown root magic tag {:02x?}, treating as an opaque node", header.tag);
            Node { kind: Kind::Unknown, payload: Payload::Data { offset: header.body_start, len: header.size } }
        }
    };

    Ok((node, HEADER_LEN + header.size))
}

/// Walks a container's `size`-byte body, collecting known children and
/// skipping unknown siblings whole (each header still tells us its own
/// size, so the walk never has to guess where an unknown node ends).
fn parse_children(bytes: &[u8], body_start: usize, size: usize) -> Result<Vec<Node>, FormatError> {
    let mut children = Vec::new();
    let mut cursor = body_start;
    let end = body_start + size;

    while cursor < end {
        let header = read_header(bytes, cursor)?;
        match Kind::from_tag(header.tag) {
            Some((kind, is_container)) => {
                let payload = if is_container {
                    Payload::Children(parse_children(bytes, header.body_start, header.size)?)
                } else {
                    Payload::Data { offset: header.body_start, len: header.size }
                };
                children.push(Node { kind, payload });
            }
            None => {
                #[cfg(feature = "log")]
                log::warn!("unknown container tag {:02x?}, skipping {} bytes", header.tag, header.size);
            }
        }
        cursor += HEADER_LEN + header.size;
    }

    Ok(children)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node_bytes(tag: [u8; 4], body: &[u8]) -> Vec<u8> {
        let mut out = tag.to_vec();
        out.extend_from_slice(&[0; 6]);
        out.extend_from_slice(&SIGNATURE_V1);
        out.extend_from_slice(&(body.len() as u64).to_be_bytes());
        out.extend_from_slice(body);
        out
    }

    #[test]
    fn parses_a_leaf_node() {
        let bytes = node_bytes([0x33, 0x85, 0x55, 0x3A], b"hello");
        let root = parse_root(&bytes).unwrap();

        assert_eq!(root.kind, Kind::ProjectInfo);
        assert_eq!(root.data(&bytes), Some(&b"hello"[..]));
    }

    #[test]
    fn parses_a_container_with_children() {
        let info = node_bytes([0x33, 0x87, 0xE3, 0x4A], b"meta");
        let data = node_bytes([0x33, 0x87, 0x11, 0x54], b"clipbytes");
        let mut body = info.clone();
        body.extend_from_slice(&data);
        let bytes = node_bytes([0x33, 0x89, 0xB8, 0x46], &body);

        let root = parse_root(&bytes).unwrap();
        assert_eq!(root.kind, Kind::Clip);
        assert_eq!(root.children().len(), 2);
        assert_eq!(root.find(Kind::ClipInfo).unwrap().data(&bytes), Some(&b"meta"[..]));
        assert_eq!(root.find(Kind::ClipData).unwrap().data(&bytes), Some(&b"clipbytes"[..]));
    }

    #[test]
    fn invalid_signature_is_an_error() {
        let mut bytes = node_bytes([0x33, 0x85, 0x55, 0x3A], b"x");
        bytes[10] = 0xFF;
        assert!(matches!(parse_root(&bytes), Err(FormatError::InvalidSignature)));
    }

    #[test]
    fn unknown_sibling_is_skipped_without_losing_known_siblings() {
        let unknown = node_bytes([0xAA, 0xBB, 0xCC, 0xDD], b"ignored");
        let info = node_bytes([0x33, 0x88, 0xDA, 0x98], b"scene-meta");
        let mut body = unknown;
        body.extend_from_slice(&info);
        let bytes = node_bytes([0x33, 0x86, 0x31, 0xB2], &body);

        let root = parse_root(&bytes).unwrap();
        assert_eq!(root.kind, Kind::Scene);
        assert_eq!(root.children().len(), 1);
        assert_eq!(root.find(Kind::SceneInfo).unwrap().data(&bytes), Some(&b"scene-meta"[..]));
    }

    #[test]
    fn unknown_root_magic_tag_is_tolerated_not_an_error() {
        let bytes = node_bytes([0xAA, 0xBB, 0xCC, 0xDD], b"whatever");
        let root = parse_root(&bytes).unwrap();

        assert_eq!(root.kind, Kind::Unknown);
        assert!(root.children().is_empty());
    }

    #[test]
    fn truncated_body_is_an_error() {
        let mut bytes = node_bytes([0x33, 0x85, 0x55, 0x3A], b"hello");
        bytes.truncate(bytes.len() - 2);
        assert!(matches!(parse_root(&bytes), Err(FormatError::TruncatedChunk { .. })));
    }
}
