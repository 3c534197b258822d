//! The public API surface: `Project` → scenes → clips → layers →
//! `frame(i)`.

pub mod clip;
pub mod layer;

use crate::{
    container::{self, Kind, Node},
    dict::{self, Dict},
    error::{Error, FormatError, Result},
};
use clip::{decode_clip_data, Clip};
use regex::Regex;
use std::{collections::HashMap, fs, path::Path};

/// The detected TVPaint host version, parsed from the project's `Host`
/// metadata field. `9.x` stores pixels as ABGR; `10+` stores RGBA — this
/// flag only matters to an external renderer, but the core surfaces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
}

impl Version {
    /// `true` for TVPaint 9.x, where pixel payloads are stored ABGR rather
    /// than RGBA.
    pub fn is_abgr(&self) -> bool {
        self.major == 9
    }
}

fn detect_version(host: &str) -> Option<Version> {
    let re = Regex::new(r"\((\d+)\.(\d+)\)").expect("static pattern is valid");
    let captures = re.captures(host)?;
    Some(Version {
        major: captures.get(1)?.as_str().parse().ok()?,
        minor: captures.get(2)?.as_str().parse().ok()?,
    })
}

/// An opened `.tvpp` project: the backing bytes, the parsed container
/// tree, and a cache of decoded clips.
pub struct Project {
    bytes: Vec<u8>,
    root: Node,
    metadata: Dict,
    version: Option<Version>,
    clips: HashMap<(usize, usize), Clip>,
}

impl Project {
    /// Opens `path`, builds the container tree, and parses project
    /// metadata. Scene and clip contents are decoded lazily.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = fs::read(path)?;
        Self::from_bytes(bytes)
    }

    /// Builds a project from an in-memory `.tvpp` buffer.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let root = container::parse_root(&bytes)?;

        let metadata = match root.find(Kind::ProjectInfo).and_then(|node| node.data(&bytes)) {
            Some(data) => dict::parse(data)?,
            None => Dict::new(),
        };

        let version = metadata.get("Host").and_then(|host| detect_version(host));

        Ok(Project { bytes, root, metadata, version, clips: HashMap::new() })
    }

    pub fn metadata(&self) -> &Dict {
        &self.metadata
    }

    pub fn version(&self) -> Option<Version> {
        self.version
    }

    fn scenes(&self) -> Vec<&Node> {
        self.root.find_all(Kind::Scene).collect()
    }

    pub fn scene_count(&self) -> usize {
        self.scenes().len()
    }

    pub fn scene_metadata(&self, scene_index: usize) -> Result<Dict> {
        let scene = self.scenes().into_iter().nth(scene_index).ok_or(FormatError::OutOfRange {
            index: scene_index as u32,
            len: self.scene_count(),
        })?;

        match scene.find(Kind::SceneInfo).and_then(|node| node.data(&self.bytes)) {
            Some(data) => Ok(dict::parse(data)?),
            None => Ok(Dict::new()),
        }
    }

    fn clip_node(&self, scene_index: usize, clip_index: usize) -> Result<&Node> {
        let scene = self.scenes().into_iter().nth(scene_index).ok_or(FormatError::OutOfRange {
            index: scene_index as u32,
            len: self.scene_count(),
        })?;

        let clips: Vec<&Node> = scene.find_all(Kind::Clip).collect();
        let count = clips.len();
        clips
            .into_iter()
            .nth(clip_index)
            .ok_or(Error::from(FormatError::OutOfRange { index: clip_index as u32, len: count }))
    }

    /// Fully decodes the clip intro and its layers on first call; returns
    /// the cached [`Clip`] thereafter.
    pub fn clip(&mut self, scene_index: usize, clip_index: usize) -> Result<&mut Clip> {
        if !self.clips.contains_key(&(scene_index, clip_index)) {
            let clip_node = self.clip_node(scene_index, clip_index)?;

            let clip_info = clip_node
                .find(Kind::ClipInfo)
                .and_then(|node| node.data(&self.bytes));
            let metadata = match clip_info {
                Some(data) => dict::parse(data)?,
                None => Dict::new(),
            };

            let clip_data = clip_node
                .find(Kind::ClipData)
                .and_then(|node| node.data(&self.bytes))
                .ok_or(FormatError::MissingEntry("clip-data"))?;

            let clip = decode_clip_data(clip_data, metadata)?;
            self.clips.insert((scene_index, clip_index), clip);
        }

        Ok(self.clips.get_mut(&(scene_index, clip_index)).expect("just inserted"))
    }
}
