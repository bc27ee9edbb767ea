//! Metadata and cover application.
//!
//! The tags a descriptor carries are flattened into the container's
//! native form: an MP4 `ilst` atom list or Vorbis comments, plus a
//! front-cover JPEG. Cover bytes are memoized per URL since every
//! track of an album shares one image.

use std::borrow::Cow;
use std::path::Path;

use bytes::Bytes;
use lofty::config::WriteOptions;
use lofty::mp4::{Atom, AtomData, AtomIdent, DataType, Ilst};
use lofty::ogg::{OggPictureStorage, VorbisComments};
use lofty::picture::{MimeType, Picture, PictureType};
use lofty::tag::TagExt;
use moka::future::Cache;
use spindle_interface::media::{Mp4TagValue, Tags};

use crate::error::StageError;

/// Excluding this pseudo-field skips tagging entirely, cover included.
const EXCLUDE_ALL: &str = "all";
/// Excluding this pseudo-field skips only the embedded cover.
const EXCLUDE_COVER: &str = "cover";

const COVER_CACHE_CAPACITY: u64 = 64;

pub struct Tagger {
    client: reqwest::Client,
    cover_cache: Cache<String, Option<Bytes>>,
    exclude: Vec<String>,
    date_template: String,
}

impl Tagger {
    pub fn new(client: reqwest::Client, exclude: Vec<String>, date_template: String) -> Tagger {
        Tagger {
            client,
            cover_cache: Cache::new(COVER_CACHE_CAPACITY),
            exclude,
            date_template,
        }
    }

    fn skip_all(&self) -> bool {
        self.exclude.iter().any(|name| name == EXCLUDE_ALL)
    }

    fn skip_cover(&self) -> bool {
        self.skip_all() || self.exclude.iter().any(|name| name == EXCLUDE_COVER)
    }

    /// Cover image bytes for `url`; a missing image is `None`, not an
    /// error. Results are cached per URL.
    pub async fn cover_bytes(&self, url: &str) -> Result<Option<Bytes>, StageError> {
        if let Some(hit) = self.cover_cache.get(url).await {
            return Ok(hit);
        }

        let response = self.client.get(url).send().await?;
        let bytes = if response.status() == reqwest::StatusCode::NOT_FOUND {
            None
        } else {
            Some(response.error_for_status()?.bytes().await?)
        };

        self.cover_cache.insert(url.to_string(), bytes.clone()).await;
        Ok(bytes)
    }

    /// Replace the tags of the staged file. The container is inferred
    /// from the file extension.
    pub async fn apply(&self, path: &Path, tags: &Tags, cover_url: &str) -> Result<(), StageError> {
        let tags = tags.without_fields(&self.exclude);
        let cover = if self.skip_cover() || cover_url.is_empty() {
            None
        } else {
            self.cover_bytes(cover_url).await?
        };

        let is_ogg = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("ogg"));

        tracing::debug!(path = %path.display(), "applying tags");
        if is_ogg {
            self.write_vorbis(path, &tags, cover)
        } else {
            self.write_ilst(path, &tags, cover)
        }
    }

    fn write_ilst(
        &self,
        path: &Path,
        tags: &Tags,
        cover: Option<Bytes>,
    ) -> Result<(), StageError> {
        let mut ilst = Ilst::default();

        if !self.skip_all() {
            for (key, value) in tags.mp4_items(Some(&self.date_template)) {
                let Some(ident) = atom_ident(&key) else {
                    continue;
                };
                ilst.insert(Atom::new(ident, atom_data(value)));
            }
            if let Some(cover) = cover {
                ilst.insert(Atom::new(
                    AtomIdent::Fourcc(*b"covr"),
                    AtomData::Picture(front_cover(cover)),
                ));
            }
        }

        ilst.save_to_path(path, WriteOptions::default())?;
        Ok(())
    }

    fn write_vorbis(
        &self,
        path: &Path,
        tags: &Tags,
        cover: Option<Bytes>,
    ) -> Result<(), StageError> {
        let mut comments = VorbisComments::default();

        if !self.skip_all() {
            for (key, value) in tags.vorbis_fields(Some(&self.date_template)) {
                comments.push(key, value);
            }
            if let Some(cover) = cover {
                comments.insert_picture(front_cover(cover), None)?;
            }
        }

        comments.save_to_path(path, WriteOptions::default())?;
        Ok(())
    }
}

fn front_cover(bytes: Bytes) -> Picture {
    Picture::new_unchecked(
        PictureType::CoverFront,
        Some(MimeType::Jpeg),
        None,
        bytes.to_vec(),
    )
}

/// Parse an item key into an atom identifier: either a freeform
/// `----:<mean>:<name>` triple or a four-character code. The fourcc
/// characters are Latin-1 (`\u{a9}` is a single byte).
fn atom_ident(key: &str) -> Option<AtomIdent<'static>> {
    if let Some(rest) = key.strip_prefix("----:") {
        let (mean, name) = rest.split_once(':')?;
        return Some(AtomIdent::Freeform {
            mean: Cow::Owned(mean.to_string()),
            name: Cow::Owned(name.to_string()),
        });
    }

    let mut fourcc = [0u8; 4];
    let mut chars = key.chars();
    for byte in &mut fourcc {
        let c = chars.next()?;
        *byte = u8::try_from(u32::from(c)).ok()?;
    }
    if chars.next().is_some() {
        return None;
    }
    Some(AtomIdent::Fourcc(fourcc))
}

fn atom_data(value: Mp4TagValue) -> AtomData {
    match value {
        Mp4TagValue::Text(text) => AtomData::UTF8(text),
        Mp4TagValue::Bool(flag) => AtomData::Bool(flag),
        Mp4TagValue::Pair(number, total) => {
            let mut data = vec![0u8; 8];
            data[2..4].copy_from_slice(&number.to_be_bytes());
            data[4..6].copy_from_slice(&total.to_be_bytes());
            AtomData::Unknown { code: DataType::Reserved, data }
        }
        Mp4TagValue::Freeform(data) => {
            AtomData::UTF8(String::from_utf8_lossy(&data).into_owned())
        }
        Mp4TagValue::U8(value) => AtomData::SignedInteger(i32::from(value)),
    }
}
