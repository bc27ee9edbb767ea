use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use super::{MediaKind, MediaRating};

/// Flat record of every taggable field for one media item.
///
/// The two serialization views ([`Tags::mp4_items`] and
/// [`Tags::vorbis_fields`]) are pure functions of this record; absent
/// fields are dropped from the produced maps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Tags {
    pub media_id: Option<String>,
    pub album: Option<String>,
    pub album_artist: Option<String>,
    pub artist: Option<String>,
    pub compilation: Option<bool>,
    pub composer: Option<String>,
    pub copyright: Option<String>,
    pub date: Option<NaiveDate>,
    pub description: Option<String>,
    pub disc: Option<u32>,
    pub disc_total: Option<u32>,
    pub genre: Option<String>,
    pub isrc: Option<String>,
    pub label: Option<String>,
    pub lyrics: Option<String>,
    #[serde(skip)]
    pub media_kind: Option<MediaKind>,
    pub producer: Option<String>,
    pub publisher: Option<String>,
    #[serde(skip)]
    pub rating: Option<MediaRating>,
    pub title: Option<String>,
    pub track: Option<u32>,
    pub track_total: Option<u32>,
    pub url: Option<String>,
}

/// Value shapes the MP4 ilst view can produce.
#[derive(Debug, Clone, PartialEq)]
pub enum Mp4TagValue {
    Text(String),
    Bool(bool),
    /// (number, total) pair for `trkn`/`disk`.
    Pair(u16, u16),
    /// Freeform `----:com.apple.iTunes:*` payload.
    Freeform(Vec<u8>),
    U8(u8),
}

impl Tags {
    /// Copy of this record with the named fields cleared.
    ///
    /// Field names follow the record itself ("album", "isrc", ...).
    /// Unknown names are ignored; the "all" sentinel is handled by the
    /// tagging stage, not here.
    pub fn without_fields(&self, exclude: &[String]) -> Tags {
        let mut tags = self.clone();
        for name in exclude {
            match name.as_str() {
                "media_id" => tags.media_id = None,
                "album" => tags.album = None,
                "album_artist" => tags.album_artist = None,
                "artist" => tags.artist = None,
                "compilation" => tags.compilation = None,
                "composer" => tags.composer = None,
                "copyright" => tags.copyright = None,
                "date" => tags.date = None,
                "description" => tags.description = None,
                "disc" => tags.disc = None,
                "disc_total" => tags.disc_total = None,
                "genre" => tags.genre = None,
                "isrc" => tags.isrc = None,
                "label" => tags.label = None,
                "lyrics" => tags.lyrics = None,
                "media_type" => tags.media_kind = None,
                "producer" => tags.producer = None,
                "publisher" => tags.publisher = None,
                "rating" => tags.rating = None,
                "title" => tags.title = None,
                "track" => tags.track = None,
                "track_total" => tags.track_total = None,
                "url" => tags.url = None,
                _ => {}
            }
        }
        tags
    }

    fn formatted_date(&self, date_format: Option<&str>) -> Option<String> {
        let date = self.date?;
        Some(match date_format {
            // Date-only records format time fields as midnight.
            Some(fmt) => date.and_time(NaiveTime::MIN).format(fmt).to_string(),
            None => date.to_string(),
        })
    }

    /// MP4 ilst atom map. Fields that are `None` are absent; the
    /// disc/track pairs are absent when both halves are unknown.
    pub fn mp4_items(&self, date_format: Option<&str>) -> Vec<(String, Mp4TagValue)> {
        let mut items = Vec::new();

        let mut text = |key: &str, value: &Option<String>| {
            if let Some(value) = value {
                items.push((key.to_string(), Mp4TagValue::Text(value.clone())));
            }
        };

        text("\u{a9}alb", &self.album);
        text("aART", &self.album_artist);
        text("\u{a9}ART", &self.artist);
        text("\u{a9}wrt", &self.composer);
        text("cprt", &self.copyright);
        text("\u{a9}day", &self.formatted_date(date_format));
        text("desc", &self.description);
        text("\u{a9}gen", &self.genre);
        text("\u{a9}lyr", &self.lyrics);
        text("\u{a9}prd", &self.producer);
        text("\u{a9}pub", &self.publisher);
        text("\u{a9}nam", &self.title);
        text("\u{a9}url", &self.url);

        if let Some(compilation) = self.compilation {
            items.push(("cpil".to_string(), Mp4TagValue::Bool(compilation)));
        }
        if self.disc.is_some() || self.disc_total.is_some() {
            items.push((
                "disk".to_string(),
                Mp4TagValue::Pair(
                    self.disc.unwrap_or(0) as u16,
                    self.disc_total.unwrap_or(0) as u16,
                ),
            ));
        }
        if self.track.is_some() || self.track_total.is_some() {
            items.push((
                "trkn".to_string(),
                Mp4TagValue::Pair(
                    self.track.unwrap_or(0) as u16,
                    self.track_total.unwrap_or(0) as u16,
                ),
            ));
        }
        if let Some(isrc) = &self.isrc {
            items.push((
                "----:com.apple.iTunes:ISRC".to_string(),
                Mp4TagValue::Freeform(isrc.as_bytes().to_vec()),
            ));
        }
        if let Some(label) = &self.label {
            items.push((
                "----:com.apple.iTunes:LABEL".to_string(),
                Mp4TagValue::Freeform(label.as_bytes().to_vec()),
            ));
        }
        if let Some(kind) = self.media_kind {
            items.push(("stik".to_string(), Mp4TagValue::U8(kind.stik())));
        }
        if let Some(rating) = self.rating {
            items.push(("rtng".to_string(), Mp4TagValue::U8(rating.rtng())));
        }

        items
    }

    /// Vorbis comment map for Ogg output.
    pub fn vorbis_fields(&self, date_format: Option<&str>) -> Vec<(String, String)> {
        let mut fields = Vec::new();

        let mut push = |key: &str, value: Option<String>| {
            if let Some(value) = value {
                fields.push((key.to_string(), value));
            }
        };

        push("ALBUM", self.album.clone());
        push("ALBUMARTIST", self.album_artist.clone());
        push("ARTIST", self.artist.clone());
        push("COMPOSER", self.composer.clone());
        push("COPYRIGHT", self.copyright.clone());
        push("DESCRIPTION", self.description.clone());
        push("YEAR", self.formatted_date(date_format));
        push("DISCNUMBER", self.disc.map(|n| n.to_string()));
        push("DISCTOTAL", self.disc_total.map(|n| n.to_string()));
        push("GENRE", self.genre.clone());
        push("ISRC", self.isrc.clone());
        push("LABEL", self.label.clone());
        push("LYRICS", self.lyrics.clone());
        push("PRODUCER", self.producer.clone());
        push("PUBLISHER", self.publisher.clone());
        push("TITLE", self.title.clone());
        push("TRACKNUMBER", self.track.map(|n| n.to_string()));
        push("TRACKTOTAL", self.track_total.map(|n| n.to_string()));
        push("URL", self.url.clone());

        fields
    }
}
