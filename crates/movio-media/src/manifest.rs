//! Subtitle injection into generated DASH manifests.
//!
//! The segmenter writes a manifest with video and audio adaptation sets
//! only. Translated WebVTT tracks are produced later by an external
//! translator under `subtitles/{stem}/lang_{code}.vtt`, next to the
//! `segments/{stem}/` prefix, so each language gets an adaptation set with a
//! relative `BaseURL` pointing there.

use std::path::Path;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;
use tracing::debug;

use crate::error::{MediaError, MediaResult};

const PERIOD: &[u8] = b"Period";
const SUBTITLE_ROLE_SCHEME: &str = "urn:mpeg:dash:role:2011";
const SUBTITLE_BANDWIDTH: &str = "256";

/// Relative location of a translated track as seen from the manifest.
pub fn subtitle_base_url(stem: &str, language: &str) -> String {
    format!("../../subtitles/{}/lang_{}.vtt", stem, language)
}

/// Append one subtitle adaptation set per language to the first `Period`.
///
/// Adaptation set ids continue from the number of elements already in the
/// period. Existing subtitle sets are not detected, so applying this twice
/// adds a second copy of every entry.
pub fn add_subtitle_tracks(manifest: &str, stem: &str, languages: &[String]) -> MediaResult<String> {
    let mut reader = Reader::from_str(manifest);
    let mut writer = Writer::new(Vec::with_capacity(manifest.len() + languages.len() * 256));

    let mut depth = 0usize;
    // Depth of the first Period's own content while inside it.
    let mut period_depth: Option<usize> = None;
    let mut period_children = 0usize;
    let mut edited = false;

    loop {
        match reader.read_event()? {
            Event::Eof => break,
            Event::Start(e) => {
                depth += 1;
                if !edited && period_depth.is_none() && e.local_name().as_ref() == PERIOD {
                    period_depth = Some(depth);
                } else if period_depth == Some(depth - 1) {
                    period_children += 1;
                }
                writer.write_event(Event::Start(e))?;
            }
            Event::Empty(e) => {
                if !edited && period_depth.is_none() && e.local_name().as_ref() == PERIOD {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    writer.write_event(Event::Start(e))?;
                    write_subtitle_sets(&mut writer, stem, languages, 0)?;
                    writer.write_event(Event::End(BytesEnd::new(name)))?;
                    edited = true;
                } else {
                    if period_depth == Some(depth) {
                        period_children += 1;
                    }
                    writer.write_event(Event::Empty(e))?;
                }
            }
            Event::End(e) => {
                if period_depth == Some(depth) {
                    write_subtitle_sets(&mut writer, stem, languages, period_children)?;
                    period_depth = None;
                    edited = true;
                }
                depth = depth.saturating_sub(1);
                writer.write_event(Event::End(e))?;
            }
            other => writer.write_event(other)?,
        }
    }

    if !edited {
        return Err(MediaError::manifest_malformed("no Period element"));
    }

    String::from_utf8(writer.into_inner())
        .map_err(|e| MediaError::manifest_malformed(format!("non UTF-8 output: {}", e)))
}

/// Edit a manifest on disk in place.
pub async fn add_subtitle_tracks_to_file(
    path: &Path,
    stem: &str,
    languages: &[String],
) -> MediaResult<()> {
    if !tokio::fs::try_exists(path).await? {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    let manifest = tokio::fs::read_to_string(path).await?;
    let edited = add_subtitle_tracks(&manifest, stem, languages)?;
    tokio::fs::write(path, edited).await?;

    debug!(
        "Added {} subtitle tracks to {}",
        languages.len(),
        path.display()
    );
    Ok(())
}

fn write_subtitle_sets(
    writer: &mut Writer<Vec<u8>>,
    stem: &str,
    languages: &[String],
    existing_children: usize,
) -> MediaResult<()> {
    for (offset, language) in languages.iter().enumerate() {
        let id = (existing_children + offset + 1).to_string();
        let representation_id = format!("subtitle-{}", language);
        let base_url = subtitle_base_url(stem, language);

        writer.write_event(Event::Start(BytesStart::new("AdaptationSet").with_attributes([
            ("id", id.as_str()),
            ("mimeType", "text/vtt"),
            ("lang", language.as_str()),
            ("contentType", "text"),
        ])))?;
        writer.write_event(Event::Empty(BytesStart::new("Role").with_attributes([
            ("schemeIdUri", SUBTITLE_ROLE_SCHEME),
            ("value", "subtitle"),
        ])))?;
        writer.write_event(Event::Start(BytesStart::new("Representation").with_attributes([
            ("id", representation_id.as_str()),
            ("bandwidth", SUBTITLE_BANDWIDTH),
        ])))?;
        writer.write_event(Event::Start(BytesStart::new("BaseURL")))?;
        writer.write_event(Event::Text(BytesText::new(&base_url)))?;
        writer.write_event(Event::End(BytesEnd::new("BaseURL")))?;
        writer.write_event(Event::End(BytesEnd::new("Representation")))?;
        writer.write_event(Event::End(BytesEnd::new("AdaptationSet")))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<MPD xmlns="urn:mpeg:dash:schema:mpd:2011" profiles="urn:mpeg:dash:profile:isoff-live:2011" type="static">
	<Period id="0" start="PT0.0S">
		<AdaptationSet id="0" contentType="video" segmentAlignment="true">
			<Representation id="0" mimeType="video/mp4" codecs="avc1.64001f" bandwidth="2400000" width="1280" height="720">
				<SegmentTemplate timescale="12800" initialization="init-stream$RepresentationID$.m4s" media="chunk-stream$RepresentationID$-$Number%05d$.m4s" startNumber="1"/>
			</Representation>
		</AdaptationSet>
		<AdaptationSet id="1" contentType="audio" segmentAlignment="true">
			<Representation id="3" mimeType="audio/mp4" codecs="mp4a.40.2" bandwidth="128000"/>
		</AdaptationSet>
	</Period>
</MPD>
"#;

    fn languages() -> Vec<String> {
        ["en", "bn", "hi", "fr"].iter().map(|s| s.to_string()).collect()
    }

    fn count(haystack: &str, needle: &str) -> usize {
        haystack.matches(needle).count()
    }

    #[test]
    fn test_adds_one_set_per_language() {
        let edited = add_subtitle_tracks(MANIFEST, "abc", &languages()).unwrap();

        assert_eq!(count(&edited, "mimeType=\"text/vtt\""), 4);
        for code in ["en", "bn", "hi", "fr"] {
            assert_eq!(count(&edited, &format!("lang=\"{}\"", code)), 1);
            assert_eq!(count(&edited, &format!("id=\"subtitle-{}\"", code)), 1);
            assert!(edited.contains(&format!(
                "<BaseURL>../../subtitles/abc/lang_{}.vtt</BaseURL>",
                code
            )));
        }
        assert_eq!(count(&edited, SUBTITLE_ROLE_SCHEME), 4);
    }

    #[test]
    fn test_ids_continue_after_existing_sets() {
        let edited = add_subtitle_tracks(MANIFEST, "abc", &languages()).unwrap();

        assert!(edited.contains(r#"<AdaptationSet id="3" mimeType="text/vtt" lang="en""#));
        assert!(edited.contains(r#"<AdaptationSet id="6" mimeType="text/vtt" lang="fr""#));
    }

    #[test]
    fn test_sets_land_inside_period() {
        let edited = add_subtitle_tracks(MANIFEST, "abc", &languages()).unwrap();

        let period_end = edited.find("</Period>").unwrap();
        let last_set = edited.rfind("subtitle-fr").unwrap();
        assert!(last_set < period_end);
        assert!(edited.contains("<MPD xmlns=\"urn:mpeg:dash:schema:mpd:2011\""));
    }

    #[test]
    fn test_editing_twice_duplicates() {
        let once = add_subtitle_tracks(MANIFEST, "abc", &languages()).unwrap();
        let twice = add_subtitle_tracks(&once, "abc", &languages()).unwrap();

        assert_eq!(count(&twice, "mimeType=\"text/vtt\""), 8);
        assert_eq!(count(&twice, "id=\"subtitle-en\""), 2);
    }

    #[test]
    fn test_empty_period_is_expanded() {
        let manifest = r#"<MPD xmlns="urn:mpeg:dash:schema:mpd:2011"><Period id="0"/></MPD>"#;
        let edited = add_subtitle_tracks(manifest, "abc", &["en".to_string()]).unwrap();

        assert!(edited.starts_with(
            r#"<MPD xmlns="urn:mpeg:dash:schema:mpd:2011"><Period id="0"><AdaptationSet id="1""#
        ));
        assert!(edited.ends_with("</Period></MPD>"));
    }

    #[test]
    fn test_only_first_period_is_edited() {
        let manifest = "<MPD><Period id=\"0\"></Period><Period id=\"1\"></Period></MPD>";
        let edited = add_subtitle_tracks(manifest, "abc", &["en".to_string()]).unwrap();

        assert_eq!(count(&edited, "subtitle-en"), 1);
        assert!(edited.find("subtitle-en").unwrap() < edited.find("<Period id=\"1\">").unwrap());
    }

    #[test]
    fn test_missing_period_is_malformed() {
        let manifest = "<MPD xmlns=\"urn:mpeg:dash:schema:mpd:2011\"></MPD>";
        let err = add_subtitle_tracks(manifest, "abc", &languages()).unwrap_err();
        assert!(matches!(err, MediaError::ManifestMalformed(_)));
    }

    #[test]
    fn test_broken_xml_is_error() {
        let manifest = "<MPD><Period></AdaptationSet></MPD>";
        assert!(add_subtitle_tracks(manifest, "abc", &languages()).is_err());
    }

    #[tokio::test]
    async fn test_edit_file_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.mpd");
        tokio::fs::write(&path, MANIFEST).await.unwrap();

        add_subtitle_tracks_to_file(&path, "abc", &languages()).await.unwrap();

        let edited = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(count(&edited, "mimeType=\"text/vtt\""), 4);
    }

    #[tokio::test]
    async fn test_edit_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = add_subtitle_tracks_to_file(&dir.path().join("manifest.mpd"), "abc", &languages())
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }
}
