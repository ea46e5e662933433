//! Encoding profiles for the single-rendition transcode and the DASH ladder.

/// File name the DASH muxer writes the manifest to.
pub const MANIFEST_NAME: &str = "manifest.mpd";

/// One video rung of the DASH ladder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendition {
    /// Filter graph label, e.g. `720p`
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
    /// Target bitrate in kbit/s
    pub bitrate_kbps: u32,
}

impl Rendition {
    pub const fn new(label: &'static str, width: u32, height: u32, bitrate_kbps: u32) -> Self {
        Self {
            label,
            width,
            height,
            bitrate_kbps,
        }
    }

    pub fn bitrate(&self) -> String {
        format!("{}k", self.bitrate_kbps)
    }
}

/// Single-rendition MP4 fed to the segmenter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeProfile {
    pub width: u32,
    pub height: u32,
    pub bitrate_kbps: u32,
    pub video_codec: &'static str,
    pub audio_codec: &'static str,
}

impl Default for TranscodeProfile {
    fn default() -> Self {
        Self {
            width: 640,
            height: 360,
            bitrate_kbps: 800,
            video_codec: "libx264",
            audio_codec: "aac",
        }
    }
}

impl TranscodeProfile {
    pub fn frame_size(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    pub fn bitrate(&self) -> String {
        format!("{}k", self.bitrate_kbps)
    }
}

/// Multi-bitrate DASH output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentProfile {
    /// Highest rung first.
    pub renditions: Vec<Rendition>,
    pub video_codec: &'static str,
    pub segment_duration_secs: u32,
    pub init_segment_template: &'static str,
    pub media_segment_template: &'static str,
    pub manifest_name: &'static str,
}

impl Default for SegmentProfile {
    fn default() -> Self {
        Self {
            renditions: vec![
                Rendition::new("720p", 1280, 720, 2400),
                Rendition::new("480p", 854, 480, 1200),
                Rendition::new("360p", 640, 360, 800),
            ],
            video_codec: "libx264",
            segment_duration_secs: 4,
            init_segment_template: "init-stream$RepresentationID$.m4s",
            media_segment_template: "chunk-stream$RepresentationID$-$Number%05d$.m4s",
            manifest_name: MANIFEST_NAME,
        }
    }
}

impl SegmentProfile {
    /// `split` the input video once per rung and scale each branch.
    pub fn filter_graph(&self) -> String {
        let outputs: String = (1..=self.renditions.len())
            .map(|i| format!("[v{}]", i))
            .collect();
        let mut graph = format!("[0:v]split={}{}", self.renditions.len(), outputs);
        for (i, rendition) in self.renditions.iter().enumerate() {
            graph.push_str(&format!(
                "; [v{}]scale=w={}:h={}[{}]",
                i + 1,
                rendition.width,
                rendition.height,
                rendition.label
            ));
        }
        graph
    }
}
