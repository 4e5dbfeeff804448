//! Region-of-interest filename decoding.
//!
//! `{image}_roi-{roi}_left-{left}_top-{top}_right-{right}_bottom-{bottom}.csv`

use std::sync::OnceLock;

use regex::Regex;

fn pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^(?P<image>.*)_roi-(?P<roi>[0-9]+)_left-(?P<left>[0-9]+)_top-(?P<top>[0-9]+)_right-(?P<right>[0-9]+)_bottom-(?P<bottom>[0-9]+)\.csv$",
        )
        .expect("ROI filename pattern is a valid regex")
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoiDescriptor {
    pub image_name: String,
    pub region_name: String,
    pub left: u64,
    pub top: u64,
    pub right: u64,
    pub bottom: u64,
}

impl RoiDescriptor {
    /// Decode a filename. Returns `None` when the name does not match the
    /// pattern or a bound does not fit in `u64`.
    pub fn decode(filename: &str) -> Option<Self> {
        let caps = pattern().captures(filename)?;
        let bound = |name: &str| caps.name(name)?.as_str().parse::<u64>().ok();

        Some(Self {
            image_name: caps.name("image")?.as_str().to_string(),
            region_name: caps.name("roi")?.as_str().to_string(),
            left: bound("left")?,
            top: bound("top")?,
            right: bound("right")?,
            bottom: bound("bottom")?,
        })
    }

    /// True when the embedded image name equals the containing directory's name.
    pub fn matches_directory(&self, dir_name: &str) -> bool {
        self.image_name == dir_name
    }
}
