//! Footage selections
//!
//! A selection is the ordered list of camera files recorded for one
//! timestamp bucket. Camera files are named `CAMn_YYYYMMDD_HHMM[SS].ext`;
//! the time-of-day part gives the wall-clock start of the footage.

use crate::utils::error::{CamSyncError, Result};
use crate::utils::format_time_of_day;
use std::path::{Path, PathBuf};

/// Footage time wraps at midnight
const SECONDS_PER_DAY: f64 = 86_400.0;

/// File extensions picked up when scanning a bucket directory
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mkv", "mov"];

/// Files of one timestamp bucket, in camera order
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    files: Vec<PathBuf>,

    /// Name shown as "Now playing"
    name: String,

    /// Seconds since midnight at which the footage starts
    footage_start: Option<u32>,
}

impl Selection {
    /// Build a selection from files in the order they should be tiled
    pub fn from_files(files: Vec<PathBuf>) -> Result<Self> {
        let first = files.first().ok_or(CamSyncError::EmptySelection)?;
        let stem = first
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let name = display_name(&stem).to_string();
        let footage_start = parse_footage_start(&stem);

        Ok(Self {
            files,
            name,
            footage_start,
        })
    }

    /// Collect every video file in `dir`, sorted by file name
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let is_video = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| VIDEO_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
                .unwrap_or(false);
            if path.is_file() && is_video {
                files.push(path);
            }
        }
        files.sort();
        Self::from_files(files)
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Wall-clock start of the footage in seconds since midnight
    pub fn footage_start(&self) -> Option<u32> {
        self.footage_start
    }

    /// "Footage Time: HH:MM:SS" for a logical position
    pub fn footage_time_text(&self, elapsed_seconds: f64) -> String {
        match self.footage_start {
            Some(start) => format!(
                "Footage Time: {}",
                format_time_of_day(start as u64 + (elapsed_seconds.max(0.0) % SECONDS_PER_DAY) as u64)
            ),
            None => "Footage Time: --:--:--".to_string(),
        }
    }
}

/// Strip the `CAMn_` prefix from a camera file stem
fn display_name(stem: &str) -> &str {
    match stem.split_once('_') {
        Some((camera, rest)) if is_camera_tag(camera) => rest,
        _ => stem,
    }
}

fn is_camera_tag(tag: &str) -> bool {
    match (tag.get(..3), tag.get(3..)) {
        (Some(prefix), Some(number)) => {
            prefix.eq_ignore_ascii_case("CAM")
                && !number.is_empty()
                && number.chars().all(|c| c.is_ascii_digit())
        }
        _ => false,
    }
}

/// Parse `HHMMSS` or `HHMM` from the third `_`-separated field
fn parse_footage_start(stem: &str) -> Option<u32> {
    let field = stem.split('_').nth(2)?;
    let digits: String = field.chars().take_while(|c| c.is_ascii_digit()).take(6).collect();

    let (hours, minutes, seconds) = match digits.len() {
        6 => (&digits[0..2], &digits[2..4], &digits[4..6]),
        4 => (&digits[0..2], &digits[2..4], "0"),
        _ => return None,
    };

    let hours: u32 = hours.parse().ok()?;
    let minutes: u32 = minutes.parse().ok()?;
    let seconds: u32 = seconds.parse().ok()?;
    if hours > 23 || minutes > 59 || seconds > 59 {
        return None;
    }

    Some(hours * 3600 + minutes * 60 + seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selection(names: &[&str]) -> Selection {
        Selection::from_files(names.iter().map(PathBuf::from).collect()).unwrap()
    }

    #[test]
    fn test_empty_selection() {
        assert!(matches!(
            Selection::from_files(Vec::new()),
            Err(CamSyncError::EmptySelection)
        ));
    }

    #[test]
    fn test_display_name_strips_camera_prefix() {
        let sel = selection(&["/footage/CAM1_20240315_143005.mp4", "/footage/CAM2_20240315_143005.mp4"]);
        assert_eq!(sel.name(), "20240315_143005");
        assert_eq!(sel.len(), 2);

        let sel = selection(&["lobby.mp4"]);
        assert_eq!(sel.name(), "lobby");
    }

    #[test]
    fn test_footage_start_hhmmss() {
        let sel = selection(&["CAM3_20240315_143005.mp4"]);
        assert_eq!(sel.footage_start(), Some(14 * 3600 + 30 * 60 + 5));
        assert_eq!(sel.footage_time_text(65.7), "Footage Time: 14:31:10");
    }

    #[test]
    fn test_footage_start_hhmm() {
        let sel = selection(&["CAM1_20240315_2359.avi"]);
        assert_eq!(sel.footage_start(), Some(23 * 3600 + 59 * 60));
        assert_eq!(sel.footage_time_text(90.0), "Footage Time: 00:00:30");
        assert_eq!(sel.footage_time_text(1e20), "Footage Time: 09:45:40");
    }

    #[test]
    fn test_unparseable_start() {
        let sel = selection(&["CAM1_20240315_noon.mp4"]);
        assert_eq!(sel.footage_start(), None);
        assert_eq!(sel.footage_time_text(10.0), "Footage Time: --:--:--");

        let sel = selection(&["CAM1_20240315_996000.mp4"]);
        assert_eq!(sel.footage_start(), None);
    }

    #[test]
    fn test_from_dir_sorts_and_filters() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["CAM2_20240315_1200.mp4", "CAM1_20240315_1200.MP4", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }

        let sel = Selection::from_dir(dir.path()).unwrap();
        let names: Vec<_> = sel
            .files()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["CAM1_20240315_1200.MP4", "CAM2_20240315_1200.mp4"]);
        assert_eq!(sel.footage_start(), Some(12 * 3600));
    }
}
