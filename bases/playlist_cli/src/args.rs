// bases/playlist_cli/src/args.rs
use clap::Parser;
use color_eyre::eyre::{bail, eyre};
use color_eyre::Result;
use playlist_pipeline::SelectionSet;
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Pull a playlist and save its tracks as MP3
#[derive(Parser, Debug, Clone)]
#[command(name = "playlist-pull", author, version, about, long_about = None)]
pub struct Args {
    /// Playlist URL or bare playlist ID
    pub reference: String,

    /// Tracks to download, 1-based (e.g. "1,3,5-7"). Downloads everything when omitted.
    #[arg(short, long, value_delimiter = ',')]
    pub select: Vec<String>,

    /// Directory to store converted files (used when no directory has been saved yet)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// YouTube Data API key
    #[arg(long, env = "YOUTUBE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Preferences file (defaults to the user config directory)
    #[arg(long)]
    pub preferences: Option<PathBuf>,

    /// Keep going when a track fails instead of halting the whole batch
    #[arg(long)]
    pub skip_failed: bool,

    /// Maximum number of tracks processed at once
    #[arg(long)]
    pub max_concurrent: Option<usize>,

    /// Only list the playlist, don't download
    #[arg(short, long)]
    pub list: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// The tracks picked with `--select`, or all of them
    pub fn selection(&self, track_count: usize) -> Result<SelectionSet> {
        let mut selection = SelectionSet::new(track_count);
        if self.select.is_empty() {
            selection.toggle_all();
            return Ok(selection);
        }

        let mut picked = BTreeSet::new();
        for spec in &self.select {
            for number in parse_range(spec.trim())? {
                if number == 0 || number > track_count {
                    bail!("track {number} is out of range (playlist has {track_count} tracks)");
                }
                picked.insert(number - 1);
            }
        }
        for index in picked {
            selection.toggle(index);
        }
        Ok(selection)
    }
}

/// "4" or "2-5", inclusive
fn parse_range(spec: &str) -> Result<std::ops::RangeInclusive<usize>> {
    let parse = |s: &str| {
        s.trim()
            .parse::<usize>()
            .map_err(|_| eyre!("invalid track number '{s}'"))
    };

    match spec.split_once('-') {
        Some((start, end)) => {
            let (start, end) = (parse(start)?, parse(end)?);
            if start > end {
                bail!("invalid track range '{spec}'");
            }
            Ok(start..=end)
        }
        None => {
            let n = parse(spec)?;
            Ok(n..=n)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["playlist-pull", "PLabc"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn test_defaults() {
        let args = args(&[]);
        assert_eq!(args.reference, "PLabc");
        assert!(args.select.is_empty());
        assert!(!args.skip_failed);
        assert!(!args.list);
    }

    #[test]
    fn test_no_select_means_everything() {
        let selection = args(&[]).selection(4).unwrap();
        assert_eq!(selection.len(), 4);
    }

    #[rstest]
    #[case(&["--select", "1,3"], &[0, 2])]
    #[case(&["--select", "2-4"], &[1, 2, 3])]
    #[case(&["-s", "1", "-s", "4"], &[0, 3])]
    #[case(&["--select", "2,2,1-2"], &[0, 1])]
    fn test_select_ranges(#[case] extra: &[&str], #[case] expected: &[usize]) {
        let selection = args(extra).selection(5).unwrap();
        assert_eq!(selection.len(), expected.len());
        for index in expected {
            assert!(selection.is_selected(*index), "{index} should be selected");
        }
    }

    #[rstest]
    #[case("0")]
    #[case("6")]
    #[case("3-1")]
    #[case("x")]
    fn test_rejects_bad_selection(#[case] spec: &str) {
        assert!(args(&["--select", spec]).selection(5).is_err());
    }
}
