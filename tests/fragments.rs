//! Integration tests for input fragment planning.

use directio::format::{ColumnarFormat, TextFormat, WholeFileFormat};
use directio::fragment::{
    BlockLocation, BlockPolicy, FragmentPlanner, SourceFile, plan, plan_with_blocks,
};
use directio::fs::FileSystem;
use directio::profile::DataSourceProfile;
use directio::testing::{assert_fragments_cover, sample_filesystem};
use directio::ErrorKind;

fn ranges(fragments: &[directio::Fragment]) -> Vec<(u64, u64)> {
    fragments.iter().map(|f| (f.start, f.end)).collect()
}

#[test]
fn test_zero_length_file_yields_one_empty_fragment() -> anyhow::Result<()> {
    let file = SourceFile::new("empty.csv", 0);
    let fragments = plan(&file, 100, 10)?;
    assert_eq!(ranges(&fragments), vec![(0, 0)]);
    assert!(fragments[0].is_empty());
    Ok(())
}

#[test]
fn test_non_positive_preferred_keeps_file_whole() -> anyhow::Result<()> {
    let file = SourceFile::new("a.bin", 12_345);
    assert_eq!(ranges(&plan(&file, 0, 10)?), vec![(0, 12_345)]);
    assert_eq!(ranges(&plan(&file, -1, -1)?), vec![(0, 12_345)]);
    Ok(())
}

#[test]
fn test_splits_anywhere_without_boundaries() -> anyhow::Result<()> {
    let file = SourceFile::new("a.csv", 250);
    let fragments = plan(&file, 100, 10)?;
    assert_eq!(ranges(&fragments), vec![(0, 100), (100, 200), (200, 250)]);
    assert_fragments_cover(&file, &fragments);
    Ok(())
}

#[test]
fn test_short_tail_is_merged() -> anyhow::Result<()> {
    let file = SourceFile::new("a.csv", 250);
    let fragments = plan(&file, 100, 60)?;
    assert_eq!(ranges(&fragments), vec![(0, 100), (100, 250)]);
    assert_fragments_cover(&file, &fragments);
    Ok(())
}

#[test]
fn test_short_single_fragment_is_kept() -> anyhow::Result<()> {
    let file = SourceFile::new("a.csv", 30);
    assert_eq!(ranges(&plan(&file, 100, 60)?), vec![(0, 30)]);
    Ok(())
}

#[test]
fn test_respects_declared_boundaries() -> anyhow::Result<()> {
    let file =
        SourceFile::new("part.orc", 1000).with_boundaries((1..10).map(|i| i * 100).collect());
    let fragments = plan(&file, 250, 0)?;
    assert_eq!(
        ranges(&fragments),
        vec![(0, 300), (300, 600), (600, 900), (900, 1000)]
    );
    assert_fragments_cover(&file, &fragments);

    let merged = plan(&file, 250, 150)?;
    assert_eq!(ranges(&merged), vec![(0, 300), (300, 600), (600, 1000)]);
    assert_fragments_cover(&file, &merged);
    Ok(())
}

#[test]
fn test_invalid_boundaries() {
    let unordered = SourceFile::new("x.orc", 100).with_boundaries(vec![50, 40]);
    let err = plan(&unordered, 10, 1).unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidBoundaries);
    assert_eq!(err.subject.as_deref(), Some("x.orc"));

    let beyond = SourceFile::new("x.orc", 100).with_boundaries(vec![10, 200]);
    assert_eq!(plan(&beyond, 10, 1).unwrap_err().kind, ErrorKind::InvalidBoundaries);

    let bad_block =
        SourceFile::new("x.orc", 100).with_blocks(vec![BlockLocation::new(0, 150, ["h"])]);
    assert_eq!(plan(&bad_block, 10, 1).unwrap_err().kind, ErrorKind::InvalidBoundaries);
}

#[test]
fn test_locality_hints_union_overlapping_blocks() -> anyhow::Result<()> {
    let fs = sample_filesystem();
    let file = fs.describe(SourceFile::new("warehouse/sales/2023.csv", 300))?;
    let fragments = plan(&file, 100, 10)?;
    assert_eq!(ranges(&fragments), vec![(0, 100), (100, 150), (150, 250), (250, 300)]);
    assert_eq!(hosts(&fragments), vec![
        vec!["node-a", "node-b"],
        vec!["node-a", "node-b"],
        vec!["node-b", "node-c"],
        vec!["node-b", "node-c"],
    ]);

    // Blocks are ignored where the format declares its own boundaries.
    let bounded = file.clone().with_boundaries(vec![120, 240]);
    let fragments = plan(&bounded, 100, 10)?;
    assert_eq!(ranges(&fragments), vec![(0, 120), (120, 240), (240, 300)]);
    assert_eq!(hosts(&fragments)[1], vec!["node-a", "node-b", "node-c"]);
    Ok(())
}

fn hosts(fragments: &[directio::Fragment]) -> Vec<Vec<&str>> {
    fragments
        .iter()
        .map(|f| f.hosts.iter().map(String::as_str).collect())
        .collect()
}

fn four_blocks() -> SourceFile {
    SourceFile::new("blocks.csv", 400).with_blocks(vec![
        BlockLocation::new(0, 50, ["h1"]),
        BlockLocation::new(50, 100, ["h2"]),
        BlockLocation::new(100, 300, ["h3"]),
        BlockLocation::new(300, 400, ["h4"]),
    ])
}

#[test]
fn test_block_policy_split_and_combine() -> anyhow::Result<()> {
    let file = four_blocks();
    let both = plan_with_blocks(&file, 100, 10, BlockPolicy::default())?;
    assert_eq!(ranges(&both), vec![(0, 100), (100, 200), (200, 300), (300, 400)]);
    assert_eq!(hosts(&both)[0], vec!["h1", "h2"]);
    assert_fragments_cover(&file, &both);

    let no_split = BlockPolicy { split: false, combine: true };
    let whole = plan_with_blocks(&file, 100, 10, no_split)?;
    assert_eq!(ranges(&whole), vec![(0, 100), (100, 300), (300, 400)]);

    let no_combine = BlockPolicy { split: true, combine: false };
    let apart = plan_with_blocks(&file, 100, 10, no_combine)?;
    assert_eq!(ranges(&apart), vec![(0, 50), (50, 100), (100, 200), (200, 300), (300, 400)]);

    let neither = BlockPolicy { split: false, combine: false };
    let blocks = plan_with_blocks(&file, 100, 10, neither)?;
    assert_eq!(ranges(&blocks), vec![(0, 50), (50, 100), (100, 300), (300, 400)]);
    Ok(())
}

#[test]
fn test_block_pieces_merge_short_tails_and_fill_gaps() -> anyhow::Result<()> {
    let file = SourceFile::new("gappy.csv", 300).with_blocks(vec![
        BlockLocation::new(0, 205, ["h1"]),
        BlockLocation::new(250, 280, ["h2"]),
    ]);
    let fragments = plan(&file, 100, 10)?;
    // [200, 205) folds into its block's last piece; the hostless gap and
    // the small blocks after it combine.
    assert_eq!(ranges(&fragments), vec![(0, 100), (100, 205), (205, 300)]);
    assert_eq!(hosts(&fragments)[2], vec!["h2"]);
    assert_fragments_cover(&file, &fragments);
    Ok(())
}

#[test]
fn test_planner_carries_block_policy() -> anyhow::Result<()> {
    let policy = BlockPolicy { split: false, combine: false };
    let planner = FragmentPlanner::new(100, 10).with_block_policy(policy);
    assert_eq!(planner.block_policy(), policy);
    assert_eq!(ranges(&planner.plan(&four_blocks())?).len(), 4);

    let profile = DataSourceProfile {
        split_blocks: false,
        ..DataSourceProfile::default()
    };
    let planner = FragmentPlanner::for_format(&profile, &TextFormat::new("csv"));
    assert_eq!(planner.block_policy(), BlockPolicy { split: false, combine: true });
    Ok(())
}

#[test]
fn test_planner_sizes_from_profile_and_format() {
    let profile = DataSourceProfile::default();
    let text = FragmentPlanner::for_format(&profile, &TextFormat::new("csv"));
    assert_eq!(text.minimum_bytes(), 16 * 1024 * 1024);
    assert_eq!(text.preferred_bytes(), 64 * 1024 * 1024);

    let columnar = FragmentPlanner::for_format(&profile, &ColumnarFormat::new("parquet", 128 * 1024 * 1024));
    assert_eq!(columnar.preferred_bytes(), 128 * 1024 * 1024);

    let whole = FragmentPlanner::for_format(&profile, &WholeFileFormat);
    assert_eq!(whole, FragmentPlanner::whole_files());
}

#[test]
fn test_plan_all_keeps_failures_separate() {
    let files = vec![
        SourceFile::new("a.csv", 250),
        SourceFile::new("broken.orc", 100).with_boundaries(vec![60, 30]),
        SourceFile::new("b.csv", 0),
    ];
    let report = FragmentPlanner::new(100, 10).plan_all(&files);

    let order: Vec<&str> = report.files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(order, vec!["a.csv", "broken.orc", "b.csv"]);
    assert!(report.has_failures());
    assert_eq!(report.failures().count(), 1);
    assert_eq!(report.fragments().count(), 4);
    assert!(report.into_fragments().is_err());
}
