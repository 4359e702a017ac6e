//! Integration tests for planning against the local filesystem.

use directio::descriptor::{InputDescriptor, JobIoDescriptor};
use directio::format::FormatRegistry;
use directio::fs::{FileSystem, LocalFileSystem};
use directio::profile::DataSourceProfile;
use directio::testing::assert_fragments_cover;
use directio::ErrorKind;
use std::fs::{create_dir_all, write};
use tempfile::TempDir;

#[test]
fn test_local_listing_and_blocks() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let base = dir.path();
    create_dir_all(base.join("logs/2024-01"))?;
    create_dir_all(base.join("logs/2024-02"))?;
    write(base.join("logs/2024-01/events.csv"), "a,b\n1,2\n")?;
    write(base.join("logs/2024-02/events.csv"), "")?;
    write(base.join("logs/readme.txt"), "x")?;

    let fs = LocalFileSystem::new(base);
    let files = fs.list_files("logs")?;
    let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(
        paths,
        vec!["logs/2024-01/events.csv", "logs/2024-02/events.csv", "logs/readme.txt"]
    );

    let described = fs.describe(files[0].clone())?;
    assert!(described.boundaries.is_empty());
    assert_eq!(described.blocks.len(), 1);
    assert_eq!(described.blocks[0].end, 8);
    assert!(fs.block_locations("logs/2024-02/events.csv")?.is_empty());
    Ok(())
}

#[test]
fn test_plan_job_on_local_files() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let base = dir.path();
    create_dir_all(base.join("in"))?;
    write(base.join("in/a.csv"), vec![b'x'; 250])?;
    write(base.join("in/b.csv"), vec![b'y'; 40])?;
    write(base.join("in/skip.json"), "{}")?;

    let job = JobIoDescriptor::default()
        .input(InputDescriptor::new("raw", "in/*.csv", "csv"))
        .validate(&FormatRegistry::with_defaults())?;
    let profile = DataSourceProfile {
        minimum_fragment_size: 30,
        preferred_fragment_size: 100,
        ..DataSourceProfile::default()
    };
    let plans = job.plan_inputs(&LocalFileSystem::new(base), &profile)?;

    let plan = &plans[0];
    assert_eq!(plan.files.len(), 2);
    assert_eq!(plan.fragments().count(), 4);
    for file in &plan.files {
        let own: Vec<_> = plan
            .fragments()
            .filter(|f| f.path == file.path)
            .cloned()
            .collect();
        assert_fragments_cover(file, &own);
        assert!(own.iter().all(|f| f.hosts == vec!["localhost".to_string()]));
    }
    Ok(())
}

#[test]
fn test_unreadable_parquet_is_io_error() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    write(dir.path().join("not-really.parquet"), "plain text")?;
    let fs = LocalFileSystem::new(dir.path());
    let result = fs.stat_boundaries("not-really.parquet");
    if cfg!(feature = "io-parquet") {
        assert_eq!(result.unwrap_err().kind, ErrorKind::Io);
    } else {
        assert!(result?.is_empty());
    }
    Ok(())
}
