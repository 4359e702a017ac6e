//! Integration tests for job declarations, validation and planning.

use directio::descriptor::{InputDescriptor, JobIoDescriptor, OutputDescriptor};
use directio::format::FormatRegistry;
use directio::fragment::SourceFile;
use directio::fs::InMemoryFileSystem;
use directio::profile::DataSourceProfile;
use directio::testing::{
    assert_fragments_cover, sample_filesystem, sample_sales_records, sample_sales_schema,
};
use directio::{Diagnostics, ErrorKind, ValidatedJob};
use std::io::Write;
use tempfile::NamedTempFile;

fn small_profile() -> DataSourceProfile {
    DataSourceProfile {
        minimum_fragment_size: 10,
        preferred_fragment_size: 100,
        ..DataSourceProfile::default()
    }
}

fn sales_job() -> JobIoDescriptor {
    JobIoDescriptor::new(sample_sales_schema())
        .variable("root", "warehouse")
        .input(InputDescriptor::new("sales", "${root}/sales/*.csv", "csv"))
        .input(InputDescriptor::new("stripes", "${root}/stripes/*.orc", "orc"))
        .output(
            OutputDescriptor::new("by_region", "reports/{region}/part-*", "csv")
                .order(["-amount", "id ASC"])
                .delete_pattern("*.tmp"),
        )
}

fn validate(job: &JobIoDescriptor) -> Result<ValidatedJob, Diagnostics> {
    job.validate(&FormatRegistry::with_defaults())
}

#[test]
fn test_valid_job_plans_inputs() -> anyhow::Result<()> {
    let job = validate(&sales_job())?;
    let plans = job.plan_inputs(&sample_filesystem(), &small_profile())?;
    assert_eq!(plans.len(), 2);

    let sales = &plans[0];
    let paths: Vec<&str> = sales.files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(paths, vec!["warehouse/sales/2023.csv", "warehouse/sales/2024.csv"]);
    // 2023.csv: each 150-byte block is split at 100 bytes.
    assert_eq!(sales.fragments().count(), 5);
    for file in &sales.files {
        let own: Vec<_> = sales
            .fragments()
            .filter(|f| f.path == file.path)
            .cloned()
            .collect();
        assert_fragments_cover(file, &own);
    }

    let stripes = &plans[1];
    assert_eq!(stripes.files[0].boundaries.len(), 9);
    assert_fragments_cover(&stripes.files[0], &stripes.clone().into_fragments()?);
    Ok(())
}

#[test]
fn test_validated_output_routes_records() -> anyhow::Result<()> {
    let job = validate(&sales_job())?;
    let output = job.output("by_region").expect("declared output");
    let groups = output.partitioner.route(sample_sales_records())?;
    assert_eq!(groups.len(), 3);
    let finalized = output.partitioner.finalize_all(groups);
    assert_eq!(finalized[0].location.path(), "reports/east/part-*");
    Ok(())
}

#[test]
fn test_every_problem_is_reported() {
    let job = JobIoDescriptor::new(sample_sales_schema())
        .input(InputDescriptor::new("undefined", "data/${missing}/*.csv", "csv"))
        .input(InputDescriptor::new("unknown_format", "data/*.csv", "avro"))
        .input(InputDescriptor::new("orders", "data/x/a.csv", "csv"))
        .output(OutputDescriptor::new("literal", "out/result.csv", "csv"))
        .output(
            OutputDescriptor::new("broken", "out/{nope}/p-*", "csv").order(["amount ASCENDING"]),
        )
        .output(OutputDescriptor::new("overwrites", "data/-*", "csv"));

    let diagnostics = validate(&job).unwrap_err();
    assert!(diagnostics.contains(ErrorKind::UndefinedVariable));
    assert!(diagnostics.contains(ErrorKind::ConfigurationError));
    assert!(diagnostics.contains(ErrorKind::MalformedOutputPattern));
    assert!(diagnostics.contains(ErrorKind::MalformedOrderToken));
    assert!(diagnostics.contains(ErrorKind::LayoutConflict));
    assert_eq!(diagnostics.count(ErrorKind::ConfigurationError), 2);

    let subjects: Vec<_> = diagnostics
        .errors()
        .iter()
        .filter_map(|e| e.subject.as_deref())
        .collect();
    assert!(subjects.contains(&"unknown_format"));
    assert!(subjects.contains(&"broken"));
}

#[test]
fn test_schema_checks_on_outputs() {
    let job = JobIoDescriptor::new(sample_sales_schema())
        .output(OutputDescriptor::new("bytes_key", "out/{payload}/p-*", "csv"))
        .output(OutputDescriptor::new("bytes_order", "other/p-*", "csv").order(["payload"]))
        .output(OutputDescriptor::new("twice", "third/p-*", "csv").order(["id", "-id"]));
    let diagnostics = validate(&job).unwrap_err();
    assert_eq!(diagnostics.count(ErrorKind::ConfigurationError), 3);
}

#[test]
fn test_duplicate_names_and_bad_delete_pattern() {
    let job = JobIoDescriptor::new(sample_sales_schema())
        .input(InputDescriptor::new("same", "in/*.csv", "csv"))
        .output(OutputDescriptor::new("same", "out/p-*", "csv").delete_pattern("a/**/b"));
    let diagnostics = validate(&job).unwrap_err();
    assert!(diagnostics.contains(ErrorKind::ConfigurationError));
    assert!(diagnostics.contains(ErrorKind::MalformedPattern));
}

#[test]
fn test_input_variables_override_job_variables() -> anyhow::Result<()> {
    let job = JobIoDescriptor::new(sample_sales_schema())
        .variable("year", "2024")
        .input(InputDescriptor::new("a", "in/${year}/*.csv", "csv"))
        .input(InputDescriptor::new("b", "old/${year}/*.csv", "csv").variable("year", "2023"));
    let job = validate(&job)?;
    assert_eq!(job.inputs()[0].pattern.to_string(), "in/2024/*.csv");
    assert_eq!(job.inputs()[1].pattern.to_string(), "old/2023/*.csv");
    Ok(())
}

#[test]
fn test_missing_input_files() -> anyhow::Result<()> {
    let mandatory = JobIoDescriptor::new(sample_sales_schema())
        .input(InputDescriptor::new("none", "warehouse/none/*.csv", "csv"));
    let err = validate(&mandatory)?
        .plan_inputs(&sample_filesystem(), &small_profile())
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NoMatchingInput);
    assert_eq!(err.subject.as_deref(), Some("none"));

    let optional = JobIoDescriptor::new(sample_sales_schema())
        .input(InputDescriptor::new("none", "warehouse/none/*.csv", "csv").optional());
    let plans = validate(&optional)?.plan_inputs(&sample_filesystem(), &small_profile())?;
    assert!(plans[0].files.is_empty());
    assert_eq!(plans[0].fragments().count(), 0);
    Ok(())
}

#[test]
fn test_filesystem_failure_surfaces_as_io() -> anyhow::Result<()> {
    let fs = InMemoryFileSystem::new()
        .with_file("warehouse/sales/2023.csv", 10)
        .with_failure("warehouse/sales/2023.csv", "datanode unavailable");
    let job = JobIoDescriptor::new(sample_sales_schema())
        .input(InputDescriptor::new("sales", "warehouse/sales/*.csv", "csv"));
    let err = validate(&job)?.plan_inputs(&fs, &small_profile()).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Io);
    assert!(err.message.contains("datanode unavailable"));
    Ok(())
}

#[test]
fn test_broken_file_metadata_is_reported_per_file() -> anyhow::Result<()> {
    let fs = InMemoryFileSystem::new()
        .with_file("warehouse/sales/a.csv", 250)
        .with_source(SourceFile::new("warehouse/sales/b.csv", 100).with_boundaries(vec![70, 20]));
    let job = JobIoDescriptor::new(sample_sales_schema())
        .input(InputDescriptor::new("sales", "warehouse/sales/*.csv", "csv"));
    let plans = validate(&job)?.plan_inputs(&fs, &small_profile())?;

    let plan = &plans[0];
    assert_eq!(plan.files.len(), 2);
    assert_eq!(plan.fragments().count(), 3);
    assert!(plan.fragments().all(|f| f.path == "warehouse/sales/a.csv"));
    let failures: Vec<_> = plan.report.failures().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].kind, ErrorKind::InvalidBoundaries);
    assert_eq!(failures[0].subject.as_deref(), Some("warehouse/sales/b.csv"));
    assert!(plans[0].clone().into_fragments().is_err());
    Ok(())
}

#[test]
fn test_placeholder_format_arguments_are_validated() -> anyhow::Result<()> {
    let schema = sample_sales_schema().field("day", directio::FieldType::Date);
    let job = JobIoDescriptor::new(schema.clone())
        .output(OutputDescriptor::new("bad_text", "a/{region:0000}/p-*", "csv"))
        .output(OutputDescriptor::new("bad_date", "b/{day:yyyy-QQ}/p-*", "csv"))
        .output(OutputDescriptor::new("bad_int", "c/{year:0.00}/p-*", "csv"))
        .output(OutputDescriptor::new("bad_range", "d/r[9..1]-*", "csv"));
    let diagnostics = validate(&job).unwrap_err();
    assert_eq!(diagnostics.count(ErrorKind::ConfigurationError), 3);
    assert_eq!(diagnostics.count(ErrorKind::MalformedPattern), 1);
    let subjects: Vec<_> = diagnostics
        .errors()
        .iter()
        .filter_map(|e| e.subject.as_deref())
        .collect();
    assert!(subjects.contains(&"bad_text"));
    assert!(subjects.contains(&"bad_date"));
    assert!(subjects.contains(&"bad_int"));

    let job = JobIoDescriptor::new(schema).output(OutputDescriptor::new(
        "daily",
        "daily/{day:yyyy-MM-dd}/{year:0000}/s[1..4]/part-*",
        "csv",
    ));
    let job = validate(&job)?;
    let output = job.output("daily").expect("declared output");
    let record = directio::Record::new().with("day", 19_723).with("year", 24);
    let location = output.partitioner.location_of(&record)?;
    assert!(location.path().starts_with("daily/2024-01-01/0024/s"));
    Ok(())
}

#[test]
fn test_output_stages_group_by_base_path() -> anyhow::Result<()> {
    let job = JobIoDescriptor::new(sample_sales_schema())
        .output(OutputDescriptor::new("a", "reports/a-*", "csv"))
        .output(OutputDescriptor::new("b", "reports/b-*", "csv"))
        .output(OutputDescriptor::new("c", "archive/c-*", "csv"));
    let stages = validate(&job)?.output_stages();
    let summary: Vec<(String, Vec<String>)> = stages
        .into_iter()
        .map(|s| (s.base_path, s.outputs.into_iter().map(|o| o.name).collect()))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("archive".to_string(), vec!["c".to_string()]),
            ("reports".to_string(), vec!["a".to_string(), "b".to_string()]),
        ]
    );
    Ok(())
}

#[test]
fn test_delete_patterns_are_relative_to_base() -> anyhow::Result<()> {
    let job = validate(&sales_job())?;
    let output = job.output("by_region").expect("declared output");
    assert_eq!(output.base_path(), "reports");
    assert!(output.should_delete("reports/x.tmp"));
    assert!(!output.should_delete("reports/east/x.tmp"));
    assert!(!output.should_delete("other/x.tmp"));

    let rooted = JobIoDescriptor::new(sample_sales_schema())
        .output(OutputDescriptor::new("top", "/{region}/p-*", "csv").delete_pattern("*.tmp"));
    let rooted = validate(&rooted)?;
    let output = rooted.output("top").expect("declared output");
    assert_eq!(output.base_path(), "/");
    assert!(output.should_delete("/x.tmp"));
    assert!(!output.should_delete("/east/x.tmp"));
    assert!(!output.should_delete("x.tmp"));
    Ok(())
}

#[test]
fn test_load_from_json() -> anyhow::Result<()> {
    let mut file = NamedTempFile::new()?;
    write!(
        file,
        r#"{{
            "variables": {{"root": "warehouse"}},
            "inputs": [{{"name": "sales", "pattern": "${{root}}/sales/*.csv", "format": "csv"}}],
            "outputs": [{{
                "name": "by_region",
                "pattern": "reports/{{region}}/part-*",
                "format": "csv",
                "order": ["-amount"]
            }}],
            "schema": {{"fields": [
                {{"name": "region", "type": "text"}},
                {{"name": "amount", "type": "float"}}
            ]}}
        }}"#
    )?;
    let job = JobIoDescriptor::load(file.path())?;
    assert!(!job.inputs[0].optional);
    let validated = validate(&job)?;
    assert_eq!(validated.inputs()[0].pattern.to_string(), "warehouse/sales/*.csv");
    assert!(JobIoDescriptor::load(file.path().with_extension("missing")).is_err());
    Ok(())
}
