//! Job I/O declarations and their validation.
//!
//! A [`JobIoDescriptor`] is the declarative surface a job author fills in:
//! named inputs and outputs with path patterns, format identifiers, output
//! orderings and the record schema. [`JobIoDescriptor::validate`] checks the
//! whole declaration in one pass, without any I/O, and yields a
//! [`ValidatedJob`] that can plan input fragments and route output records.
//!
//! ```
//! use directio::descriptor::{InputDescriptor, JobIoDescriptor, OutputDescriptor};
//! use directio::format::FormatRegistry;
//! use directio::record::{FieldType, Schema};
//!
//! let schema = Schema::new()
//!     .field("region", FieldType::Text)
//!     .field("amount", FieldType::Int);
//! let job = JobIoDescriptor::new(schema)
//!     .variable("date", "2024-01-01")
//!     .input(InputDescriptor::new("sales", "raw/${date}/*.csv", "csv"))
//!     .output(
//!         OutputDescriptor::new("by_region", "report/{region}/part-*", "csv")
//!             .order(["-amount"]),
//!     );
//!
//! let validated = job.validate(&FormatRegistry::with_defaults()).expect("valid job");
//! assert_eq!(validated.inputs()[0].pattern.to_string(), "raw/2024-01-01/*.csv");
//! ```

use crate::error::{Diagnostics, Error, ErrorKind, Result};
use crate::format::{DataFormat, FormatRegistry};
use crate::fragment::{Fragment, FragmentPlanner, PlanReport, SourceFile};
use crate::fs::FileSystem;
use crate::layout::LayoutValidator;
use crate::location::Location;
use crate::order::OrderSpec;
use crate::partition::OutputPartitioner;
use crate::pattern::{PathPattern, Segment};
use crate::placeholder::PlaceholderFormat;
use crate::profile::DataSourceProfile;
use crate::record::Schema;
use crate::variables::VariableResolver;
use anyhow::Context;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputDescriptor {
    pub name: String,
    pub pattern: String,
    /// Variables for this input only; they override job-level variables.
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
    pub format: String,
    /// An optional input may match no file at all.
    #[serde(default)]
    pub optional: bool,
}

impl InputDescriptor {
    pub fn new(
        name: impl Into<String>,
        pattern: impl Into<String>,
        format: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
            variables: BTreeMap::new(),
            format: format.into(),
            optional: false,
        }
    }

    #[must_use]
    pub fn variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputDescriptor {
    pub name: String,
    pub pattern: String,
    /// Order tokens such as `"+region"` or `"amount DESC"`.
    #[serde(default)]
    pub order: Vec<String>,
    pub format: String,
    /// Patterns, relative to the output's base path, of files to remove
    /// before the output is written.
    #[serde(default)]
    pub delete_patterns: Vec<String>,
}

impl OutputDescriptor {
    pub fn new(
        name: impl Into<String>,
        pattern: impl Into<String>,
        format: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
            order: Vec::new(),
            format: format.into(),
            delete_patterns: Vec::new(),
        }
    }

    #[must_use]
    pub fn order<S: Into<String>>(mut self, tokens: impl IntoIterator<Item = S>) -> Self {
        self.order = tokens.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn delete_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.delete_patterns.push(pattern.into());
        self
    }
}

/// Everything a job reads and writes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobIoDescriptor {
    #[serde(default)]
    pub inputs: Vec<InputDescriptor>,
    #[serde(default)]
    pub outputs: Vec<OutputDescriptor>,
    #[serde(default)]
    pub schema: Schema,
    /// Batch arguments shared by every declaration.
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
}

impl JobIoDescriptor {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            ..Self::default()
        }
    }

    /// Read a declaration from a JSON file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text =
            std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parse job {}", path.display()))
    }

    #[must_use]
    pub fn input(mut self, input: InputDescriptor) -> Self {
        self.inputs.push(input);
        self
    }

    #[must_use]
    pub fn output(mut self, output: OutputDescriptor) -> Self {
        self.outputs.push(output);
        self
    }

    #[must_use]
    pub fn variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    /// Check the whole declaration and report every problem at once.
    ///
    /// # Errors
    /// A [`Diagnostics`] list with one entry per problem found.
    pub fn validate(
        &self,
        registry: &FormatRegistry,
    ) -> std::result::Result<ValidatedJob, Diagnostics> {
        let mut diagnostics = Diagnostics::new();
        let job_variables: VariableResolver = self.variables.clone().into_iter().collect();

        let mut names = BTreeSet::new();
        for name in self
            .inputs
            .iter()
            .map(|i| &i.name)
            .chain(self.outputs.iter().map(|o| &o.name))
        {
            if !names.insert(name.as_str()) {
                diagnostics.push(
                    Error::new(
                        ErrorKind::ConfigurationError,
                        "declaration name is used more than once",
                    )
                    .with_subject(name.clone()),
                );
            }
        }

        let mut inputs = Vec::new();
        for input in &self.inputs {
            debug!("Validating input {}: {}", input.name, input.pattern);
            let local: VariableResolver = input.variables.clone().into_iter().collect();
            let variables = job_variables.merged(&local);
            if let Some(validated) = self.validate_input(input, &variables, registry, &mut diagnostics)
            {
                inputs.push(validated);
            }
        }

        let mut outputs = Vec::new();
        for output in &self.outputs {
            debug!("Validating output {}: {}", output.name, output.pattern);
            if let Some(validated) =
                self.validate_output(output, &job_variables, registry, &mut diagnostics)
            {
                outputs.push(validated);
            }
        }

        let mut layout = LayoutValidator::new();
        for input in &inputs {
            layout.add_input(input.name.clone(), Location::from_pattern(&input.pattern));
        }
        for output in &outputs {
            layout.add_output(
                output.name.clone(),
                Location::from_pattern(output.partitioner.pattern()),
            );
        }
        diagnostics.extend(layout.check().into_errors());

        if !diagnostics.is_empty() {
            warn!("Job declaration rejected with {} problem(s)", diagnostics.len());
            return Err(diagnostics);
        }
        Ok(ValidatedJob {
            inputs,
            outputs,
            schema: self.schema.clone(),
        })
    }

    fn validate_input(
        &self,
        input: &InputDescriptor,
        variables: &VariableResolver,
        registry: &FormatRegistry,
        diagnostics: &mut Diagnostics,
    ) -> Option<ValidatedInput> {
        let subject = |e: Error| e.with_subject(input.name.clone());
        let format = diagnostics.capture(registry.require(&input.format).map_err(subject));
        let pattern = resolve_pattern(&input.pattern, variables, &input.name, diagnostics)
            .and_then(|raw| diagnostics.capture(PathPattern::input(&raw).map_err(subject)));
        Some(ValidatedInput {
            name: input.name.clone(),
            pattern: pattern?,
            format: format?,
            optional: input.optional,
        })
    }

    fn validate_output(
        &self,
        output: &OutputDescriptor,
        variables: &VariableResolver,
        registry: &FormatRegistry,
        diagnostics: &mut Diagnostics,
    ) -> Option<ValidatedOutput> {
        let subject = |e: Error| e.with_subject(output.name.clone());
        let configuration = |message: String| {
            Error::new(ErrorKind::ConfigurationError, message).with_subject(output.name.clone())
        };

        let format = diagnostics.capture(registry.require(&output.format).map_err(subject));
        if let Some(format) = &format
            && !format.supports(&self.schema)
        {
            diagnostics.push(configuration(format!(
                "format \"{}\" cannot write records of this schema",
                format.name()
            )));
        }

        let pattern = resolve_pattern(&output.pattern, variables, &output.name, diagnostics)
            .and_then(|raw| diagnostics.capture(PathPattern::output(&raw).map_err(subject)));
        let before = diagnostics.len();
        if let Some(pattern) = &pattern {
            for segment in pattern.segments() {
                let Some(field) = segment.field() else {
                    continue;
                };
                match self.schema.type_of(field) {
                    None => diagnostics.push(configuration(format!(
                        "placeholder {{{field}}} is not a field of the record"
                    ))),
                    Some(ty) if !ty.is_orderable() => diagnostics.push(configuration(format!(
                        "placeholder {{{field}}} has type {ty}, which cannot name a location"
                    ))),
                    Some(ty) => {
                        if let Segment::FormattedPlaceholder { format, .. } = segment
                            && let Err(e) = PlaceholderFormat::compile(ty, format)
                        {
                            diagnostics.push(subject(e));
                        }
                    }
                }
            }
        }
        let placeholders_valid = diagnostics.len() == before;

        let order = diagnostics.capture(
            OrderSpec::parse(&output.order)
                .map_err(subject)
                .and_then(|spec| spec.check(&self.schema).map(|()| spec).map_err(subject)),
        );

        let mut delete_patterns = Vec::new();
        for raw in &output.delete_patterns {
            if let Some(resolved) = resolve_pattern(raw, variables, &output.name, diagnostics)
                && let Some(p) = diagnostics.capture(PathPattern::input(&resolved).map_err(subject))
            {
                delete_patterns.push(p);
            }
        }

        if !placeholders_valid {
            return None;
        }
        let partitioner = diagnostics.capture(
            OutputPartitioner::with_schema(pattern?, order?, format?, &self.schema).map_err(subject),
        )?;
        Some(ValidatedOutput {
            name: output.name.clone(),
            partitioner,
            delete_patterns,
        })
    }
}

fn resolve_pattern(
    raw: &str,
    variables: &VariableResolver,
    name: &str,
    diagnostics: &mut Diagnostics,
) -> Option<String> {
    match variables.resolve_all(raw) {
        Ok(resolved) => Some(resolved),
        Err(errors) => {
            diagnostics.extend(errors.into_iter().map(|e| e.with_subject(name)));
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidatedInput {
    pub name: String,
    /// Pattern with every variable resolved.
    pub pattern: PathPattern,
    pub format: Arc<dyn DataFormat>,
    pub optional: bool,
}

#[derive(Debug, Clone)]
pub struct ValidatedOutput {
    pub name: String,
    pub partitioner: OutputPartitioner,
    pub delete_patterns: Vec<PathPattern>,
}

impl ValidatedOutput {
    pub fn base_path(&self) -> String {
        self.partitioner.pattern().base_path()
    }

    /// Whether an existing file at `path` must be removed before writing.
    pub fn should_delete(&self, path: &str) -> bool {
        let base = self.base_path();
        let relative = if base.is_empty() {
            Some(path)
        } else if base.ends_with('/') {
            path.strip_prefix(base.as_str())
        } else {
            path.strip_prefix(base.as_str())
                .and_then(|rest| rest.strip_prefix('/'))
        };
        relative.is_some_and(|rel| self.delete_patterns.iter().any(|p| p.matches(rel)))
    }
}

/// Planned fragments of one input.
#[derive(Debug, Clone)]
pub struct InputPlan {
    pub name: String,
    pub files: Vec<SourceFile>,
    /// Per-file outcome; a file with broken metadata does not hide the
    /// fragments of the others.
    pub report: PlanReport,
}

impl InputPlan {
    /// Fragments of every file that planned successfully.
    pub fn fragments(&self) -> impl Iterator<Item = &Fragment> {
        self.report.fragments()
    }

    /// All fragments, or the first per-file failure.
    pub fn into_fragments(self) -> Result<Vec<Fragment>> {
        self.report.into_fragments()
    }
}

/// Outputs that write under the same base location.
#[derive(Debug, Clone)]
pub struct OutputStage {
    pub base_path: String,
    pub outputs: Vec<ValidatedOutput>,
}

/// A declaration that passed validation.
#[derive(Debug, Clone)]
pub struct ValidatedJob {
    inputs: Vec<ValidatedInput>,
    outputs: Vec<ValidatedOutput>,
    schema: Schema,
}

impl ValidatedJob {
    pub fn inputs(&self) -> &[ValidatedInput] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[ValidatedOutput] {
        &self.outputs
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn output(&self, name: &str) -> Option<&ValidatedOutput> {
        self.outputs.iter().find(|o| o.name == name)
    }

    /// List, describe and fragment every input.
    ///
    /// Files whose metadata cannot be planned are reported per file in
    /// [`InputPlan::report`].
    ///
    /// # Errors
    /// `NoMatchingInput` when a mandatory input matches no file, `Io` when
    /// the filesystem fails.
    pub fn plan_inputs(
        &self,
        fs: &dyn FileSystem,
        profile: &DataSourceProfile,
    ) -> Result<Vec<InputPlan>> {
        self.inputs
            .iter()
            .map(|input| plan_input(input, fs, profile))
            .collect()
    }

    /// Group outputs by base path, in base-path order.
    pub fn output_stages(&self) -> Vec<OutputStage> {
        let mut stages: BTreeMap<String, Vec<ValidatedOutput>> = BTreeMap::new();
        for output in &self.outputs {
            stages
                .entry(output.base_path())
                .or_default()
                .push(output.clone());
        }
        stages
            .into_iter()
            .map(|(base_path, outputs)| OutputStage { base_path, outputs })
            .collect()
    }
}

fn plan_input(
    input: &ValidatedInput,
    fs: &dyn FileSystem,
    profile: &DataSourceProfile,
) -> Result<InputPlan> {
    let base = input.pattern.base_path();
    let listed = fs.list_files(&base)?;
    let matched: Vec<SourceFile> = listed
        .into_iter()
        .filter(|f| input.pattern.matches(&f.path))
        .collect();
    debug!(
        "Input {} matched {} file(s) under \"{base}\"",
        input.name,
        matched.len()
    );
    if matched.is_empty() && !input.optional {
        return Err(Error::new(
            ErrorKind::NoMatchingInput,
            format!("no file matches \"{}\"", input.pattern),
        )
        .with_subject(input.name.clone()));
    }

    let files = matched
        .into_iter()
        .map(|f| fs.describe(f))
        .collect::<Result<Vec<_>>>()?;
    let planner = FragmentPlanner::for_format(profile, input.format.as_ref());
    let report = planner.plan_all(&files);
    if report.has_failures() {
        warn!(
            "Input {}: {} of {} file(s) could not be fragmented",
            input.name,
            report.failures().count(),
            files.len()
        );
    }
    Ok(InputPlan {
        name: input.name.clone(),
        files,
        report,
    })
}
