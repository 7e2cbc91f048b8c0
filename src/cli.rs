//! CLI: compile a schema document, then inspect the models or validate instances against them.
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use rayon::prelude::*;
use serde_json::Value;
use tracing::{debug, info};

use crate::model::ModelSet;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// compile Swagger 2.0 / OpenAPI 3.x schemas into strict models and validate JSON against them
#[derive(Parser, Debug)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// compile and print the JSON-schema-ish model view
    Inspect(InspectOut),
    /// compile, then validate instances against one named schema
    Validate(ValidateRun),
}

#[derive(Args, Debug, Clone)]
struct SchemaSettings {
    /// Swagger 2.0 or OpenAPI 3.x document (JSON)
    #[arg(long, short)]
    schema: PathBuf,
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// treat input as newline-delimited JSON (NDJSON)
    #[arg(long, default_value_t = false)]
    ndjson: bool,

    /// JSON Pointer to select a subnode in each document (e.g. /data/items/0/payload)
    #[arg(long)]
    json_pointer: Option<String>,

    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(clap::Parser, Debug)]
struct InspectOut {
    #[command(flatten)]
    schema_settings: SchemaSettings,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct ValidateRun {
    #[command(flatten)]
    schema_settings: SchemaSettings,

    #[command(flatten)]
    input_settings: InputSettings,

    /// named schema every instance must satisfy
    #[arg(long)]
    root: String,
}

/// One instance pulled from an input file.
#[derive(Debug)]
struct Sample {
    label: String,
    value: Value,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl SchemaSettings {
    fn compile(&self) -> anyhow::Result<ModelSet> {
        let source = std::fs::read_to_string(&self.schema)
            .with_context(|| format!("failed to read schema document {}", self.schema.display()))?;
        let doc = crate::loader::load_str(&source)
            .with_context(|| format!("failed to load schema document {}", self.schema.display()))?;
        let models = crate::synth::compile(&doc)
            .with_context(|| format!("failed to compile schema document {}", self.schema.display()))?;
        info!(schemas = doc.len(), models = models.len(), "compiled schema document");
        Ok(models)
    }
}

impl InputSettings {
    fn load(&self) -> anyhow::Result<Vec<Sample>> {
        let source_paths = resolve_file_path_patterns(&self.input).context("failed to resolve input file paths")?;
        let mut samples = Vec::new();
        for source_path in source_paths {
            let source_path_str = source_path.to_string_lossy().to_string();
            let source = std::fs::read_to_string(&source_path)
                .with_context(|| format!("failed to read source file {source_path_str}"))?;
            let documents = if self.ndjson {
                parse_ndjson(&source, &source_path_str)?
            } else {
                let value = serde_json::from_str::<Value>(&source)
                    .with_context(|| format!("failed to parse JSON source file ({source_path_str})"))?;
                vec![(source_path_str.clone(), value)]
            };
            for (label, value) in documents {
                let value = self.select(value, &label)?;
                samples.push(Sample { label, value });
            }
        }
        debug!(samples = samples.len(), "loaded input samples");
        Ok(samples)
    }

    fn select(&self, value: Value, label: &str) -> anyhow::Result<Value> {
        match self.json_pointer.as_deref() {
            None => Ok(value),
            Some(pointer) => value
                .pointer(pointer)
                .cloned()
                .ok_or_else(|| anyhow!("JSON pointer {pointer} selects nothing in {label}")),
        }
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }
    pub fn run(&self) -> anyhow::Result<()> {
        match &self.cmd {
            Command::Inspect(target) => {
                let models = target.schema_settings.compile()?;
                let view = crate::emit::emit_model_set(&models);
                let view_src = serde_json::to_string_pretty(&view)?;
                write_or_print(target.out.as_deref(), &view_src)
            }
            Command::Validate(target) => {
                let models = target.schema_settings.compile()?;
                let root = models
                    .root(&target.root)
                    .ok_or_else(|| anyhow!("no schema named `{}` resolves to a type", target.root))?;
                let samples = target.input_settings.load()?;

                // models are immutable once compiled; samples validate in parallel
                let outcomes: Vec<_> = samples
                    .par_iter()
                    .map(|sample| (sample, models.decode(root, &sample.value)))
                    .collect();

                let mut failed = 0usize;
                for (sample, outcome) in &outcomes {
                    match outcome {
                        Ok(_) => println!("{} {}", "✓".green().bold(), sample.label),
                        Err(errors) => {
                            failed += 1;
                            println!("{} {}", "✗".red().bold(), sample.label.bold());
                            for violation in &errors.violations {
                                println!("    {} {}", violation.path.to_string().yellow(), violation.kind);
                            }
                        }
                    }
                }
                info!(total = outcomes.len(), failed, "validation finished");
                if failed > 0 {
                    bail!("{failed} of {} instances failed validation against `{}`", outcomes.len(), target.root);
                }
                Ok(())
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn write_or_print(out: Option<&Path>, contents: &str) -> anyhow::Result<()> {
    match out {
        Some(out) => {
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(out, contents).with_context(|| format!("failed to write {}", out.display()))
        }
        None => {
            println!("{contents}");
            Ok(())
        }
    }
}

fn parse_ndjson(source: &str, source_path_str: &str) -> anyhow::Result<Vec<(String, Value)>> {
    source
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            let label = format!("{source_path_str}:{}", i + 1);
            let value = serde_json::from_str::<Value>(line).with_context(|| format!("failed to parse NDJSON line {label}"))?;
            Ok((label, value))
        })
        .collect()
}

fn resolve_file_path_patterns<I>(patterns: I) -> anyhow::Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern)? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}
