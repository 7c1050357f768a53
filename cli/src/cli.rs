//! Implements the command line behavior.
use log::{debug, info};
use std::{
    fs::{metadata, read_dir, File},
    io::Read,
    path::{Path, PathBuf},
};
use stplc_dsl::{
    core::{FileId, Id},
    diagnostic::Diagnostic,
};
use stplc_parser::{options::ParseOptions, parse_query, parse_unit, tokenize as tokenize_source};
use stplc_runtime::{
    interpreter::{Interpreter, StepOutcome},
    options::Options,
    unit::CompilationUnit,
};

use crate::render::{write_diagnostics, Sources};

/// What to do after linking.
#[derive(Debug, Default)]
pub struct RunArgs {
    pub program: String,
    pub cycles: u32,
    pub queries: Vec<String>,
    pub max_micro_steps: Option<u64>,
    pub resolve_links_on_parse_error: bool,
}

impl RunArgs {
    fn options(&self) -> Options {
        let mut options =
            Options::default().with_resolve_links_on_parse_error(self.resolve_links_on_parse_error);
        if let Some(max) = self.max_micro_steps {
            options = options.with_max_micro_steps_per_cycle(max);
        }
        options
    }
}

/// Checks that the files parse and link.
pub fn check(paths: Vec<PathBuf>, suppress_output: bool) -> Result<(), String> {
    let sources = read_sources(paths)?;
    let units = parse(&sources, suppress_output)?;
    let mut interpreter = Interpreter::new(Options::default());
    interpreter
        .link(units)
        .map_err(|diagnostics| report(&diagnostics, &sources, suppress_output))?;

    if !suppress_output {
        println!("OK");
    }
    Ok(())
}

/// Writes the tokens of each file.
pub fn tokenize(paths: Vec<PathBuf>, suppress_output: bool) -> Result<Vec<String>, String> {
    let sources = read_sources(paths)?;
    let mut lines = vec![];
    let mut errors = vec![];
    for (file_id, content) in sources.iter() {
        let (tokens, diagnostics) = tokenize_source(content, file_id);
        lines.extend(tokens.iter().map(|token| {
            let (line, col) = line_col(content, token.span.start);
            format!(
                "Type: {:?}, Value: '{}', At: Ln {},Col {}",
                token.token_type, token.text, line, col
            )
        }));
        errors.extend(diagnostics);
    }
    if !errors.is_empty() {
        return Err(report(&errors, &sources, suppress_output));
    }
    if !suppress_output {
        for line in &lines {
            println!("{}", line);
        }
    }
    Ok(lines)
}

/// Links the files, starts the program and runs it for the cycles. After
/// the cycles, writes each query with its value.
pub fn run(paths: Vec<PathBuf>, args: &RunArgs, suppress_output: bool) -> Result<Vec<String>, String> {
    let sources = read_sources(paths)?;
    let mut interpreter = start(&sources, args, suppress_output)?;

    for cycle in 0..args.cycles {
        let report = interpreter
            .run_cycle()
            .map_err(|diagnostic| report(&[diagnostic], &sources, suppress_output))?;
        debug!("Cycle {} took {} micro-steps", cycle + 1, report.micro_steps);
    }
    info!("Ran {} cycles of {}", args.cycles, args.program);

    let lines = queries(&mut interpreter, args, &sources, suppress_output)?;
    if !suppress_output {
        for line in &lines {
            println!("{}", line);
        }
    }
    Ok(lines)
}

/// Single steps one cycle of the program, writing the location of each
/// statement as it starts. After the cycle, writes each query with its
/// value.
pub fn step(paths: Vec<PathBuf>, args: &RunArgs, into_calls: bool, suppress_output: bool) -> Result<Vec<String>, String> {
    let sources = read_sources(paths)?;
    let mut interpreter = start(&sources, args, suppress_output)?;

    let mut lines = vec![];
    loop {
        let outcome = if into_calls {
            interpreter.step_in()
        } else {
            interpreter.step()
        };
        match outcome {
            StepOutcome::Paused(span) => {
                let location = sources
                    .iter()
                    .find(|(file_id, _)| *file_id == span.file_id)
                    .map(|(file_id, content)| {
                        let (line, col) = line_col(content, span.start);
                        format!("{}:{}:{}", file_id, line, col)
                    })
                    .unwrap_or_else(|| span.to_string());
                lines.push(format!("Paused at {}", location));
            }
            StepOutcome::CycleComplete => {
                lines.push("Cycle complete".to_string());
                break;
            }
            StepOutcome::Failed(diagnostic) => {
                return Err(report(&[diagnostic], &sources, suppress_output));
            }
        }
    }

    lines.extend(queries(&mut interpreter, args, &sources, suppress_output)?);
    if !suppress_output {
        for line in &lines {
            println!("{}", line);
        }
    }
    Ok(lines)
}

fn start(sources: &Sources, args: &RunArgs, suppress_output: bool) -> Result<Interpreter, String> {
    let units = parse(sources, suppress_output)?;
    let mut interpreter = Interpreter::new(args.options());
    interpreter
        .link(units)
        .map_err(|diagnostics| report(&diagnostics, sources, suppress_output))?;
    interpreter
        .start(&Id::from(args.program.as_str()))
        .map_err(|diagnostic| report(&[diagnostic], sources, suppress_output))?;
    Ok(interpreter)
}

fn queries(
    interpreter: &mut Interpreter,
    args: &RunArgs,
    sources: &Sources,
    suppress_output: bool,
) -> Result<Vec<String>, String> {
    let mut lines = vec![];
    for text in &args.queries {
        let query = parse_query(text).map_err(|diagnostics| report(&diagnostics, sources, suppress_output))?;
        let value = interpreter
            .query(query)
            .map_err(|diagnostics| report(&diagnostics, sources, suppress_output))?;
        lines.push(format!("{} = {}", text, value));
    }
    Ok(lines)
}

/// Parses each source. Fails when any source does not follow the grammar.
fn parse(sources: &Sources, suppress_output: bool) -> Result<Vec<CompilationUnit>, String> {
    let mut units = vec![];
    let mut errors = vec![];
    for (file_id, content) in sources.iter() {
        match parse_unit(content, &ParseOptions::new(file_id.clone())) {
            Ok(unit) => units.push(unit),
            Err(diagnostics) => errors.extend(diagnostics),
        }
    }
    if errors.is_empty() {
        Ok(units)
    } else {
        Err(report(&errors, sources, suppress_output))
    }
}

fn report(diagnostics: &[Diagnostic], sources: &Sources, suppress_output: bool) -> String {
    if !suppress_output {
        write_diagnostics(diagnostics, sources);
    }
    format!("Number of errors: {}", diagnostics.len())
}

fn read_sources(paths: Vec<PathBuf>) -> Result<Sources, String> {
    let mut files: Vec<PathBuf> = vec![];
    for path in paths {
        files.append(&mut enumerate_files(&path)?);
    }
    if files.is_empty() {
        return Err(String::from("error: no source files"));
    }

    let mut sources = Sources::new();
    for path in files {
        let mut file = File::open(&path)
            .map_err(|e| format!("error: failed opening file {}. {}", path.display(), e))?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| format!("error: failed to read file {}. {}", path.display(), e))?;
        sources.add(FileId::from_path(&path), contents);
    }
    Ok(sources)
}

fn enumerate_files(path: &Path) -> Result<Vec<PathBuf>, String> {
    let metadata = metadata(path).map_err(|e| format!("error: {}. {}", path.display(), e))?;
    if metadata.is_dir() {
        let paths = read_dir(path).map_err(|e| e.to_string())?;
        let mut paths: Vec<PathBuf> = paths
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry.path()),
                Err(_) => None,
            })
            .filter(|path| path.extension().map(|e| e == "st").unwrap_or(false))
            .collect();
        paths.sort();
        return Ok(paths);
    }
    Ok(vec![path.to_path_buf()])
}

/// The one-based line and zero-based column of the byte offset.
fn line_col(content: &str, offset: usize) -> (usize, usize) {
    let before = &content[..offset.min(content.len())];
    let line = before.matches('\n').count() + 1;
    let col = before.rfind('\n').map(|i| before.len() - i - 1).unwrap_or(before.len());
    (line, col)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stplc_test::shared_resource_path;

    fn run_args(program: &str, queries: &[&str]) -> RunArgs {
        RunArgs {
            program: program.to_string(),
            cycles: 1,
            queries: queries.iter().map(|q| q.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn check_when_valid_file_then_ok() {
        let paths = vec![shared_resource_path("counter.st")];
        assert!(check(paths, true).is_ok());
    }

    #[test]
    fn check_when_missing_file_then_err() {
        let paths = vec![PathBuf::from("test/file/doesnt/exist.st")];
        assert!(check(paths, true).is_err());
    }

    #[test]
    fn run_when_doubling_then_query_is_eight() {
        let paths = vec![shared_resource_path("doubling.st")];
        let lines = run(paths, &run_args("P", &["P.x"]), true).unwrap();
        assert_eq!(lines, vec!["P.x = 8"]);
    }

    #[test]
    fn run_when_unknown_program_then_err() {
        let paths = vec![shared_resource_path("doubling.st")];
        assert!(run(paths, &run_args("Q", &[]), true).is_err());
    }

    #[test]
    fn step_when_counter_then_pauses_at_each_statement() {
        let paths = vec![shared_resource_path("counter.st")];
        let lines = step(paths, &run_args("Main", &["Main.doubled"]), false, true).unwrap();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("Paused at "));
        assert!(lines[0].ends_with(":24:4"));
        assert_eq!(lines[2], "Cycle complete");
        assert_eq!(lines[3], "Main.doubled = 6");
    }

    #[test]
    fn tokenize_when_valid_file_then_lines() {
        let paths = vec![shared_resource_path("doubling.st")];
        let lines = tokenize(paths, true).unwrap();
        assert_eq!(lines[0], "Type: Program, Value: 'PROGRAM', At: Ln 1,Col 0");
    }

    #[test]
    fn line_col_when_second_line_then_column_from_line_start() {
        assert_eq!(line_col("ab\ncd", 4), (2, 1));
        assert_eq!(line_col("ab", 0), (1, 0));
    }
}
