//! Suite maintenance: generating input files and promoting actual outputs

use std::fs;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use log::info;

use crate::config::{Command, GenerateArgs, PromoteArgs, ProgramSpec};
use crate::discovery::TestDiscovery;
use crate::TestError;

/// Run a maintenance command, reading generator lines from `input`
pub fn run(command: &Command, input: impl BufRead) -> Result<(), TestError> {
    match command {
        Command::Generate(args) => {
            let written = generate(args, input)?;
            println!("Wrote {} input files", written.len());
        }
        Command::Promote(args) => {
            let promoted = promote(args)?;
            println!("Promoted {} actual outputs", promoted);
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    /// Name of a file in the fixture directory
    File,
    Literal,
}

fn parse_descriptors(descriptors: &str) -> Result<Vec<LineKind>, TestError> {
    if descriptors.is_empty() {
        return Err(TestError::Config("No line descriptors given".to_string()));
    }
    descriptors
        .chars()
        .map(|c| match c {
            'f' => Ok(LineKind::File),
            'l' => Ok(LineKind::Literal),
            other => Err(TestError::Config(format!(
                "Unknown line descriptor '{}' (expected 'f' or 'l')",
                other
            ))),
        })
        .collect()
}

/// Split `input` into cases of one line per descriptor and write them as
/// `{program}-input-NN.txt`, each with an empty expected file. Lines
/// starting with `#` are skipped. Returns the input files written.
pub fn generate(args: &GenerateArgs, input: impl BufRead) -> Result<Vec<PathBuf>, TestError> {
    let kinds = parse_descriptors(&args.descriptors)?;
    let fixture_dir = format!("test-{}", args.suite);
    let dir = args.root.join(&fixture_dir);
    fs::create_dir_all(&dir)?;

    let mut cases: Vec<String> = Vec::new();
    let mut count = 0;
    for line in input.lines() {
        let line = line?;
        if line.starts_with('#') {
            continue;
        }
        let kind = kinds[count % kinds.len()];
        if count % kinds.len() == 0 {
            cases.push(String::new());
        }
        count += 1;

        if let Some(case) = cases.last_mut() {
            if kind == LineKind::File {
                case.push_str(&fixture_dir);
                case.push('/');
            }
            case.push_str(&line);
            case.push('\n');
        }
    }

    let program = ProgramSpec::new(&args.program, &[]);
    let mut written = Vec::with_capacity(cases.len());
    for (index, contents) in cases.iter().enumerate() {
        let number = index + 1;
        let input_path = dir.join(format!("{}-input-{:02}.txt", program.id(), number));
        fs::write(&input_path, contents)?;
        fs::write(dir.join(format!("{}-expected-{:02}.txt", program.id(), number)), "")?;
        info!("Wrote {}", input_path.display());
        written.push(input_path);
    }

    Ok(written)
}

/// Rename every actual output of the program to its expected file.
/// Returns how many were promoted.
pub fn promote(args: &PromoteArgs) -> Result<usize, TestError> {
    let dir = args.root.join(format!("test-{}", args.suite));
    let program = ProgramSpec::new(&args.program, &[]);
    let cases = TestDiscovery::new().discover(&dir, program.id())?;

    let mut promoted = 0;
    for case in cases.iter().filter(|case| case.actual.is_file()) {
        promote_file(&case.actual, &case.expected)?;
        promoted += 1;
    }
    Ok(promoted)
}

fn promote_file(actual: &Path, expected: &Path) -> Result<(), TestError> {
    fs::rename(actual, expected)?;
    info!("{} -> {}", actual.display(), expected.display());
    Ok(())
}
