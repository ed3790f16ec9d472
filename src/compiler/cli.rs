use clap::{App, Arg, ErrorKind};
use io::Read;
use log::info;
use std::fmt;
use std::fs;
use std::io;
use std::iter::ExactSizeIterator;
use std::str::FromStr;

use super::CompilerError;
use crate::package::Package;
use crate::semantic::Builtins;
use crate::syntax::SourceFile;

/// What to print once the package checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitKind {
    /// Top-level statements in the order they were checked.
    Order,
    /// The checked files as JSON.
    Ast,
}

impl EmitKind {
    pub fn variants() -> impl Iterator<Item = EmitKind> {
        vec![Self::Order, Self::Ast].into_iter()
    }
}

impl fmt::Display for EmitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmitKind::Order => write!(f, "order"),
            EmitKind::Ast => write!(f, "ast"),
        }
    }
}

impl FromStr for EmitKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::variants()
            .find(|x| x.to_string() == s)
            .ok_or_else(|| format!("Unknown emit option: `{}`", s))
    }
}

#[derive(Debug)]
pub struct CompilerOptions {
    emit: EmitKind,
    /// Defaults to the package clause of the first file.
    package: Option<String>,
    filepaths: Vec<String>,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            emit: EmitKind::Order,
            package: None,
            filepaths: vec![],
        }
    }
}

impl CompilerOptions {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug, Default)]
pub struct Command {
    builtins: Builtins,
}

impl Command {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn run(
        &self,
        args: impl ExactSizeIterator<Item = String>,
    ) -> Result<String, CompilerError> {
        let options = parse_options(args)?;

        let files = if options.filepaths.is_empty() {
            read_from_stdin()?
        } else {
            options
                .filepaths
                .iter()
                .map(|path| read_from_file(path))
                .collect::<Result<Vec<_>, _>>()?
        };
        if files.is_empty() {
            return Err(CompilerError::NoInput);
        }

        let name = match options.package {
            Some(name) => name,
            None => files[0].package.clone(),
        };
        let mut package = Package::new(&self.builtins, name, files);

        package.check()?;
        info!("[cli] emitting {}", options.emit);

        match options.emit {
            EmitKind::Order => Ok(emit_order(&package)),
            EmitKind::Ast => emit_ast(&package),
        }
    }
}

fn parse_options(
    args: impl ExactSizeIterator<Item = String>,
) -> Result<CompilerOptions, CompilerError> {
    let mut options = CompilerOptions::new();

    let emit_possible_values = EmitKind::variants()
        .map(|kind| kind.to_string())
        .collect::<Vec<_>>();
    let emit_possible_values: Vec<&str> =
        emit_possible_values.iter().map(AsRef::as_ref).collect();

    let matches = App::new("have")
        .about("Checks a package of parsed `have` source files")
        .arg(
            Arg::with_name("emit")
                .long("emit")
                .takes_value(true)
                .possible_values(&emit_possible_values),
        )
        .arg(
            Arg::with_name("package")
                .long("package")
                .takes_value(true)
                .help("Sets the expected package name"),
        )
        .arg(
            Arg::with_name("INPUT")
                .help("JSON-encoded source files; a JSON array of them is read from stdin if omitted")
                .required(false)
                .multiple(true)
                .index(1),
        )
        .get_matches_from_safe(args);

    let matches = match matches {
        Ok(matches) => matches,
        Err(err) if err.kind == ErrorKind::HelpDisplayed || err.kind == ErrorKind::VersionDisplayed => {
            return Err(CompilerError::Help(err.message))
        }
        Err(err) => return Err(CompilerError::InvalidOption(err.message)),
    };

    if let Some(emit) = matches.value_of("emit") {
        options.emit = emit.parse::<EmitKind>()?;
    }

    if let Some(package) = matches.value_of("package") {
        options.package = Some(package.to_string());
    }

    if let Some(filepaths) = matches.values_of("INPUT") {
        options.filepaths = filepaths.map(str::to_string).collect();
    }

    Ok(options)
}

fn read_from_stdin() -> Result<Vec<SourceFile>, CompilerError> {
    let mut content = String::new();

    io::stdin().read_to_string(&mut content)?;

    if content.trim().is_empty() {
        return Ok(vec![]);
    }
    Ok(serde_json::from_str(&content)?)
}

fn read_from_file(filename: &str) -> Result<SourceFile, CompilerError> {
    let content = fs::read_to_string(filename)?;
    let mut file: SourceFile = serde_json::from_str(&content)?;

    if file.name.is_empty() {
        file.name = filename.to_string();
    }
    Ok(file)
}

/// `file:line:column names` per top-level statement.
pub fn emit_order(package: &Package<'_>) -> String {
    let mut output = String::new();

    for (file, stmt) in package.ordered_statements() {
        output.push_str(&format!(
            "{}:{} {}\n",
            file.name,
            stmt.position,
            stmt.decls().join(", ")
        ));
    }
    output
}

pub fn emit_ast(package: &Package<'_>) -> Result<String, CompilerError> {
    let mut json = serde_json::to_string_pretty(package.files())?;

    json.push('\n');
    Ok(json)
}
