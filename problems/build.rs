use std::{
    env,
    error::Error,
    fs::{self, File},
    io::Write,
    path::PathBuf,
    process,
};

const KINDS: [&str; 7] = [
    "Syntax", "Link", "Type", "Argument", "Context", "Internal", "Memory",
];

struct ProblemDef {
    /// The code that users know this as. Codes stay stable between releases
    /// so that documentation can refer to them.
    code: String,
    /// The internal name of the problem. Not promised to be stable.
    name: String,
    /// The category of the problem, one of `KINDS`.
    kind: String,
    /// A message describing the type of error.
    message: String,
}

fn column<'a>(record: &'a csv::StringRecord, index: usize) -> Result<&'a str, String> {
    record
        .get(index)
        .ok_or_else(|| format!("Record {:?} is not valid at column {}", record, index))
}

fn read_definitions() -> Result<Vec<ProblemDef>, Box<dyn Error>> {
    let mut src_path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    src_path.push("resources");
    src_path.push("problem-codes.csv");

    let src = fs::read_to_string(&src_path)
        .map_err(|e| format!("Unable to read {}: {}", src_path.display(), e))?;

    let mut defs = vec![];
    let mut rdr = csv::Reader::from_reader(src.as_bytes());
    for result in rdr.records() {
        let record = result?;
        let kind = column(&record, 2)?;
        if !KINDS.contains(&kind) {
            return Err(format!("Record {:?} has unknown kind {}", record, kind).into());
        }
        defs.push(ProblemDef {
            code: column(&record, 0)?.to_string(),
            name: column(&record, 1)?.to_string(),
            kind: kind.to_string(),
            message: column(&record, 3)?.to_string(),
        });
    }
    Ok(defs)
}

fn write_match(
    out: &mut File,
    doc: &str,
    signature: &str,
    defs: &[ProblemDef],
    arm: impl Fn(&ProblemDef) -> String,
) -> Result<(), Box<dyn Error>> {
    out.write_all(format!("    /// {}\n", doc).as_bytes())?;
    out.write_all(format!("    pub fn {} {{\n", signature).as_bytes())?;
    out.write_all(b"        match self {\n")?;
    for def in defs {
        out.write_all(format!("            Problem::{} => {},\n", def.name, arm(def)).as_bytes())?;
    }
    out.write_all(b"        }\n")?;
    out.write_all(b"    }\n\n")?;
    Ok(())
}

fn create_problems() -> Result<(), Box<dyn Error>> {
    println!("cargo:rerun-if-changed=resources/problem-codes.csv");

    let defs = read_definitions()?;

    let mut out_path = PathBuf::from(env::var("OUT_DIR")?);
    fs::create_dir_all(&out_path)
        .map_err(|e| format!("Unable to create output directory: {}", e))?;
    out_path.push("problems.rs");
    let mut out =
        File::create(out_path).map_err(|e| format!("Unable to create 'problems.rs': {}", e))?;

    out.write_all(b"#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]\n")?;
    out.write_all(b"pub enum Problem {\n")?;
    for def in &defs {
        out.write_all(format!("    {},\n", def.name).as_bytes())?;
    }
    out.write_all(b"}\n\n")?;

    out.write_all(b"impl Problem {\n")?;
    write_match(
        &mut out,
        "Returns the code for the particular problem as a string.",
        "code(&self) -> &'static str",
        &defs,
        |def| format!("\"{}\"", def.code),
    )?;
    write_match(
        &mut out,
        "Returns the constant message for the particular problem.",
        "message(&self) -> &'static str",
        &defs,
        |def| format!("\"{}\"", def.message),
    )?;
    write_match(
        &mut out,
        "Returns the category of the problem.",
        "kind(&self) -> ProblemKind",
        &defs,
        |def| format!("ProblemKind::{}", def.kind),
    )?;
    out.write_all(b"}\n")?;

    out.flush()?;
    Ok(())
}

fn main() {
    if let Err(err) = create_problems() {
        println!("problem generating problems.rs: {}", err);
        process::exit(1);
    }
}
