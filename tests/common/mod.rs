#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::OnceLock;
use tempfile::TempDir;

pub const SAMPLE: &str = "sample";

/// Each stub appends its command line to `$STUB_CALLS` and exits 1 when its
/// name equals `$STUB_FAIL`.
const PREAMBLE: &str = r#"#!/bin/sh
tool=$(basename "$0")
if [ -n "$STUB_CALLS" ]; then echo "$tool $*" >> "$STUB_CALLS"; fi
if [ "$STUB_FAIL" = "$tool" ]; then echo "$tool: simulated failure" 1>&2; exit 1; fi
"#;

const HOMER_TOOLS: &str = r#"for last; do :; done
printf '@r1\nACGTACGTACGTACGT\n+\nIIIIIIIIIIIIIIII\n' > "$last.trimmed"
printf '16\t1\n' > "$last.lengths"
echo "trimmed 1 reads"
"#;

const BOWTIE2: &str = r#"prev=""
for arg in "$@"; do
  if [ "$prev" = "-S" ]; then printf '@HD\tVN:1.6\n' > "$arg"; fi
  prev="$arg"
done
echo "1 reads; of these: 1 (100.00%) aligned exactly 1 time" 1>&2
"#;

const BOWTIE2_INSPECT: &str = r#"if [ "$STUB_BAD_INDEX" = "1" ]; then
  echo "Error: could not locate a Bowtie index corresponding to basename $2" 1>&2
  exit 1
fi
echo "Sequence-1	chr1"
"#;

const SAMTOOLS: &str = r#"prev=""; out=""; tmp=""
for arg in "$@"; do
  if [ "$prev" = "-o" ]; then out="$arg"; fi
  if [ "$prev" = "-T" ]; then tmp="$arg"; fi
  prev="$arg"
done
if [ "$1" = "sort" ]; then
  cat > /dev/null
  if [ "$STUB_SORT_FAILS" = "1" ]; then
    echo "partial" > "$tmp.0000.bam"
    echo "samtools sort: simulated failure" 1>&2
    exit 1
  fi
fi
if [ -n "$out" ]; then echo "BAM" > "$out"; else echo "BAMSTREAM"; fi
"#;

const MAKE_TAG_DIRECTORY: &str = r#"mkdir -p "$1"
echo "name=$(basename "$1")" > "$1/tagInfo.txt"
echo "	Checking GC bias"
"#;

const MAKE_UCSC_FILE: &str = r#"name=$(basename "$1")
echo "track" > "$1/$name.ucsc.bedGraph.gz"
"#;

pub struct Stubs {
    dir: TempDir,
}

impl Stubs {
    pub fn path(&self, tool: &str) -> String {
        self.dir.path().join(tool).to_string_lossy().to_string()
    }

    pub fn tool_flags(&self) -> Vec<String> {
        [
            ("--homer-tools", "homerTools"),
            ("--bowtie2", "bowtie2"),
            ("--bowtie2-inspect", "bowtie2-inspect"),
            ("--samtools", "samtools"),
            ("--make-tag-directory", "makeTagDirectory"),
            ("--make-ucsc-file", "makeUCSCfile"),
        ]
        .into_iter()
        .flat_map(|(flag, tool)| [flag.to_string(), self.path(tool)])
        .collect()
    }
}

/// Stubs are written once per test binary so no test executes a script
/// another thread still has open for writing.
pub fn stubs() -> &'static Stubs {
    static STUBS: OnceLock<Stubs> = OnceLock::new();
    STUBS.get_or_init(|| {
        let dir = tempfile::tempdir().expect("expected stub tempdir");
        for (name, body) in [
            ("homerTools", HOMER_TOOLS),
            ("bowtie2", BOWTIE2),
            ("bowtie2-inspect", BOWTIE2_INSPECT),
            ("samtools", SAMTOOLS),
            ("makeTagDirectory", MAKE_TAG_DIRECTORY),
            ("makeUCSCfile", MAKE_UCSC_FILE),
        ] {
            write_executable(&dir.path().join(name), &format!("{PREAMBLE}{body}"));
        }
        Stubs { dir }
    })
}

fn write_executable(path: &Path, body: &str) {
    fs::write(path, body).expect("expected stub write");
    let mut permissions = fs::metadata(path).expect("expected stub metadata").permissions();
    permissions.set_mode(0o755);
    fs::set_permissions(path, permissions).expect("expected stub permissions");
}

pub fn write_reads(dir: &Path, file_name: &str) -> PathBuf {
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    let path = dir.join(file_name);
    let file = fs::File::create(&path).expect("expected reads file");
    let mut encoder = GzEncoder::new(file, Compression::default());
    encoder
        .write_all(b"@r1\nACGTACGTACGTACGTAGATCGGAAGAGC\n+\nIIIIIIIIIIIIIIIIIIIIIIIIIIIII\n")
        .expect("expected reads write");
    encoder.finish().expect("expected gzip finish");
    path
}

pub fn run_binary(args: &[String], envs: &[(&str, &str)]) -> Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_tagdir_pipeline"));
    command
        .args(args)
        .env_remove("STUB_FAIL")
        .env_remove("STUB_BAD_INDEX")
        .env_remove("STUB_SORT_FAILS")
        .env("RUST_LOG", "info");
    for (key, value) in envs {
        command.env(key, value);
    }
    command
        .output()
        .expect("expected tagdir_pipeline binary to execute")
}

pub fn pipeline_args(reads: &Path, outdir: &Path) -> Vec<String> {
    let mut args = vec![
        "--fastq".to_string(),
        reads.to_string_lossy().to_string(),
        "--bt2-index".to_string(),
        "idx/genome".to_string(),
        "--outdir".to_string(),
        outdir.to_string_lossy().to_string(),
    ];
    args.extend(stubs().tool_flags());
    args
}

pub fn read_calls(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}
