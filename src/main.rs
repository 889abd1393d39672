//! Merge the dynamic portions of one ELF into another.
//!
//! Usage:
//!   dynmerge TO_EXTEND SOURCE [OUTPUT]
//!
//! TO_EXTEND is the ELF being extended, SOURCE is the ELF whose dynamic
//! metadata is merged in, and OUTPUT is the destination path (`-` or absent
//! for stdout). A file OUTPUT is marked executable on success.

use std::env;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::process;

fn print_usage() {
    eprintln!("Usage: dynmerge [options] TO_EXTEND SOURCE [OUTPUT]");
    eprintln!();
    eprintln!("Merge the dynamic linking metadata of SOURCE into TO_EXTEND.");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  TO_EXTEND   The ELF to extend");
    eprintln!("  SOURCE      The ELF contributing its dynamic metadata");
    eprintln!("  OUTPUT      Destination path, or '-' for stdout (default)");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -v, --verbose   Increase logging verbosity (repeatable)");
    eprintln!("  -h, --help      Show this help");
}

fn main() {
    let mut verbosity = 1usize;
    let mut positional = Vec::new();

    for arg in env::args().skip(1) {
        if arg == "-v" || arg == "--verbose" {
            verbosity += 1;
        } else if arg == "-h" || arg == "--help" {
            print_usage();
            process::exit(0);
        } else if arg.starts_with('-') && arg != "-" {
            eprintln!("Error: unknown option {arg}");
            print_usage();
            process::exit(1);
        } else {
            positional.push(arg);
        }
    }

    if positional.len() < 2 || positional.len() > 3 {
        print_usage();
        process::exit(1);
    }

    stderrlog::new().verbosity(verbosity).init().ok();

    let to_extend = &positional[0];
    let source = &positional[1];
    let output = positional.get(2).map(String::as_str).unwrap_or("-");

    if let Err(err) = run(to_extend, source, output) {
        eprintln!("dynmerge: {err}");
        process::exit(1);
    }
}

fn run(to_extend: &str, source: &str, output: &str) -> dynmerge::Result<()> {
    let target_bytes = fs::read(to_extend)?;
    let source_bytes = fs::read(source)?;

    if output == "-" {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        dynmerge::extend(&target_bytes, &source_bytes, &mut out)?;
        out.flush()?;
    } else {
        let mut out = BufWriter::new(fs::File::create(output)?);
        dynmerge::extend(&target_bytes, &source_bytes, &mut out)?;
        out.flush()?;
        drop(out);
        set_executable(output)?;
    }
    Ok(())
}

#[cfg(unix)]
fn set_executable(path: &str) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_mode(permissions.mode() | 0o111);
    fs::set_permissions(path, permissions)
}

#[cfg(not(unix))]
fn set_executable(_path: &str) -> io::Result<()> {
    Ok(())
}
