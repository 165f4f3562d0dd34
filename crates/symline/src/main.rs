use std::error::Error;
use std::process;

use clap::{Parser, Subcommand};
use symline_core::demangle::{demangle, demangle_any, DemangleOptions, Scheme};
use symline_core::types::arch::{cpu_name, cpu_type};
use symline_core::{DebugInfo, FunctionNameKind, ModuleQuery, QueryKind, Runtime, SymbolRecord, SymbolizerOptions};
use symline_utils::{debug, init_logging};

/// Demangle symbols and resolve module offsets to names and source lines.
#[derive(Parser, Debug)]
#[command(name = "symline")]
#[command(version)]
#[command(about = "Demangle symbols and resolve module offsets to names and source lines", long_about = None)]
struct Cli
{
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands
{
    /// Demangle a Swift, C++, or Rust symbol (unrecognized input is echoed)
    Demangle
    {
        /// The mangled symbol
        symbol: String,
        /// Only try this scheme (swift, cpp, rust); tries all by default
        #[arg(long)]
        scheme: Option<Scheme>,
        /// Shorter output without parameters or hashes
        #[arg(long, default_value_t = false)]
        simplified: bool,
    },
    /// Resolve an offset inside a module
    Symbolize
    {
        /// Module path, optionally suffixed with `:<cpu>` (e.g. `App:arm64`)
        module: String,
        /// Offset within the module (hex `0x1c` or decimal)
        #[arg(value_parser = parse_u64)]
        offset: u64,
        /// Look up a data symbol instead of code
        #[arg(long, default_value_t = false)]
        data: bool,
        /// Print the whole inlined call chain, innermost first
        #[arg(long, default_value_t = false, conflicts_with = "data")]
        inlined: bool,
        /// Slice of fat files to use when the module has no `:<cpu>` suffix
        #[arg(long)]
        arch: Option<String>,
        /// Which function name to print (none, short, linkage)
        #[arg(long)]
        name_kind: Option<FunctionNameKind>,
        /// Print names as they appear in the binary
        #[arg(long, default_value_t = false)]
        no_demangle: bool,
        /// Do not fall back to the symbol table
        #[arg(long, default_value_t = false)]
        no_symtab: bool,
    },
    /// List the architecture slices of a debug-info file
    Variants
    {
        /// Path to the debug-info file
        path: String,
    },
    /// Print the compilation directory of a source file
    CompDir
    {
        /// Path to the debug-info file
        path: String,
        /// CPU name of the slice (e.g. arm64)
        cpu: String,
        /// Source file name or path suffix
        file: String,
    },
    /// Translate a Mach-O (cputype, cpusubtype) pair to a CPU name
    CpuName
    {
        #[arg(value_parser = parse_u32)]
        cputype: u32,
        #[arg(value_parser = parse_u32)]
        cpusubtype: u32,
    },
    /// Translate a CPU name to its Mach-O (cputype, cpusubtype) pair
    CpuType
    {
        name: String,
    },
}

fn main()
{
    // Reads RUST_LOG, SYMLINE_LOG_FORMAT and SYMLINE_LOG_FILE
    let _guard = match init_logging() {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            process::exit(1);
        }
    };

    let cli = Cli::parse();

    if let Err(e) = run_command(cli) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run_command(cli: Cli) -> Result<(), Box<dyn Error>>
{
    match cli.command {
        Commands::Demangle {
            symbol,
            scheme,
            simplified,
        } => {
            let options = if simplified {
                DemangleOptions::Simplified
            } else {
                DemangleOptions::Full
            };
            let name = match scheme {
                Some(scheme) => demangle(&symbol, scheme, options),
                None => demangle_any(&symbol, options).map(|(scheme, name)| {
                    debug!(%scheme, "demangled");
                    name
                }),
            };
            println!("{}", name.unwrap_or(symbol));
            Ok(())
        }
        Commands::Symbolize {
            module,
            offset,
            data,
            inlined,
            arch,
            name_kind,
            no_demangle,
            no_symtab,
        } => {
            // Flags override the SYMLINE_* environment
            let mut options = SymbolizerOptions::from_env()?;
            if let Some(name_kind) = name_kind {
                options.name_kind = name_kind;
            }
            if arch.is_some() {
                options.default_arch = arch;
            }
            options.demangle &= !no_demangle;
            options.use_symbol_table &= !no_symtab;

            let runtime = Runtime::new();
            let mut symbolizer = runtime.symbolizer(options);
            let query = ModuleQuery::new(module, offset, QueryKind::from_is_data(data));

            let records = if inlined {
                symbolizer.symbolize_inlined(&query)
            } else {
                vec![symbolizer.symbolize(&query)]
            };
            print_records(&records)
        }
        Commands::Variants { path } => {
            let info = DebugInfo::open_path(&path)?;
            for variant in info.variants()? {
                let uuid = variant
                    .uuid
                    .map_or_else(|| "-".to_string(), |uuid| uuid.hyphenated().to_string().to_uppercase());
                println!(
                    "{:<8} {} {} vmaddr={:#x} vmsize={:#x}",
                    variant.cpu_name, uuid, variant.name, variant.vmaddr, variant.vmsize
                );
            }
            Ok(())
        }
        Commands::CompDir { path, cpu, file } => {
            let info = DebugInfo::open_path(&path)?;
            match info.compilation_dir(&cpu, &file)? {
                Some(dir) => {
                    println!("{dir}");
                    Ok(())
                }
                None => Err(format!("no compilation unit for {file} in {cpu} slice").into()),
            }
        }
        Commands::CpuName { cputype, cpusubtype } => {
            let name = cpu_name(cputype, cpusubtype).ok_or_else(|| format!("unknown cpu {cputype}/{cpusubtype}"))?;
            println!("{name}");
            Ok(())
        }
        Commands::CpuType { name } => {
            let (cputype, cpusubtype) = cpu_type(&name).ok_or_else(|| format!("unknown cpu name {name}"))?;
            println!("{cputype:#x} {cpusubtype}");
            Ok(())
        }
    }
}

/// Print records innermost first; an error record fails the command.
fn print_records(records: &[SymbolRecord]) -> Result<(), Box<dyn Error>>
{
    for record in records {
        if let Some(error) = &record.error {
            return Err(error.clone().into());
        }
        println!("{}", format_record(record));
    }
    Ok(())
}

fn format_record(record: &SymbolRecord) -> String
{
    let name = record.name.as_deref().unwrap_or("??");
    match &record.filename {
        Some(file) => {
            let line = record.line.unwrap_or(0);
            match record.column {
                Some(column) => format!("{name}\n    at {file}:{line}:{column}"),
                None => format!("{name}\n    at {file}:{line}"),
            }
        }
        None => name.to_string(),
    }
}

fn parse_u64(text: &str) -> Result<u64, String>
{
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.map_err(|e| format!("invalid number {text:?}: {e}"))
}

fn parse_u32(text: &str) -> Result<u32, String>
{
    let value = parse_u64(text)?;
    u32::try_from(value).map_err(|_| format!("{text} does not fit in 32 bits"))
}

#[cfg(test)]
mod tests
{
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition()
    {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_numbers()
    {
        assert_eq!(parse_u64("0x1c"), Ok(0x1c));
        assert_eq!(parse_u64("0X1C"), Ok(0x1c));
        assert_eq!(parse_u64("28"), Ok(28));
        assert!(parse_u64("0xzz").is_err());
        assert!(parse_u64("-1").is_err());
        assert_eq!(parse_u32("0x0100000c"), Ok(0x0100_000c));
        assert!(parse_u32("0x100000000").is_err());
    }

    #[test]
    fn test_symbolize_flags()
    {
        let cli = Cli::try_parse_from([
            "symline",
            "symbolize",
            "/tmp/App:arm64",
            "0x40",
            "--inlined",
            "--name-kind",
            "short",
            "--no-symtab",
        ])
        .unwrap();
        match cli.command {
            Commands::Symbolize {
                module,
                offset,
                inlined,
                name_kind,
                no_symtab,
                ..
            } => {
                assert_eq!(module, "/tmp/App:arm64");
                assert_eq!(offset, 0x40);
                assert!(inlined);
                assert_eq!(name_kind, Some(FunctionNameKind::ShortName));
                assert!(no_symtab);
            }
            other => panic!("unexpected command {other:?}"),
        }

        assert!(Cli::try_parse_from(["symline", "symbolize", "m", "1", "--data", "--inlined"]).is_err());
    }

    #[test]
    fn test_format_record()
    {
        let record = SymbolRecord {
            name: Some("inner".into()),
            filename: Some("/src/main.c".into()),
            line: Some(5),
            column: Some(3),
            error: None,
        };
        assert_eq!(format_record(&record), "inner\n    at /src/main.c:5:3");

        let record = SymbolRecord {
            name: Some("global_counter".into()),
            ..SymbolRecord::default()
        };
        assert_eq!(format_record(&record), "global_counter");
    }

    #[test]
    fn test_error_record_fails()
    {
        let records = [SymbolRecord {
            error: Some("no symbol found at 0x1000".into()),
            ..SymbolRecord::default()
        }];
        let err = print_records(&records).unwrap_err();
        assert_eq!(err.to_string(), "no symbol found at 0x1000");
    }
}
