use anyhow::{Context, anyhow};
use clap::Parser as ClapParser;

use smalltalk::{Compiler, CompilerOptions, Transcript, VM, VmOptions, demos, prelude, trace};

#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Name of the built-in program to run
    #[arg(required_unless_present = "list", help = "Demo to run (see --list)")]
    demo: Option<String>,

    /// List the built-in programs and exit
    #[arg(long, help = "List available demos")]
    list: bool,

    /// Log every executed instruction at trace level
    #[arg(long, help = "Trace instruction execution")]
    trace: bool,

    /// Compile without dbg markers
    #[arg(long, help = "Omit debug info from generated code")]
    no_debug_info: bool,

    /// Print the compiled user classes before running
    #[arg(long, help = "Dump compiled classes")]
    disassemble: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.trace { "trace" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if cli.list {
        for demo in demos::all() {
            println!("{:<20}{}", demo.name, demo.description);
        }
        return Ok(());
    }

    let name = cli.demo.as_deref().context("no demo given")?;
    let demo = demos::find(name).ok_or_else(|| anyhow!("unknown demo '{name}', try --list"))?;

    let compiler = Compiler::new(CompilerOptions {
        debug_info: !cli.no_debug_info,
        file_name: format!("{}.st", demo.name),
    });
    let program = compiler
        .compile((demo.build)())
        .with_context(|| format!("compiling {}", demo.name))?;

    if cli.disassemble {
        let library = prelude::classes().len();
        for class in program.classes.iter().skip(library) {
            println!("{}", class.to_test_string());
        }
    }

    let options = VmOptions {
        trace_instructions: cli.trace,
        ..VmOptions::default()
    };
    let mut vm = VM::with_options(program, options, Transcript::stdout())?;
    let result = vm.exec_main()?;
    println!("{}", trace::render(&result));
    Ok(())
}
